use axum::{Json, extract::State, http::StatusCode};
use bcrypt::{hash, verify};
use tasktally_shared::api;

use super::{AppError, AppState, auth, rfc3339, validate};
use crate::storage::models::User;

pub(super) fn user_dto(u: &User) -> api::UserDto {
    api::UserDto {
        user_id: u.user_id.clone(),
        email: u.email.clone(),
        username: u.username.clone(),
        full_name: u.full_name.clone(),
        created_at: rfc3339(u.created_at),
    }
}

pub(super) async fn api_signup(
    State(state): State<AppState>,
    Json(body): Json<api::SignupReq>,
) -> Result<(StatusCode, Json<api::SignupResp>), AppError> {
    let email = body.email.trim().to_lowercase();
    let username = body.username.trim().to_lowercase();
    let full_name = body.full_name.trim().to_string();

    if !validate::is_valid_email(&email) {
        return Err(AppError::bad_request("Email not valid"));
    }
    if !validate::is_valid_username(&username) {
        return Err(AppError::bad_request("Username not valid"));
    }
    if full_name.is_empty() {
        return Err(AppError::bad_request("Full name not valid"));
    }
    if !validate::is_valid_password(&body.password) {
        return Err(AppError::bad_request("Password not valid"));
    }

    if let Some(existing) = state
        .store
        .find_user_by_email_or_username(&email, &username)
        .await
        .map_err(AppError::internal)?
    {
        let message = if existing.email == email {
            "Email already registered"
        } else {
            "Username already taken. Please try a different one."
        };
        return Err(AppError::bad_request(message));
    }

    let password_hash = hash(&body.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!(error=%e, "signup: bcrypt hash failed");
        AppError::internal(e)
    })?;

    let user = state
        .store
        .create_user(&email, &username, Some(&full_name), &password_hash)
        .await
        .map_err(AppError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(api::SignupResp {
            user: user_dto(&user),
        }),
    ))
}

pub(super) async fn api_login(
    State(state): State<AppState>,
    Json(body): Json<api::LoginReq>,
) -> Result<Json<api::LoginResp>, AppError> {
    // Same response for unknown identifier and wrong password
    let rejected = || AppError::bad_request("Invalid username/email or password.");

    let identifier = body.identifier.trim().to_lowercase();
    let user = state
        .store
        .find_user_by_identifier(&identifier)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            tracing::warn!(identifier=%identifier, "login: unknown identifier");
            rejected()
        })?;

    if !verify(&body.password, &user.password_hash).map_err(|e| {
        tracing::error!(identifier=%identifier, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(identifier=%identifier, "login: invalid password");
        return Err(rejected());
    }

    let token = auth::issue_token(&state, &user.user_id)?;
    Ok(Json(api::LoginResp {
        token,
        user: user_dto(&user),
    }))
}
