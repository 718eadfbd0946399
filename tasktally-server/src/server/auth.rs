use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use tasktally_shared::jwt::{self, JwtClaims};
use tracing::Span;
use uuid::Uuid;

use super::{AppError, AppState};

/// Days before mandatory re-login.
const TOKEN_TTL_DAYS: i64 = 30;

/// Per-request identity, attached by [`require_bearer`] and read by
/// handlers through an axum `Extension`.
#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub user_id: String,
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let prefix = "Bearer ";
    if !header_str.starts_with(prefix) {
        return unauthorized();
    }
    let token = &header_str[prefix.len()..];

    let claims = match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error=%e, "auth: jwt decode failed");
            return unauthorized();
        }
    };

    // The subject must be a user id issued by us
    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id.to_string(),
        Err(_) => {
            tracing::warn!(sub=%claims.sub, "auth: token subject is not a user id");
            return unauthorized();
        }
    };

    Span::current().record("user_id", tracing::field::display(&user_id));
    req.extensions_mut().insert(AuthCtx { user_id });
    Ok(next.run(req).await)
}

pub fn issue_token(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let jti = Uuid::new_v4().to_string();
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        jti,
        exp,
    };
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        tracing::error!(%user_id, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })
}
