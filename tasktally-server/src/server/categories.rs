use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use tasktally_shared::api;
use uuid::Uuid;

use super::{AppError, AppState, auth::AuthCtx, rfc3339, validate};
use crate::storage::models::{Category, CategoryChanges};

pub(super) fn category_dto(c: &Category) -> api::CategoryDto {
    api::CategoryDto {
        category_id: c.category_id.clone(),
        user_id: c.user_id.clone(),
        category_name: c.category_name.clone(),
        category_emoji: c.category_emoji.clone(),
        created_at: rfc3339(c.created_at),
    }
}

pub(super) async fn api_list_categories(
    State(state): State<AppState>,
) -> Result<Json<api::CategoryListResp>, AppError> {
    let rows = state
        .store
        .list_categories()
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::CategoryListResp {
        categories: rows.iter().map(category_dto).collect(),
    }))
}

pub(super) async fn api_create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::CategoryCreateReq>,
) -> Result<(StatusCode, Json<api::CategoryResp>), AppError> {
    let name = body.category_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("category_name is required"));
    }

    let emoji = match body.category_emoji.as_deref() {
        None => None,
        Some(e) => {
            if !validate::is_single_emoji(e) {
                return Err(AppError::bad_request(
                    "category_emoji must be a single emoji",
                ));
            }
            Some(e.trim().to_string())
        }
    };

    let row = state
        .store
        .create_category(&auth.user_id, &name, emoji.as_deref())
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::conflict("Category name already exists")
            } else {
                AppError::internal(e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(api::CategoryResp {
            category: category_dto(&row),
        }),
    ))
}

pub(super) async fn api_update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::CategoryUpdateReq>,
) -> Result<Json<api::CategoryResp>, AppError> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::bad_request("category_id must be a valid UUID"));
    }

    let mut changes = CategoryChanges::default();
    if let Some(name) = body.category_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request(
                "category_name must be a non-empty string",
            ));
        }
        changes.category_name = Some(name);
    }
    if let Some(emoji) = body.category_emoji {
        match emoji {
            // Explicit null clears the emoji
            None => changes.category_emoji = Some(None),
            Some(e) => {
                if !validate::is_single_emoji(&e) {
                    return Err(AppError::bad_request(
                        "category_emoji must be a single emoji",
                    ));
                }
                changes.category_emoji = Some(Some(e.trim().to_string()));
            }
        }
    }
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let updated = state
        .store
        .update_category(&id, &auth.user_id, changes)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::conflict("Category name already exists")
            } else {
                AppError::internal(e)
            }
        })?;

    // Either not found, or not owned by this user
    let Some(row) = updated else {
        return Err(AppError::not_found("Category not found"));
    };
    Ok(Json(api::CategoryResp {
        category: category_dto(&row),
    }))
}

pub(super) async fn api_delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::CategoryDeletedResp>, AppError> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::bad_request("category_id must be a valid UUID"));
    }

    let deleted = state
        .store
        .delete_category(&id, &auth.user_id)
        .await
        .map_err(AppError::internal)?;
    let Some(row) = deleted else {
        return Err(AppError::not_found("Category not found"));
    };
    // Tasks pointing at this category fall back to NULL via the FK rule
    Ok(Json(api::CategoryDeletedResp {
        deleted: category_dto(&row),
    }))
}
