use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use tasktally_shared::{api, domain::Weekday};
use uuid::Uuid;

use super::{AppError, AppState, auth::AuthCtx, rfc3339};
use crate::storage::models::{Category, Task, TaskChanges};

pub(super) fn task_dto(t: &Task, category: Option<&Category>) -> api::TaskDto {
    api::TaskDto {
        task_id: t.task_id.clone(),
        user_id: t.user_id.clone(),
        category_id: t.category_id.clone(),
        task_name: t.task_name.clone(),
        target_count: t.target_count,
        days_of_week: t.days(),
        created_at: rfc3339(t.created_at),
        category_name: category.map(|c| c.category_name.clone()),
        category_emoji: category.and_then(|c| c.category_emoji.clone()),
    }
}

/// Validates a days_of_week list: non-empty, and every entry must be a
/// recognizable day name so junk can never reach storage. Returns the
/// trimmed entries JSON-encoded for the TEXT column.
pub(super) fn encode_days(days: &[String]) -> Result<String, AppError> {
    if days.is_empty() {
        return Err(AppError::bad_request(
            "days_of_week must be a non-empty string array",
        ));
    }
    let mut trimmed = Vec::with_capacity(days.len());
    for day in days {
        if Weekday::parse(day).is_none() {
            return Err(AppError::bad_request(format!(
                "unrecognized day of week: {day:?}"
            )));
        }
        trimmed.push(day.trim().to_string());
    }
    serde_json::to_string(&trimmed).map_err(AppError::internal)
}

pub(super) async fn api_list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::TaskListResp>, AppError> {
    let rows = state
        .store
        .list_tasks_for_user(&auth.user_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::TaskListResp {
        tasks: rows
            .iter()
            .map(|(t, c)| task_dto(t, c.as_ref()))
            .collect(),
    }))
}

pub(super) async fn api_create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::TaskCreateReq>,
) -> Result<(StatusCode, Json<api::TaskResp>), AppError> {
    let name = body.task_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("task_name is required"));
    }
    if body.target_count <= 0 {
        return Err(AppError::bad_request(
            "target_count must be a positive integer",
        ));
    }
    let days_json = encode_days(&body.days_of_week)?;

    if let Some(category_id) = body.category_id.as_deref() {
        if Uuid::parse_str(category_id).is_err() {
            return Err(AppError::bad_request("category_id is not a valid uuid"));
        }
        if !state
            .store
            .category_exists(category_id)
            .await
            .map_err(AppError::internal)?
        {
            return Err(AppError::bad_request("category_id does not exist"));
        }
    }

    let row = state
        .store
        .create_task(
            &auth.user_id,
            body.category_id.as_deref(),
            &name,
            body.target_count,
            &days_json,
        )
        .await
        .map_err(AppError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(api::TaskResp {
            task: task_dto(&row, None),
        }),
    ))
}

pub(super) async fn api_update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::TaskUpdateReq>,
) -> Result<Json<api::TaskResp>, AppError> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::bad_request("task_id must be a valid UUID"));
    }

    let mut changes = TaskChanges::default();
    if let Some(category_id) = body.category_id {
        match category_id {
            // Explicit null detaches the category
            None => changes.category_id = Some(None),
            Some(cid) => {
                if Uuid::parse_str(&cid).is_err() {
                    return Err(AppError::bad_request("Invalid category_id for this user"));
                }
                if !state
                    .store
                    .category_owned_exists(&cid, &auth.user_id)
                    .await
                    .map_err(AppError::internal)?
                {
                    return Err(AppError::bad_request("Invalid category_id for this user"));
                }
                changes.category_id = Some(Some(cid));
            }
        }
    }
    if let Some(name) = body.task_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request(
                "task_name must be a non-empty string",
            ));
        }
        changes.task_name = Some(name);
    }
    if let Some(target) = body.target_count {
        if target <= 0 {
            return Err(AppError::bad_request(
                "target_count must be a positive integer",
            ));
        }
        changes.target_count = Some(target);
    }
    if let Some(days) = &body.days_of_week {
        changes.days_of_week = Some(encode_days(days)?);
    }
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let updated = state
        .store
        .update_task(&id, &auth.user_id, changes)
        .await
        .map_err(AppError::internal)?;
    let Some(row) = updated else {
        return Err(AppError::not_found("Task not found"));
    };
    Ok(Json(api::TaskResp {
        task: task_dto(&row, None),
    }))
}

pub(super) async fn api_delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::TaskDeletedResp>, AppError> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::bad_request("task_id must be a valid UUID"));
    }

    let deleted = state
        .store
        .delete_task(&id, &auth.user_id)
        .await
        .map_err(AppError::internal)?;
    let Some(row) = deleted else {
        return Err(AppError::not_found("Task not found"));
    };
    // Progress rows are removed by the FK cascade
    Ok(Json(api::TaskDeletedResp {
        deleted: task_dto(&row, None),
    }))
}
