use axum::{
    Json,
    extract::{Extension, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tasktally_shared::{
    api::{self, ProgressStatus},
    domain::{self, Weekday},
};
use uuid::Uuid;

use super::{AppError, AppState, auth::AuthCtx, rfc3339};
use crate::storage::models::Progress;

fn progress_dto(p: &Progress) -> api::ProgressDto {
    api::ProgressDto {
        progress_id: p.progress_id,
        task_id: p.task_id.clone(),
        date: p.date,
        completed_count: p.completed_count,
    }
}

/// Logs a day's completion count for a task. The write is an idempotent
/// upsert keyed by (task_id, date); the status tells the caller whether a
/// record was created or overwritten.
pub(super) async fn api_submit_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::SubmitProgressReq>,
) -> Result<(StatusCode, Json<api::SubmitProgressResp>), AppError> {
    if Uuid::parse_str(&body.task_id).is_err() {
        return Err(AppError::bad_request("task_id must be a valid UUID"));
    }

    let Some(date) = domain::parse_date(&body.date) else {
        return Err(AppError::bad_request("date must be \"YYYY-MM-DD\""));
    };
    let weekday = Weekday::of(date);

    if body.completed_count < 0 {
        return Err(AppError::bad_request(
            "completed_count must be a non-negative integer",
        ));
    }

    let Some(task) = state
        .store
        .get_task(&body.task_id)
        .await
        .map_err(AppError::internal)?
    else {
        return Err(AppError::not_found("Task not found"));
    };
    if task.user_id != auth.user_id {
        return Err(AppError::forbidden("Not allowed for this task"));
    }

    if body.completed_count > task.target_count {
        return Err(AppError::bad_request(format!(
            "completed_count ({}) cannot exceed target_count ({})",
            body.completed_count, task.target_count
        )));
    }

    // The date's weekday must be in the task's allowed set. Stored day
    // strings go through the same normalizer that validated them, and
    // anything unrecognized drops out of the set.
    let allowed = domain::allowed_days(&task.days());
    if !allowed.contains(&weekday) {
        return Err(AppError::bad_request(format!(
            "Date {} is a {}, which is not allowed for this task. Allowed: [{}]",
            body.date,
            weekday.display_name(),
            domain::display_days(&allowed)
        )));
    }

    let (row, created) = state
        .store
        .upsert_progress(&body.task_id, date, body.completed_count)
        .await
        .map_err(AppError::internal)?;

    let (code, status) = if created {
        (StatusCode::CREATED, ProgressStatus::Created)
    } else {
        (StatusCode::OK, ProgressStatus::Updated)
    };
    Ok((
        code,
        Json(api::SubmitProgressResp {
            progress: progress_dto(&row),
            status,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(super) struct ByDateQuery {
    date: Option<String>,
}

/// All of the user's tasks scheduled on the given date's weekday, each with
/// its completed count for that exact date.
pub(super) async fn api_tasks_by_date(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(query): Query<ByDateQuery>,
) -> Result<Json<api::TasksByDateResp>, AppError> {
    let date_str = query.date.unwrap_or_default();
    let Some(date) = domain::parse_date(&date_str) else {
        return Err(AppError::bad_request("date must be \"YYYY-MM-DD\""));
    };
    let weekday = Weekday::of(date);

    let rows = state
        .store
        .list_tasks_with_progress(&auth.user_id, date)
        .await
        .map_err(AppError::internal)?;

    let tasks = rows
        .into_iter()
        .filter(|(task, _, _)| domain::allowed_days(&task.days()).contains(&weekday))
        .map(|(task, category, completed_count)| api::TaskWithProgressDto {
            task_id: task.task_id.clone(),
            user_id: task.user_id.clone(),
            category_id: task.category_id.clone(),
            task_name: task.task_name.clone(),
            target_count: task.target_count,
            days_of_week: task.days(),
            created_at: rfc3339(task.created_at),
            category_name: category.as_ref().map(|c| c.category_name.clone()),
            category_emoji: category.as_ref().and_then(|c| c.category_emoji.clone()),
            completed_count,
        })
        .collect();

    Ok(Json(api::TasksByDateResp {
        date: date_str,
        tasks,
    }))
}
