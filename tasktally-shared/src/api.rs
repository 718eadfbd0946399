//! Request and response bodies for the REST API.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes "field absent" (outer `None`) from "field set to null"
/// (`Some(None)`) in PATCH bodies. Use together with `#[serde(default)]`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// Users

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupReq {
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub created_at: String, // RFC3339 UTC
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResp {
    pub user: UserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginReq {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResp {
    pub token: String,
    pub user: UserDto,
}

// Categories

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryDto {
    pub category_id: String,
    pub user_id: String,
    pub category_name: String,
    pub category_emoji: Option<String>,
    pub created_at: String, // RFC3339 UTC
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryCreateReq {
    pub category_name: String,
    pub category_emoji: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CategoryUpdateReq {
    pub category_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_emoji: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResp {
    pub category: CategoryDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryListResp {
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryDeletedResp {
    pub deleted: CategoryDto,
}

// Tasks

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDto {
    pub task_id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub task_name: String,
    pub target_count: i32,
    pub days_of_week: Vec<String>,
    pub created_at: String, // RFC3339 UTC
    /// Joined category info; present only in list responses.
    pub category_name: Option<String>,
    pub category_emoji: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskCreateReq {
    pub category_id: Option<String>,
    pub task_name: String,
    pub target_count: i32,
    pub days_of_week: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskUpdateReq {
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    pub task_name: Option<String>,
    pub target_count: Option<i32>,
    pub days_of_week: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResp {
    pub task: TaskDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResp {
    pub tasks: Vec<TaskDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDeletedResp {
    pub deleted: TaskDto,
}

// Progress

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitProgressReq {
    pub task_id: String,
    pub completed_count: i32,
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressDto {
    pub progress_id: i32,
    pub task_id: String,
    pub date: NaiveDate,
    pub completed_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Created,
    Updated,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitProgressResp {
    pub progress: ProgressDto,
    pub status: ProgressStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskWithProgressDto {
    pub task_id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub task_name: String,
    pub target_count: i32,
    pub days_of_week: Vec<String>,
    pub created_at: String, // RFC3339 UTC
    pub category_name: Option<String>,
    pub category_emoji: Option<String>,
    /// Count for the queried date, 0 when nothing was logged.
    pub completed_count: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TasksByDateResp {
    pub date: String,
    pub tasks: Vec<TaskWithProgressDto>,
}
