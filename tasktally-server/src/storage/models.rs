use crate::storage::schema::{categories, task_progress, user_tasks, users};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
#[diesel(primary_key(user_id))]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub user_id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub full_name: Option<&'a str>,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = categories)]
#[diesel(primary_key(category_id))]
pub struct Category {
    pub category_id: String,
    pub user_id: String,
    pub category_name: String,
    pub category_emoji: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub category_id: &'a str,
    pub user_id: &'a str,
    pub category_name: &'a str,
    pub category_emoji: Option<&'a str>,
}

/// Partial update for PATCH. Outer `None` leaves the column untouched,
/// `Some(None)` on the nullable column writes NULL.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = categories)]
pub struct CategoryChanges {
    pub category_name: Option<String>,
    pub category_emoji: Option<Option<String>>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        self.category_name.is_none() && self.category_emoji.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = user_tasks)]
#[diesel(primary_key(task_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
#[diesel(belongs_to(Category, foreign_key = category_id))]
pub struct Task {
    pub task_id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub task_name: String,
    pub target_count: i32,
    /// JSON array of the day strings as supplied at create/update time.
    pub days_of_week: String,
    pub created_at: NaiveDateTime,
}

impl Task {
    pub fn days(&self) -> Vec<String> {
        serde_json::from_str(&self.days_of_week).unwrap_or_default()
    }
}

#[derive(Insertable)]
#[diesel(table_name = user_tasks)]
pub struct NewTask<'a> {
    pub task_id: &'a str,
    pub user_id: &'a str,
    pub category_id: Option<&'a str>,
    pub task_name: &'a str,
    pub target_count: i32,
    pub days_of_week: &'a str,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = user_tasks)]
pub struct TaskChanges {
    pub category_id: Option<Option<String>>,
    pub task_name: Option<String>,
    pub target_count: Option<i32>,
    pub days_of_week: Option<String>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.task_name.is_none()
            && self.target_count.is_none()
            && self.days_of_week.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = task_progress)]
#[diesel(primary_key(progress_id))]
#[diesel(belongs_to(Task, foreign_key = task_id))]
pub struct Progress {
    pub progress_id: i32,
    pub task_id: String,
    pub date: NaiveDate,
    pub completed_count: i32,
}

#[derive(Insertable)]
#[diesel(table_name = task_progress)]
pub struct NewProgress<'a> {
    pub task_id: &'a str,
    pub date: NaiveDate,
    pub completed_count: i32,
}
