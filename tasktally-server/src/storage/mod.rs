pub mod models;
pub mod schema;

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    Category, CategoryChanges, NewCategory, NewProgress, NewTask, NewUser, Progress, Task,
    TaskChanges, User,
};
use tracing::trace;
use uuid::Uuid;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// True when the underlying error is a UNIQUE constraint violation,
    /// so handlers can answer 409 instead of 500.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    // Users

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        full_name: Option<&str>,
        password_hash: &str,
    ) -> Result<User, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let email_owned = email.to_string();
        let username_owned = username.to_string();
        let full_name_owned = full_name.map(|s| s.to_string());
        let hash_owned = password_hash.to_string();
        tokio::task::spawn_blocking(move || -> Result<User, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let id = Uuid::new_v4().to_string();
            let new_user = NewUser {
                user_id: &id,
                email: &email_owned,
                username: &username_owned,
                full_name: full_name_owned.as_deref(),
                password_hash: &hash_owned,
            };
            diesel::insert_into(u::users)
                .values(&new_user)
                .execute(&mut conn)?;
            Ok(u::users.filter(u::user_id.eq(&id)).first::<User>(&mut conn)?)
        })
        .await?
    }

    /// Looks a user up by email or username (login identifier).
    pub async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let ident = identifier.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::email.eq(&ident).or(u::username.eq(&ident)))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Returns a user whose email or username collides with the given pair,
    /// used by signup to report which of the two is taken.
    pub async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let email_owned = email.to_string();
        let username_owned = username.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::email.eq(&email_owned).or(u::username.eq(&username_owned)))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    // Categories

    pub async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Category>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(c::categories
                .order(c::created_at.desc())
                .load::<Category>(&mut conn)?)
        })
        .await?
    }

    pub async fn create_category(
        &self,
        user_id: &str,
        name: &str,
        emoji: Option<&str>,
    ) -> Result<Category, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        let user_owned = user_id.to_string();
        let name_owned = name.to_string();
        let emoji_owned = emoji.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || -> Result<Category, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let id = Uuid::new_v4().to_string();
            let new_category = NewCategory {
                category_id: &id,
                user_id: &user_owned,
                category_name: &name_owned,
                category_emoji: emoji_owned.as_deref(),
            };
            diesel::insert_into(c::categories)
                .values(&new_category)
                .execute(&mut conn)?;
            Ok(c::categories
                .filter(c::category_id.eq(&id))
                .first::<Category>(&mut conn)?)
        })
        .await?
    }

    /// Creator-only partial update. `Ok(None)` when the category does not
    /// exist or belongs to someone else.
    pub async fn update_category(
        &self,
        category_id: &str,
        user_id: &str,
        changes: CategoryChanges,
    ) -> Result<Option<Category>, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        let id_owned = category_id.to_string();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Category>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let updated = diesel::update(
                c::categories
                    .filter(c::category_id.eq(&id_owned))
                    .filter(c::user_id.eq(&user_owned)),
            )
            .set(&changes)
            .execute(&mut conn)?;
            if updated == 0 {
                return Ok(None);
            }
            Ok(c::categories
                .filter(c::category_id.eq(&id_owned))
                .first::<Category>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn delete_category(
        &self,
        category_id: &str,
        user_id: &str,
    ) -> Result<Option<Category>, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        let id_owned = category_id.to_string();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Category>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let existing = c::categories
                .filter(c::category_id.eq(&id_owned))
                .filter(c::user_id.eq(&user_owned))
                .first::<Category>(&mut conn)
                .optional()?;
            let Some(row) = existing else {
                return Ok(None);
            };
            diesel::delete(
                c::categories
                    .filter(c::category_id.eq(&id_owned))
                    .filter(c::user_id.eq(&user_owned)),
            )
            .execute(&mut conn)?;
            Ok(Some(row))
        })
        .await?
    }

    pub async fn category_exists(&self, category_id: &str) -> Result<bool, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        let id_owned = category_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let count: i64 = c::categories
                .filter(c::category_id.eq(&id_owned))
                .count()
                .get_result(&mut conn)?;
            Ok(count > 0)
        })
        .await?
    }

    pub async fn category_owned_exists(
        &self,
        category_id: &str,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        use schema::categories::dsl as c;
        let pool = self.pool.clone();
        let id_owned = category_id.to_string();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let count: i64 = c::categories
                .filter(c::category_id.eq(&id_owned))
                .filter(c::user_id.eq(&user_owned))
                .count()
                .get_result(&mut conn)?;
            Ok(count > 0)
        })
        .await?
    }

    // Tasks

    pub async fn list_tasks_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<(Task, Option<Category>)>, StorageError> {
        use schema::{categories, user_tasks};
        let pool = self.pool.clone();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(
            move || -> Result<Vec<(Task, Option<Category>)>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                Ok(user_tasks::table
                    .left_join(categories::table)
                    .filter(user_tasks::user_id.eq(&user_owned))
                    .order(user_tasks::created_at.desc())
                    .select((Task::as_select(), Option::<Category>::as_select()))
                    .load::<(Task, Option<Category>)>(&mut conn)?)
            },
        )
        .await?
    }

    pub async fn create_task(
        &self,
        user_id: &str,
        category_id: Option<&str>,
        name: &str,
        target_count: i32,
        days_of_week_json: &str,
    ) -> Result<Task, StorageError> {
        use schema::user_tasks::dsl as t;
        let pool = self.pool.clone();
        let user_owned = user_id.to_string();
        let category_owned = category_id.map(|s| s.to_string());
        let name_owned = name.to_string();
        let days_owned = days_of_week_json.to_string();
        tokio::task::spawn_blocking(move || -> Result<Task, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let id = Uuid::new_v4().to_string();
            let new_task = NewTask {
                task_id: &id,
                user_id: &user_owned,
                category_id: category_owned.as_deref(),
                task_name: &name_owned,
                target_count,
                days_of_week: &days_owned,
            };
            diesel::insert_into(t::user_tasks)
                .values(&new_task)
                .execute(&mut conn)?;
            Ok(t::user_tasks
                .filter(t::task_id.eq(&id))
                .first::<Task>(&mut conn)?)
        })
        .await?
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, StorageError> {
        use schema::user_tasks::dsl as t;
        let pool = self.pool.clone();
        let id_owned = task_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Task>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(t::user_tasks
                .filter(t::task_id.eq(&id_owned))
                .first::<Task>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Owner-only partial update. `Ok(None)` when the task does not exist
    /// or belongs to someone else.
    pub async fn update_task(
        &self,
        task_id: &str,
        user_id: &str,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StorageError> {
        use schema::user_tasks::dsl as t;
        let pool = self.pool.clone();
        let id_owned = task_id.to_string();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Task>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let updated = diesel::update(
                t::user_tasks
                    .filter(t::task_id.eq(&id_owned))
                    .filter(t::user_id.eq(&user_owned)),
            )
            .set(&changes)
            .execute(&mut conn)?;
            if updated == 0 {
                return Ok(None);
            }
            Ok(t::user_tasks
                .filter(t::task_id.eq(&id_owned))
                .first::<Task>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Owner-only delete; progress rows go with the task via FK cascade.
    pub async fn delete_task(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Task>, StorageError> {
        use schema::user_tasks::dsl as t;
        let pool = self.pool.clone();
        let id_owned = task_id.to_string();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Task>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let existing = t::user_tasks
                .filter(t::task_id.eq(&id_owned))
                .filter(t::user_id.eq(&user_owned))
                .first::<Task>(&mut conn)
                .optional()?;
            let Some(row) = existing else {
                return Ok(None);
            };
            diesel::delete(
                t::user_tasks
                    .filter(t::task_id.eq(&id_owned))
                    .filter(t::user_id.eq(&user_owned)),
            )
            .execute(&mut conn)?;
            Ok(Some(row))
        })
        .await?
    }

    // Progress

    /// Idempotent write keyed by (task_id, date): one conditional upsert in
    /// an immediate transaction. Returns the stored row and whether it was
    /// created (`true`) or overwritten (`false`).
    pub async fn upsert_progress(
        &self,
        task_id: &str,
        date: NaiveDate,
        completed_count: i32,
    ) -> Result<(Progress, bool), StorageError> {
        use schema::task_progress::dsl as tp;
        let pool = self.pool.clone();
        let task_owned = task_id.to_string();
        trace!(task_id = %task_owned, %date, completed_count, "upsert_progress starting");
        tokio::task::spawn_blocking(move || -> Result<(Progress, bool), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<(Progress, bool), StorageError> {
                let existing: Option<i32> = tp::task_progress
                    .filter(tp::task_id.eq(&task_owned))
                    .filter(tp::date.eq(date))
                    .select(tp::progress_id)
                    .first::<i32>(conn)
                    .optional()?;
                let new_row = NewProgress {
                    task_id: &task_owned,
                    date,
                    completed_count,
                };
                diesel::insert_into(tp::task_progress)
                    .values(&new_row)
                    .on_conflict((tp::task_id, tp::date))
                    .do_update()
                    .set(tp::completed_count.eq(completed_count))
                    .execute(conn)?;
                let row = tp::task_progress
                    .filter(tp::task_id.eq(&task_owned))
                    .filter(tp::date.eq(date))
                    .first::<Progress>(conn)?;
                Ok((row, existing.is_none()))
            })
        })
        .await?
    }

    /// The user's tasks with joined category info and each task's completed
    /// count for the given date (0 when nothing was logged). Weekday
    /// filtering happens in the caller.
    pub async fn list_tasks_with_progress(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<(Task, Option<Category>, i32)>, StorageError> {
        use schema::{categories, task_progress, user_tasks};
        let pool = self.pool.clone();
        let user_owned = user_id.to_string();
        tokio::task::spawn_blocking(
            move || -> Result<Vec<(Task, Option<Category>, i32)>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                let rows: Vec<(Task, Option<Category>)> = user_tasks::table
                    .left_join(categories::table)
                    .filter(user_tasks::user_id.eq(&user_owned))
                    .order(user_tasks::created_at.desc())
                    .select((Task::as_select(), Option::<Category>::as_select()))
                    .load::<(Task, Option<Category>)>(&mut conn)?;

                let ids: Vec<String> = rows.iter().map(|(t, _)| t.task_id.clone()).collect();
                let counts: Vec<(String, i32)> = task_progress::table
                    .filter(task_progress::task_id.eq_any(&ids))
                    .filter(task_progress::date.eq(date))
                    .select((task_progress::task_id, task_progress::completed_count))
                    .load::<(String, i32)>(&mut conn)?;
                let mut by_task: std::collections::HashMap<String, i32> =
                    std::collections::HashMap::new();
                for (tid, count) in counts {
                    by_task.insert(tid, count);
                }

                Ok(rows
                    .into_iter()
                    .map(|(task, category)| {
                        let count = by_task.get(&task.task_id).copied().unwrap_or(0);
                        (task, category, count)
                    })
                    .collect())
            },
        )
        .await?
    }
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // WAL for better read/write concurrency, busy timeout for writer
    // contention, and foreign_keys so the CASCADE / SET NULL rules apply
    // (SQLite leaves them off per connection by default).
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
