//! SQLite persistence layer.
//!
//! One `Storage` per process wrapping a `SqlitePool` (WAL mode, foreign keys
//! on). Schema lives in `src/storage/migrations` and is embedded at compile
//! time. Rows are plain `FromRow` structs with RFC 3339 UTC TEXT timestamps
//! and uuid-v4 TEXT ids.

use anyhow::{anyhow, Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::model::AssignmentStatus;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339()
}

/// True when `err` is the storage layer rejecting a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ─── Row types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    /// RFC 3339 UTC, or NULL when the task has no due date.
    pub due_date: Option<String>,
    pub priority: String,
    pub status: String,
    pub creator_id: String,
    pub created_at: String,
    /// Computed per read: rows in task_assignments with status 'assigned'.
    pub assigned_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub status: String,
    pub created_at: String,
    // Joined from the referenced task for serialization and the access gate.
    pub task_title: String,
    pub task_due_date: Option<String>,
    pub task_creator_id: String,
}

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.due_date, t.priority, t.status, \
     t.creator_id, t.created_at, \
     (SELECT COUNT(*) FROM task_assignments a \
      WHERE a.task_id = t.id AND a.status = 'assigned') AS assigned_count";

const ASSIGNMENT_COLUMNS: &str = "a.id, a.user_id, a.task_id, a.status, a.created_at, \
     t.title AS task_title, t.due_date AS task_due_date, t.creator_id AS task_creator_id";

// ─── Task filtering ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskOrdering {
    #[default]
    DueDate,
    DueDateDesc,
    CreatedAt,
    CreatedAtDesc,
}

impl TaskOrdering {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "due_date" => Some(Self::DueDate),
            "-due_date" => Some(Self::DueDateDesc),
            "created_at" => Some(Self::CreatedAt),
            "-created_at" => Some(Self::CreatedAtDesc),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::DueDate => "t.due_date ASC",
            Self::DueDateDesc => "t.due_date DESC",
            Self::CreatedAt => "t.created_at ASC",
            Self::CreatedAtDesc => "t.created_at DESC",
        }
    }
}

/// Structured view over the `/api/tasks` query parameters. Datetime bounds
/// are already normalized to UTC RFC 3339 by the caller, so plain string
/// comparison in SQL is correct.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub title: Option<String>,
    pub due_after: Option<String>,
    pub due_before: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    /// When set, restrict to due_date strictly greater than this instant.
    pub upcoming_after: Option<String>,
    pub ordering: TaskOrdering,
}

impl TaskFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(title) = &self.title {
            clauses.push("t.title LIKE ? ESCAPE '\\'");
            args.push(like_pattern(title));
        }
        if let Some(after) = &self.due_after {
            clauses.push("t.due_date >= ?");
            args.push(after.clone());
        }
        if let Some(before) = &self.due_before {
            clauses.push("t.due_date <= ?");
            args.push(before.clone());
        }
        if let Some(status) = &self.status {
            clauses.push("LOWER(t.status) = LOWER(?)");
            args.push(status.clone());
        }
        if let Some(search) = &self.search {
            clauses.push("(t.title LIKE ? ESCAPE '\\' OR t.description LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            args.push(pattern.clone());
            args.push(pattern);
        }
        if let Some(now) = &self.upcoming_after {
            clauses.push("t.due_date > ?");
            args.push(now.clone());
        }

        if clauses.is_empty() {
            (String::new(), args)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), args)
        }
    }
}

/// SQLite LIKE is case-insensitive for ASCII; escape the wildcards so user
/// input matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Outcome of the assign workflow for a (user, task) pair.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Created(AssignmentRow),
    /// A row already existed; carries its current status.
    AlreadyAssigned(String),
}

// ─── Storage ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("taskd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        sqlx::migrate!("src/storage/migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    // ─── Users ───────────────────────────────────────────────────────────────

    /// Insert a user. A duplicate username surfaces as a `sqlx::Error` for
    /// which [`is_unique_violation`] is true; callers map it to a validation
    /// error.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        is_staff: bool,
    ) -> Result<UserRow, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = now_utc();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_staff, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(is_staff)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM users ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn count_users(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Partial update; `None` fields are left unchanged. Duplicate usernames
    /// surface the same way as in [`Storage::create_user`].
    pub async fn update_user(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<&str> = Vec::new();
        if let Some(username) = username {
            sets.push("username = ?");
            args.push(username);
        }
        if let Some(email) = email {
            sets.push("email = ?");
            args.push(email);
        }
        if let Some(password_hash) = password_hash {
            sets.push("password_hash = ?");
            args.push(password_hash);
        }
        if sets.is_empty() {
            return Ok(());
        }
        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        for arg in args {
            query = query.bind(arg);
        }
        query.bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Auth tokens ─────────────────────────────────────────────────────────

    pub async fn insert_token(&self, token: &str, user_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(now_utc())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_user_by_token(&self, token: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as(
            "SELECT u.* FROM users u JOIN auth_tokens t ON t.user_id = u.id WHERE t.token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn delete_token(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Tasks ───────────────────────────────────────────────────────────────

    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        due_date: Option<&str>,
        priority: &str,
        status: &str,
        creator_id: &str,
    ) -> Result<TaskRow> {
        let id = Uuid::new_v4().to_string();
        let now = now_utc();
        sqlx::query(
            "INSERT INTO tasks (id, title, description, due_date, priority, status, creator_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(description)
        .bind(due_date)
        .bind(priority)
        .bind(status)
        .bind(creator_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_task(&id)
            .await?
            .ok_or_else(|| anyhow!("task not found after insert"))
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRow>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?");
        Ok(sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskRow>> {
        let (where_sql, args) = filter.where_clause();
        // t.id as a tiebreak keeps pages deterministic when the sort key repeats.
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t{where_sql} ORDER BY {}, t.id ASC LIMIT ? OFFSET ?",
            filter.ordering.sql()
        );
        with_timeout(async {
            let mut query = sqlx::query_as::<_, TaskRow>(&sql);
            for arg in &args {
                query = query.bind(arg.as_str());
            }
            Ok(query
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?)
        })
        .await
    }

    pub async fn count_tasks(&self, filter: &TaskFilter) -> Result<i64> {
        let (where_sql, args) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM tasks t{where_sql}");
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in &args {
            query = query.bind(arg.as_str());
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Partial update; `None` leaves the column unchanged, `Some(None)` for
    /// the due date clears it. Creator and created_at are immutable — there
    /// is deliberately no way to touch them here.
    pub async fn update_task(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        due_date: Option<Option<&str>>,
        priority: Option<&str>,
        status: Option<&str>,
    ) -> Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Option<&str>> = Vec::new();
        if let Some(title) = title {
            sets.push("title = ?");
            args.push(Some(title));
        }
        if let Some(description) = description {
            sets.push("description = ?");
            args.push(Some(description));
        }
        if let Some(due_date) = due_date {
            sets.push("due_date = ?");
            args.push(due_date);
        }
        if let Some(priority) = priority {
            sets.push("priority = ?");
            args.push(Some(priority));
        }
        if let Some(status) = status {
            sets.push("status = ?");
            args.push(Some(status));
        }
        if sets.is_empty() {
            return Ok(());
        }
        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        for arg in args {
            query = query.bind(arg);
        }
        query.bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Delete a task; assignments cascade via the schema.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Assignment workflow ─────────────────────────────────────────────────

    /// Assign `user_id` to `task_id`, idempotently.
    ///
    /// The pre-read is a fast path only. Two concurrent assigns for the same
    /// pair can both miss it; the UNIQUE(user_id, task_id) constraint then
    /// rejects the second INSERT, and that violation is mapped to the same
    /// `AlreadyAssigned` outcome. A raw constraint error never escapes.
    pub async fn assign_user(&self, user_id: &str, task_id: &str) -> Result<AssignOutcome> {
        if let Some(existing) = self.get_assignment_for(user_id, task_id).await? {
            return Ok(AssignOutcome::AlreadyAssigned(existing.status));
        }

        let id = Uuid::new_v4().to_string();
        let now = now_utc();
        let inserted = sqlx::query(
            "INSERT INTO task_assignments (id, user_id, task_id, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(task_id)
        .bind(AssignmentStatus::Assigned.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                let row = self
                    .get_assignment(&id)
                    .await?
                    .ok_or_else(|| anyhow!("assignment not found after insert"))?;
                Ok(AssignOutcome::Created(row))
            }
            Err(err) if is_unique_violation(&err) => {
                let existing = self
                    .get_assignment_for(user_id, task_id)
                    .await?
                    .ok_or_else(|| anyhow!("assignment vanished after unique violation"))?;
                Ok(AssignOutcome::AlreadyAssigned(existing.status))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the (user, task) assignment regardless of its status.
    /// Returns false when no row existed.
    pub async fn unassign_user(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM task_assignments WHERE user_id = ? AND task_id = ?")
            .bind(user_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentRow>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM task_assignments a \
             JOIN tasks t ON t.id = a.task_id WHERE a.id = ?"
        );
        Ok(sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_assignment_for(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Option<AssignmentRow>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM task_assignments a \
             JOIN tasks t ON t.id = a.task_id WHERE a.user_id = ? AND a.task_id = ?"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// List assignments, newest first. `scope_user` restricts to a single
    /// assignee (the non-staff view).
    pub async fn list_assignments(
        &self,
        scope_user: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AssignmentRow>> {
        let where_sql = if scope_user.is_some() {
            " WHERE a.user_id = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM task_assignments a \
             JOIN tasks t ON t.id = a.task_id{where_sql} \
             ORDER BY a.created_at DESC, a.id ASC LIMIT ? OFFSET ?"
        );
        with_timeout(async {
            let mut query = sqlx::query_as::<_, AssignmentRow>(&sql);
            if let Some(user_id) = scope_user {
                query = query.bind(user_id);
            }
            Ok(query
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?)
        })
        .await
    }

    pub async fn count_assignments(&self, scope_user: Option<&str>) -> Result<i64> {
        match scope_user {
            Some(user_id) => {
                let row: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM task_assignments WHERE user_id = ?")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(row.0)
            }
            None => {
                let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_assignments")
                    .fetch_one(&self.pool)
                    .await?;
                Ok(row.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn open() -> (Storage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        (storage, dir)
    }

    async fn seed_user(storage: &Storage, username: &str) -> UserRow {
        storage
            .create_user(username, &format!("{username}@example.com"), "hash", false)
            .await
            .unwrap()
    }

    fn future(days: i64) -> String {
        (Utc::now() + Duration::days(days)).to_rfc3339()
    }

    #[tokio::test]
    async fn task_defaults_and_assigned_count() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        let task = storage
            .create_task("Ship report", "", Some(&future(7)), "medium", "pending", &user.id)
            .await
            .unwrap();
        assert_eq!(task.status, "pending");
        assert_eq!(task.priority, "medium");
        assert_eq!(task.creator_id, user.id);
        assert_eq!(task.assigned_count, 0);
    }

    #[tokio::test]
    async fn assign_is_idempotent() {
        let (storage, _dir) = open().await;
        let creator = seed_user(&storage, "creator").await;
        let assignee = seed_user(&storage, "assignee").await;
        let task = storage
            .create_task("T", "", None, "medium", "pending", &creator.id)
            .await
            .unwrap();

        let first = storage.assign_user(&assignee.id, &task.id).await.unwrap();
        let row = match first {
            AssignOutcome::Created(row) => row,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(row.status, "assigned");
        assert_eq!(row.task_creator_id, creator.id);

        let second = storage.assign_user(&assignee.id, &task.id).await.unwrap();
        match second {
            AssignOutcome::AlreadyAssigned(status) => assert_eq!(status, "assigned"),
            other => panic!("expected AlreadyAssigned, got {other:?}"),
        }

        let task = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.assigned_count, 1);
        assert_eq!(storage.count_assignments(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_violation_maps_to_already_assigned() {
        // Bypass the fast-path read by inserting the row directly, the way a
        // concurrent assign would have.
        let (storage, _dir) = open().await;
        let creator = seed_user(&storage, "creator").await;
        let task = storage
            .create_task("T", "", None, "medium", "pending", &creator.id)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO task_assignments (id, user_id, task_id, status, created_at)
             VALUES ('a1', ?, ?, 'completed', ?)",
        )
        .bind(&creator.id)
        .bind(&task.id)
        .bind(Utc::now().to_rfc3339())
        .execute(&storage.pool)
        .await
        .unwrap();

        match storage.assign_user(&creator.id, &task.id).await.unwrap() {
            AssignOutcome::AlreadyAssigned(status) => assert_eq!(status, "completed"),
            other => panic!("expected AlreadyAssigned, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unassign_removes_any_status() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        let task = storage
            .create_task("T", "", None, "medium", "pending", &user.id)
            .await
            .unwrap();

        assert!(!storage.unassign_user(&user.id, &task.id).await.unwrap());

        storage.assign_user(&user.id, &task.id).await.unwrap();
        sqlx::query("UPDATE task_assignments SET status = 'completed'")
            .execute(&storage.pool)
            .await
            .unwrap();
        assert!(storage.unassign_user(&user.id, &task.id).await.unwrap());
        assert_eq!(storage.count_assignments(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_task_cascades_to_assignments() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        let task = storage
            .create_task("T", "", None, "medium", "pending", &user.id)
            .await
            .unwrap();
        storage.assign_user(&user.id, &task.id).await.unwrap();

        assert!(storage.delete_task(&task.id).await.unwrap());
        assert_eq!(storage.count_assignments(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_username_is_unique_violation() {
        let (storage, _dir) = open().await;
        seed_user(&storage, "taken").await;
        let err = storage
            .create_user("taken", "other@example.com", "hash", false)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn filters_compose() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        storage
            .create_task("Ship report", "quarterly numbers", Some(&future(7)), "high", "pending", &user.id)
            .await
            .unwrap();
        storage
            .create_task("Water plants", "", Some(&future(2)), "low", "completed", &user.id)
            .await
            .unwrap();
        storage
            .create_task("Old chore", "", Some(&(Utc::now() - Duration::days(1)).to_rfc3339()), "low", "pending", &user.id)
            .await
            .unwrap();

        // Case-insensitive title substring.
        let filter = TaskFilter {
            title: Some("SHIP".into()),
            ..Default::default()
        };
        let rows = storage.list_tasks(&filter, 50, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Ship report");

        // Search spans title and description.
        let filter = TaskFilter {
            search: Some("quarterly".into()),
            ..Default::default()
        };
        assert_eq!(storage.count_tasks(&filter).await.unwrap(), 1);

        // Upcoming + status, ordered due_date ascending.
        let filter = TaskFilter {
            status: Some("PENDING".into()),
            upcoming_after: Some(Utc::now().to_rfc3339()),
            ..Default::default()
        };
        let rows = storage.list_tasks(&filter, 50, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Ship report");

        // Inclusive due-date range.
        let filter = TaskFilter {
            due_after: Some(Utc::now().to_rfc3339()),
            due_before: Some(future(3)),
            ..Default::default()
        };
        let rows = storage.list_tasks(&filter, 50, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Water plants");

        // Descending ordering.
        let filter = TaskFilter {
            ordering: TaskOrdering::DueDateDesc,
            upcoming_after: Some(Utc::now().to_rfc3339()),
            ..Default::default()
        };
        let rows = storage.list_tasks(&filter, 50, 0).await.unwrap();
        assert_eq!(rows[0].title, "Ship report");
    }

    #[tokio::test]
    async fn like_wildcards_match_literally() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        storage
            .create_task("100% done", "", None, "low", "pending", &user.id)
            .await
            .unwrap();
        storage
            .create_task("100 percent", "", None, "low", "pending", &user.id)
            .await
            .unwrap();

        let filter = TaskFilter {
            title: Some("100%".into()),
            ..Default::default()
        };
        let rows = storage.list_tasks(&filter, 50, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "100% done");
    }

    #[tokio::test]
    async fn assignment_listing_scopes_and_orders() {
        let (storage, _dir) = open().await;
        let creator = seed_user(&storage, "creator").await;
        let other = seed_user(&storage, "other").await;
        let t1 = storage
            .create_task("T1", "", None, "medium", "pending", &creator.id)
            .await
            .unwrap();
        let t2 = storage
            .create_task("T2", "", None, "medium", "pending", &creator.id)
            .await
            .unwrap();
        storage.assign_user(&creator.id, &t1.id).await.unwrap();
        storage.assign_user(&other.id, &t1.id).await.unwrap();
        storage.assign_user(&other.id, &t2.id).await.unwrap();

        let all = storage.list_assignments(None, 50, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        let mine = storage
            .list_assignments(Some(&other.id), 50, 0)
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|a| a.user_id == other.id));
        assert_eq!(storage.count_assignments(Some(&creator.id)).await.unwrap(), 1);
        // Newest first.
        assert!(all[0].created_at >= all[2].created_at);
    }

    #[tokio::test]
    async fn token_round_trip() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        storage.insert_token("tok", &user.id).await.unwrap();
        let found = storage.find_user_by_token("tok").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(storage.delete_token("tok").await.unwrap());
        assert!(!storage.delete_token("tok").await.unwrap());
        assert!(storage.find_user_by_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_task_partial_and_clear_due_date() {
        let (storage, _dir) = open().await;
        let user = seed_user(&storage, "u1").await;
        let task = storage
            .create_task("T", "d", Some(&future(7)), "medium", "pending", &user.id)
            .await
            .unwrap();

        storage
            .update_task(&task.id, Some("T2"), None, Some(None), None, Some("in_progress"))
            .await
            .unwrap();
        let task = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.title, "T2");
        assert_eq!(task.description, "d");
        assert_eq!(task.due_date, None);
        assert_eq!(task.status, "in_progress");
    }
}
