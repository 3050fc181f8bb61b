use crate::error::CoreError;
use crate::models::{InsertOutcome, NewTaskData, Task, TaskPriority, TaskQuery, TaskStatus};
use crate::repository::{short_id_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

#[async_trait]
impl super::TaskStore for SqliteRepository {
    async fn materialized_days(&self, rule_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<HashSet<NaiveDate>, CoreError> {
        let Some((from, to)) = storable_day_range(from, to) else {
            return Ok(HashSet::new());
        };
        let days: Vec<NaiveDate> = sqlx::query_scalar(
            r#"SELECT occurrence_day FROM tasks
            WHERE recurrence_id = $1 AND occurrence_day BETWEEN $2 AND $3"#,
        )
        .bind(rule_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(days.into_iter().collect())
    }

    async fn insert_instances(&self, instances: &[Task]) -> Result<Vec<InsertOutcome>, CoreError> {
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool().begin().await?;
        let mut outcomes = Vec::with_capacity(instances.len());
        for task in instances {
            outcomes.push(Self::insert_task_in_transaction(&mut tx, task).await?);
        }
        tx.commit().await?;

        Ok(outcomes)
    }

    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("title must not be empty".to_string()));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            title: data.title,
            description: data.description,
            start_at: data.start_at.unwrap_or(now),
            deadline_at: data.deadline_at,
            priority: data.priority.unwrap_or(TaskPriority::Medium),
            status: data.status.unwrap_or(TaskStatus::Planned),
            is_archived: false,
            recurrence_id: None,
            occurrence_day: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_task_in_transaction(&mut tx, &task).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn find_task(&self, owner_id: &str, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id(&self, owner_id: &str, short_id: &str) -> Result<Vec<Task>, CoreError> {
        let pattern = short_id_pattern(short_id)?;
        let tasks: Vec<Task> =
            sqlx::query_as("SELECT * FROM tasks WHERE owner_id = $1 AND hex(id) LIKE $2")
                .bind(owner_id)
                .bind(pattern)
                .fetch_all(self.pool())
                .await?;
        Ok(tasks)
    }

    async fn find_tasks(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<Task>, CoreError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE owner_id = ");
        builder.push_bind(owner_id);

        builder.push(" AND is_archived = ");
        builder.push_bind(query.archived);

        if let Some(from) = query.from {
            builder.push(" AND start_at >= ");
            builder.push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND start_at <= ");
            builder.push_bind(to);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(priority) = query.priority {
            builder.push(" AND priority = ");
            builder.push_bind(priority);
        }
        if let Some(search) = &query.search {
            builder.push(" AND title LIKE ");
            builder.push_bind(format!("%{}%", search));
        }

        builder.push(" ORDER BY start_at, title");

        let tasks = builder.build_query_as().fetch_all(self.pool()).await?;
        Ok(tasks)
    }

    async fn set_task_status(&self, owner_id: &str, id: Uuid, status: TaskStatus) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;
        let task: Option<Task> = sqlx::query_as(
            r#"UPDATE tasks SET status = $1, updated_at = $2
            WHERE id = $3 AND owner_id = $4
            RETURNING *"#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        task.ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))
    }

    async fn archive_task(&self, owner_id: &str, id: Uuid) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;
        let task: Option<Task> = sqlx::query_as(
            r#"UPDATE tasks SET is_archived = 1, updated_at = $1
            WHERE id = $2 AND owner_id = $3
            RETURNING *"#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        task.ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))
    }
}

/// Days are stored as `YYYY-MM-DD` text and compared as strings, which only
/// orders correctly for four-digit years. Bounds are clamped into that range.
fn storable_day_range(from: NaiveDate, to: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let lower = NaiveDate::from_ymd_opt(1, 1, 1)?;
    let upper = NaiveDate::from_ymd_opt(9999, 12, 31)?;
    let (from, to) = (from.max(lower), to.min(upper));
    (from <= to).then_some((from, to))
}

impl SqliteRepository {
    /// Inserts one task. A row already holding the same (rule, day) pair is
    /// left alone and reported as `AlreadyExists`.
    pub(crate) async fn insert_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: &Task,
    ) -> Result<InsertOutcome, CoreError> {
        let result = sqlx::query(
            r#"INSERT INTO tasks (
                id, owner_id, title, description, start_at, deadline_at, priority, status,
                is_archived, recurrence_id, occurrence_day, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT(recurrence_id, occurrence_day) DO NOTHING"#,
        )
        .bind(task.id)
        .bind(&task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.start_at)
        .bind(task.deadline_at)
        .bind(task.priority)
        .bind(task.status)
        .bind(task.is_archived)
        .bind(task.recurrence_id)
        .bind(task.occurrence_day)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}
