use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    InsertOutcome, NewRuleData, NewTaskData, RecurrenceRule, RuleProgress, Task, TaskQuery,
    TaskStatus, UpdateRuleData,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

pub mod rules;
pub mod tasks;

/// Storage of recurrence rules. Every lookup is scoped to the owner.
#[async_trait]
pub trait RuleStore {
    async fn create_rule(&self, data: NewRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn find_rule(&self, owner_id: &str, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rules_by_short_id(&self, owner_id: &str, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules_for_owner(&self, owner_id: &str) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_active_rules_for_owner(&self, owner_id: &str) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn update_rule(&self, owner_id: &str, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn delete_rule(&self, owner_id: &str, id: Uuid) -> Result<(), CoreError>;
    /// Atomically advances the occurrence counter by `added` and stamps
    /// `last_generated_at`. Must only be called once the instances it counts
    /// are persisted.
    async fn record_progress(&self, rule_id: Uuid, added: u32, at: DateTime<Utc>) -> Result<RuleProgress, CoreError>;
}

/// Storage of tasks, one-off and materialized.
#[async_trait]
pub trait TaskStore {
    /// Days in `[from, to]` that already hold an instance of the rule.
    /// Bounds outside years 1 to 9999 are clamped to that range.
    async fn materialized_days(&self, rule_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<HashSet<NaiveDate>, CoreError>;
    /// Writes a batch of instances atomically. A (rule, day) conflict is
    /// reported per instance as `AlreadyExists`; any other failure rolls the
    /// whole batch back.
    async fn insert_instances(&self, instances: &[Task]) -> Result<Vec<InsertOutcome>, CoreError>;
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task(&self, owner_id: &str, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id(&self, owner_id: &str, short_id: &str) -> Result<Vec<Task>, CoreError>;
    async fn find_tasks(&self, owner_id: &str, query: &TaskQuery) -> Result<Vec<Task>, CoreError>;
    async fn set_task_status(&self, owner_id: &str, id: Uuid, status: TaskStatus) -> Result<Task, CoreError>;
    async fn archive_task(&self, owner_id: &str, id: Uuid) -> Result<Task, CoreError>;
}

/// Main repository trait that composes the stores.
pub trait Repository: RuleStore + TaskStore + Send + Sync {}

impl<T: RuleStore + TaskStore + Send + Sync> Repository for T {}

/// SQLite implementation of the stores.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Normalizes a user-typed short id into a `LIKE` pattern over the upper-case
/// hex of the stored 16-byte UUID. Short ids are the trailing digits, which
/// are random in a v7 UUID; the leading ones are a timestamp.
pub(crate) fn short_id_pattern(short_id: &str) -> Result<String, CoreError> {
    let hex: String = short_id.chars().filter(|c| *c != '-').collect();
    if hex.len() < 2 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidInput(format!(
            "'{}' is not a valid short ID (at least 2 hex digits)",
            short_id
        )));
    }
    Ok(format!("%{}", hex.to_uppercase()))
}
