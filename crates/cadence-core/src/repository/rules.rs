use crate::error::CoreError;
use crate::models::{
    validate_rule_fields, NewRuleData, RecurrenceRow, RecurrenceRule, RuleProgress, UpdateRuleData,
};
use crate::repository::{short_id_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct ProgressRow {
    occurrences_generated: i64,
    last_generated_at: Option<DateTime<Utc>>,
    version: i64,
}

/// Decodes stored rows, skipping (and logging) any that no longer describe a
/// valid pattern. Such rules stay inert until their owner fixes them.
fn decode_rows(rows: Vec<RecurrenceRow>) -> Vec<RecurrenceRule> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match RecurrenceRule::try_from(row) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "skipping undecodable recurrence rule");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl super::RuleStore for SqliteRepository {
    async fn create_rule(&self, data: NewRuleData) -> Result<RecurrenceRule, CoreError> {
        data.validate()?;

        let now = Utc::now();
        let rule = RecurrenceRule {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            is_active: true,
            pattern: data.pattern,
            start_date: data.start_date,
            termination: data.termination,
            template: data.template,
            progress: RuleProgress::default(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_rule_in_transaction(&mut tx, &rule).await?;
        tx.commit().await?;

        tracing::info!(rule_id = %rule.id, pattern = %rule.pattern, "created recurrence rule");
        Ok(rule)
    }

    async fn find_rule(&self, owner_id: &str, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RecurrenceRow> =
            sqlx::query_as("SELECT * FROM recurrences WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(self.pool())
                .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn find_rules_by_short_id(&self, owner_id: &str, short_id: &str) -> Result<Vec<RecurrenceRule>, CoreError> {
        let pattern = short_id_pattern(short_id)?;
        let rows: Vec<RecurrenceRow> = sqlx::query_as(
            "SELECT * FROM recurrences WHERE owner_id = $1 AND hex(id) LIKE $2 ORDER BY created_at",
        )
        .bind(owner_id)
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        Ok(decode_rows(rows))
    }

    async fn find_rules_for_owner(&self, owner_id: &str) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rows: Vec<RecurrenceRow> =
            sqlx::query_as("SELECT * FROM recurrences WHERE owner_id = $1 ORDER BY created_at DESC")
                .bind(owner_id)
                .fetch_all(self.pool())
                .await?;
        Ok(decode_rows(rows))
    }

    async fn find_active_rules_for_owner(&self, owner_id: &str) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rows: Vec<RecurrenceRow> = sqlx::query_as(
            "SELECT * FROM recurrences WHERE owner_id = $1 AND is_active = 1 ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        Ok(decode_rows(rows))
    }

    async fn update_rule(&self, owner_id: &str, id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError> {
        if data.is_empty() {
            return Err(CoreError::InvalidInput("No fields to update".to_string()));
        }

        let mut tx = self.pool().begin().await?;

        let row: RecurrenceRow =
            sqlx::query_as("SELECT * FROM recurrences WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Recurrence with id {} not found", id)))?;
        let mut rule = RecurrenceRule::try_from(row)?;
        let expected_version = rule.progress.version;

        if let Some(pattern) = data.pattern {
            pattern.validate()?;
            rule.pattern = pattern;
        }
        if let Some(start_date) = data.start_date {
            rule.start_date = start_date;
        }
        if let Some(termination) = data.termination {
            rule.termination = termination;
        }
        if let Some(title) = data.title {
            rule.template.title = title;
        }
        if let Some(description) = data.description {
            rule.template.description = description;
        }
        if let Some(duration) = data.duration_minutes {
            rule.template.duration_minutes = duration;
        }
        if let Some(priority) = data.priority {
            rule.template.priority = priority;
        }
        if let Some(active) = data.is_active {
            rule.is_active = active;
        }
        validate_rule_fields(&rule.template, rule.termination)?;

        rule.updated_at = Utc::now();
        rule.progress.version = expected_version + 1;

        let columns = rule.pattern.to_columns()?;
        let result = sqlx::query(
            r#"UPDATE recurrences SET
                type = $1, interval = $2, interval_unit = $3, weekdays = $4,
                month_day = $5, month_week = $6, month_weekday = $7,
                end_type = $8, end_date = $9, end_count = $10, start_date = $11,
                title = $12, description = $13, duration_minutes = $14, priority = $15,
                is_active = $16, version = version + 1, updated_at = $17
            WHERE id = $18 AND owner_id = $19 AND version = $20"#,
        )
        .bind(columns.kind)
        .bind(columns.interval)
        .bind(columns.interval_unit)
        .bind(columns.weekdays)
        .bind(columns.month_day)
        .bind(columns.month_week)
        .bind(columns.month_weekday)
        .bind(rule.termination.end_type())
        .bind(rule.termination.end_date())
        .bind(rule.termination.end_count().map(i64::from))
        .bind(rule.start_date)
        .bind(&rule.template.title)
        .bind(&rule.template.description)
        .bind(rule.template.duration_minutes.map(i64::from))
        .bind(rule.template.priority)
        .bind(rule.is_active)
        .bind(rule.updated_at)
        .bind(id)
        .bind(owner_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Recurrence {} was modified concurrently; retry the update",
                id
            )));
        }

        tx.commit().await?;
        Ok(rule)
    }

    async fn delete_rule(&self, owner_id: &str, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM recurrences WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Recurrence with id {} not found", id)));
        }

        Ok(())
    }

    async fn record_progress(&self, rule_id: Uuid, added: u32, at: DateTime<Utc>) -> Result<RuleProgress, CoreError> {
        let mut tx = self.pool().begin().await?;
        let row: Option<ProgressRow> = sqlx::query_as(
            r#"UPDATE recurrences
            SET occurrences_generated = occurrences_generated + $1,
                last_generated_at = $2,
                version = version + 1,
                updated_at = $2
            WHERE id = $3
            RETURNING occurrences_generated, last_generated_at, version"#,
        )
        .bind(i64::from(added))
        .bind(at)
        .bind(rule_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let row = row.ok_or_else(|| CoreError::NotFound(format!("Recurrence with id {} not found", rule_id)))?;

        Ok(RuleProgress {
            occurrences_generated: u32::try_from(row.occurrences_generated).unwrap_or(u32::MAX),
            last_generated_at: row.last_generated_at,
            version: row.version,
        })
    }
}

impl SqliteRepository {
    async fn insert_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let columns = rule.pattern.to_columns()?;

        sqlx::query(
            r#"INSERT INTO recurrences (
                id, owner_id, type, interval, interval_unit, weekdays,
                month_day, month_week, month_weekday,
                end_type, end_date, end_count, start_date,
                title, description, duration_minutes, priority,
                occurrences_generated, last_generated_at, version, is_active,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)"#,
        )
        .bind(rule.id)
        .bind(&rule.owner_id)
        .bind(columns.kind)
        .bind(columns.interval)
        .bind(columns.interval_unit)
        .bind(columns.weekdays)
        .bind(columns.month_day)
        .bind(columns.month_week)
        .bind(columns.month_weekday)
        .bind(rule.termination.end_type())
        .bind(rule.termination.end_date())
        .bind(rule.termination.end_count().map(i64::from))
        .bind(rule.start_date)
        .bind(&rule.template.title)
        .bind(&rule.template.description)
        .bind(rule.template.duration_minutes.map(i64::from))
        .bind(rule.template.priority)
        .bind(i64::from(rule.progress.occurrences_generated))
        .bind(rule.progress.last_generated_at)
        .bind(rule.progress.version)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
