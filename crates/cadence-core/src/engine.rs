//! On-demand expansion of recurrence rules into task instances.
//!
//! A request for a window of days runs each active rule of the owner through
//! the [`WindowExpander`], drops days that already hold an instance, writes
//! the remainder in one batch and only then advances the rule's counter.
//! Running the same request twice creates nothing the second time.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::models::{InsertOutcome, RecurrenceRule, Task, TaskQuery, TaskStatus, Termination};
use crate::recurrence::{ExpansionConfig, ExpansionPlan, ExpansionWindow, WindowExpander};
use crate::repository::Repository;

/// What one rule contributed to an expansion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleExpansion {
    pub rule_id: Uuid,
    /// Instances written by this pass.
    pub created: u32,
    /// Days in the window that already held an instance.
    pub skipped_existing: u32,
    /// Instances another writer got to first.
    pub dropped_conflicts: u32,
    pub exhausted: bool,
}

impl RuleExpansion {
    fn empty(rule_id: Uuid) -> Self {
        Self {
            rule_id,
            created: 0,
            skipped_existing: 0,
            dropped_conflicts: 0,
            exhausted: false,
        }
    }
}

/// Summary of expanding every active rule of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionReport {
    pub window: ExpansionWindow,
    pub rules_processed: u32,
    pub instances_created: u32,
    pub rules: Vec<RuleExpansion>,
}

/// Tasks in a window, after the window has been expanded.
#[derive(Debug, Clone)]
pub struct WindowListing {
    pub tasks: Vec<Task>,
    /// `None` when the query was not bounded on both sides.
    pub report: Option<ExpansionReport>,
}

pub struct ExpansionEngine<S, C> {
    store: S,
    clock: C,
    expander: WindowExpander,
}

impl<S: Repository, C: Clock> ExpansionEngine<S, C> {
    pub fn new(store: S, clock: C, config: ExpansionConfig) -> Self {
        Self {
            store,
            clock,
            expander: WindowExpander::new(config),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn expander(&self) -> &WindowExpander {
        &self.expander
    }

    /// Expands a single rule over an already clamped window. The rule is
    /// re-read first, so a stale copy cannot spend its count budget twice.
    pub async fn expand_rule(&self, rule: &RecurrenceRule, window: &ExpansionWindow) -> Result<RuleExpansion, CoreError> {
        let current = self
            .store
            .find_rule(&rule.owner_id, rule.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence with id {} not found", rule.id)))?;
        self.expand_loaded(&current, window).await
    }

    async fn expand_loaded(&self, rule: &RecurrenceRule, window: &ExpansionWindow) -> Result<RuleExpansion, CoreError> {
        let mut outcome = RuleExpansion::empty(rule.id);
        if !rule.is_active || window.is_empty() {
            return Ok(outcome);
        }

        let existing = self.store.materialized_days(rule.id, window.from, window.to).await?;
        outcome.skipped_existing = existing.len() as u32;

        let plan = self.expander.expand(rule, window, &existing);
        outcome.exhausted = plan.exhausted;

        tracing::debug!(
            rule_id = %rule.id,
            from = %window.from,
            to = %window.to,
            accepted = plan.dates.len(),
            existing = existing.len(),
            "expanded rule"
        );

        if plan.is_empty() {
            return Ok(outcome);
        }

        let instances = materialize(rule, &plan.dates, self.clock.now());
        let results = self.store.insert_instances(&instances).await?;
        for result in &results {
            match result {
                InsertOutcome::Inserted => outcome.created += 1,
                InsertOutcome::AlreadyExists => outcome.dropped_conflicts += 1,
            }
        }

        if outcome.dropped_conflicts > 0 {
            tracing::warn!(
                rule_id = %rule.id,
                dropped = outcome.dropped_conflicts,
                "dropped instances already written by a concurrent expansion"
            );
        }

        if outcome.created > 0 {
            let progress = self
                .store
                .record_progress(rule.id, outcome.created, self.clock.now())
                .await?;
            tracing::info!(
                rule_id = %rule.id,
                created = outcome.created,
                occurrences_generated = progress.occurrences_generated,
                "materialized instances"
            );

            // Two passes over the same rule can both read the old counter
            // between the dedup lookup and this update.
            if progress.version != rule.progress.version + 1 {
                tracing::warn!(
                    rule_id = %rule.id,
                    expected_version = rule.progress.version + 1,
                    version = progress.version,
                    "rule progressed concurrently during expansion"
                );
            }
            if let Termination::Count(limit) = rule.termination {
                if progress.occurrences_generated > limit {
                    tracing::warn!(
                        rule_id = %rule.id,
                        limit,
                        occurrences_generated = progress.occurrences_generated,
                        "count limit overshot by concurrent expansions"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Expands every active rule of `owner` over `[from, to]`, capped at the
    /// configured horizon. The first persistence failure aborts the pass;
    /// rules already processed keep what they wrote.
    pub async fn expand_for_owner(&self, owner_id: &str, from: NaiveDate, to: NaiveDate) -> Result<ExpansionReport, CoreError> {
        let window = self.expander.clamp(from, to);
        let mut report = ExpansionReport {
            window,
            rules_processed: 0,
            instances_created: 0,
            rules: Vec::new(),
        };

        if window.is_empty() {
            return Ok(report);
        }
        if window.truncated {
            tracing::debug!(
                requested_to = %to,
                to = %window.to,
                horizon_days = self.expander.config().horizon_days,
                "expansion window truncated at horizon"
            );
        }

        let rules = self.store.find_active_rules_for_owner(owner_id).await?;
        for rule in &rules {
            let expansion = self.expand_loaded(rule, &window).await?;
            report.rules_processed += 1;
            report.instances_created += expansion.created;
            report.rules.push(expansion);
        }

        Ok(report)
    }

    /// Expands the query's window (when it has both bounds) and reads the
    /// matching tasks back.
    pub async fn list_tasks(&self, owner_id: &str, query: TaskQuery) -> Result<WindowListing, CoreError> {
        let report = match (query.from, query.to) {
            (Some(from), Some(to)) => Some(
                self.expand_for_owner(owner_id, from.date_naive(), to.date_naive())
                    .await?,
            ),
            _ => None,
        };

        let tasks = self.store.find_tasks(owner_id, &query).await?;
        Ok(WindowListing { tasks, report })
    }

    /// Days the rule would produce in `[from, to]`, ignoring what is already
    /// stored. Nothing is written.
    pub fn preview(&self, rule: &RecurrenceRule, from: NaiveDate, to: NaiveDate) -> (ExpansionWindow, ExpansionPlan) {
        self.expander.preview(rule, from, to)
    }
}

/// Builds one planned instance per date from the rule's template. Each
/// instance starts at the anchor's time of day on its date.
pub fn materialize(rule: &RecurrenceRule, dates: &[NaiveDate], now: chrono::DateTime<Utc>) -> Vec<Task> {
    let time_of_day = rule.start_date.time();

    dates
        .iter()
        .map(|date| {
            let start_at = Utc.from_utc_datetime(&date.and_time(time_of_day));
            let deadline_at = rule
                .template
                .duration_minutes
                .map(|minutes| start_at + Duration::minutes(i64::from(minutes)));

            Task {
                id: Uuid::now_v7(),
                owner_id: rule.owner_id.clone(),
                title: rule.template.title.clone(),
                description: rule.template.description.clone(),
                start_at,
                deadline_at,
                priority: rule.template.priority,
                status: TaskStatus::Planned,
                is_archived: false,
                recurrence_id: Some(rule.id),
                occurrence_day: Some(*date),
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}
