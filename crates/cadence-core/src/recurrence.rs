use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;
use std::collections::HashSet;

use crate::models::{IntervalUnit, MonthlyPattern, Pattern, RecurrenceRule, Termination, WeekOfMonth};

/// Default cap on the number of days expanded per invocation.
pub const DEFAULT_HORIZON_DAYS: u32 = 120;

// ============================================================================
// Rule evaluation
// ============================================================================

/// Decides whether `rule` has an occurrence on `date`.
///
/// `effective_count` must include occurrences accepted earlier in the same
/// expansion pass, not only the persisted counter, or a single pass can
/// overshoot a `Count` termination.
///
/// All calendar arithmetic is done on UTC dates.
pub fn should_generate(rule: &RecurrenceRule, date: NaiveDate, effective_count: u32) -> bool {
    if date < rule.anchor_day() {
        return false;
    }

    match rule.termination {
        Termination::Until(end) if date > end => return false,
        Termination::Count(limit) if effective_count >= limit => return false,
        _ => {}
    }

    matches_pattern(&rule.pattern, rule.start_date, date)
}

/// Pattern matching alone, without the start/termination preconditions.
pub fn matches_pattern(pattern: &Pattern, anchor: DateTime<Utc>, date: NaiveDate) -> bool {
    let weekday = date.weekday();

    match pattern {
        Pattern::Daily => true,
        Pattern::Workdays => !is_weekend(weekday),
        Pattern::Weekends => is_weekend(weekday),
        Pattern::Weekly { weekdays } => weekdays.contains(&weekday),
        Pattern::Monthly(MonthlyPattern::DayOfMonth(day)) => date.day() == *day,
        Pattern::Monthly(MonthlyPattern::NthWeekday {
            week,
            weekday: target,
        }) => {
            if weekday != *target {
                return false;
            }
            match week {
                WeekOfMonth::Nth(n) => week_of_month(date) == u32::from(*n),
                WeekOfMonth::Last => is_last_weekday_of_month(date),
            }
        }
        Pattern::Yearly => same_month_and_day(date, anchor.date_naive()),
        Pattern::Custom { interval, unit } => matches_interval(*interval, *unit, anchor, date),
    }
}

#[inline]
fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// 1-based index of the week within the month: `ceil(day / 7)`.
#[inline]
fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() + 6) / 7
}

/// A weekday is the last of its kind when one week later is another month.
fn is_last_weekday_of_month(date: NaiveDate) -> bool {
    match date.checked_add_signed(Duration::days(7)) {
        Some(next_week) => next_week.month() != date.month(),
        None => true,
    }
}

#[inline]
fn same_month_and_day(date: NaiveDate, anchor: NaiveDate) -> bool {
    date.month() == anchor.month() && date.day() == anchor.day()
}

fn matches_interval(interval: u32, unit: IntervalUnit, anchor: DateTime<Utc>, date: NaiveDate) -> bool {
    if interval == 0 {
        return false;
    }
    let interval = i64::from(interval);
    let anchor_day = anchor.date_naive();
    let days = (date - anchor_day).num_days();

    match unit {
        IntervalUnit::Hours => {
            // The candidate instant carries the anchor's time-of-day.
            let candidate = date.and_time(anchor.time()).and_utc();
            let hours = (candidate - anchor).num_hours();
            hours >= 0 && hours % interval == 0
        }
        IntervalUnit::Days => days % interval == 0,
        IntervalUnit::Weeks => days % (interval * 7) == 0,
        IntervalUnit::Months => {
            let months = i64::from(date.year() - anchor_day.year()) * 12
                + i64::from(date.month())
                - i64::from(anchor_day.month());
            months % interval == 0 && date.day() == anchor_day.day()
        }
        IntervalUnit::Years => {
            let years = i64::from(date.year() - anchor_day.year());
            years % interval == 0 && same_month_and_day(date, anchor_day)
        }
    }
}

// ============================================================================
// Window expansion
// ============================================================================

/// Configuration for window expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionConfig {
    /// Maximum number of calendar days expanded per invocation, counted from
    /// the start of the requested window.
    pub horizon_days: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

/// The closed day range actually processed for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpansionWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// The requested window reached past the horizon and was cut short.
    pub truncated: bool,
}

impl ExpansionWindow {
    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |day| *day <= to)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

/// Days accepted for materialization by one expansion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionPlan {
    pub dates: Vec<NaiveDate>,
    /// The rule's termination condition was reached inside the window.
    pub exhausted: bool,
}

impl ExpansionPlan {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Drives the evaluator across a bounded day range.
#[derive(Debug, Clone, Default)]
pub struct WindowExpander {
    config: ExpansionConfig,
}

impl WindowExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExpansionConfig::default())
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Caps `[from, to]` at the configured horizon.
    pub fn clamp(&self, from: NaiveDate, to: NaiveDate) -> ExpansionWindow {
        let horizon = i64::from(self.config.horizon_days.max(1));
        let cap = from
            .checked_add_signed(Duration::days(horizon - 1))
            .unwrap_or(NaiveDate::MAX);

        if to > cap {
            ExpansionWindow {
                from,
                to: cap,
                truncated: true,
            }
        } else {
            ExpansionWindow {
                from,
                to,
                truncated: false,
            }
        }
    }

    /// Walks `window` one day at a time and returns the days that should be
    /// materialized. Days in `already_materialized` are never proposed.
    pub fn expand(
        &self,
        rule: &RecurrenceRule,
        window: &ExpansionWindow,
        already_materialized: &HashSet<NaiveDate>,
    ) -> ExpansionPlan {
        let persisted = rule.progress.occurrences_generated;
        let mut plan = ExpansionPlan::default();

        if window.is_empty() {
            return plan;
        }

        for day in window.days() {
            let effective = persisted.saturating_add(plan.dates.len() as u32);

            match rule.termination {
                Termination::Count(limit) if effective >= limit => {
                    plan.exhausted = true;
                    break;
                }
                Termination::Until(end) if day > end => {
                    plan.exhausted = true;
                    break;
                }
                _ => {}
            }

            if already_materialized.contains(&day) {
                continue;
            }

            if should_generate(rule, day, effective) {
                plan.dates.push(day);
            }
        }

        if let Termination::Count(limit) = rule.termination {
            if persisted.saturating_add(plan.dates.len() as u32) >= limit {
                plan.exhausted = true;
            }
        }

        plan
    }

    /// Clamp and expand in one step, ignoring existing instances.
    pub fn preview(&self, rule: &RecurrenceRule, from: NaiveDate, to: NaiveDate) -> (ExpansionWindow, ExpansionPlan) {
        let window = self.clamp(from, to);
        let plan = self.expand(rule, &window, &HashSet::new());
        (window, plan)
    }
}
