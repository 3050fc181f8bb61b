use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Done,
    Skipped,
    Canceled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Planned => write!(f, "planned"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" => Ok(TaskStatus::Planned),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "skipped" => Ok(TaskStatus::Skipped),
            "canceled" | "cancelled" => Ok(TaskStatus::Canceled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// A concrete task. One-off tasks and materialized occurrences share this shape.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub is_archived: bool,
    /// Weak back-reference to the generating rule. Not a foreign key: deleting
    /// the rule leaves its instances in place.
    pub recurrence_id: Option<Uuid>,
    /// UTC calendar day this instance materializes; `None` for one-off tasks.
    pub occurrence_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
}

/// Filters for a task listing. The window bounds apply to `start_at`.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Substring match on the title.
    pub search: Option<String>,
    pub archived: bool,
}

impl TaskQuery {
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }
}

/// Outcome of inserting one materialized instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The (rule, day) uniqueness constraint already holds a row.
    AlreadyExists,
}

// ============================================================================
// Recurrence rules
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Months => "months",
            IntervalUnit::Years => "years",
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hours" | "hour" => Ok(IntervalUnit::Hours),
            "days" | "day" => Ok(IntervalUnit::Days),
            "weeks" | "week" => Ok(IntervalUnit::Weeks),
            "months" | "month" => Ok(IntervalUnit::Months),
            "years" | "year" => Ok(IntervalUnit::Years),
            _ => Err(CoreError::InvalidRule(format!("unknown interval unit '{}'", s))),
        }
    }
}

/// Which occurrence of a weekday within its month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekOfMonth {
    /// 1st through 5th.
    Nth(u8),
    Last,
}

impl WeekOfMonth {
    /// Decodes the stored form, where `-1` means "last".
    pub fn from_stored(value: i64) -> Result<Self, CoreError> {
        match value {
            -1 => Ok(WeekOfMonth::Last),
            1..=5 => Ok(WeekOfMonth::Nth(value as u8)),
            _ => Err(CoreError::InvalidRule(format!(
                "month week must be 1-5 or -1, got {}",
                value
            ))),
        }
    }

    pub fn to_stored(self) -> i64 {
        match self {
            WeekOfMonth::Nth(n) => n as i64,
            WeekOfMonth::Last => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPattern {
    /// Fixed day of month; months shorter than the day never fire.
    DayOfMonth(u32),
    NthWeekday { week: WeekOfMonth, weekday: Weekday },
}

/// The repeating pattern of a rule. Each variant carries only the parameters
/// it uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    Daily,
    Workdays,
    Weekends,
    Weekly { weekdays: Vec<Weekday> },
    Monthly(MonthlyPattern),
    /// Month and day are taken from the rule's anchor.
    Yearly,
    Custom { interval: u32, unit: IntervalUnit },
}

impl Pattern {
    /// Builds a weekly pattern with the weekdays sorted Sunday-first and deduplicated.
    pub fn weekly<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        let mut weekdays: Vec<Weekday> = days.into_iter().collect();
        weekdays.sort_by_key(|d| d.num_days_from_sunday());
        weekdays.dedup();
        Pattern::Weekly { weekdays }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::Daily => "daily",
            Pattern::Workdays => "workdays",
            Pattern::Weekends => "weekends",
            Pattern::Weekly { .. } => "weekly",
            Pattern::Monthly(_) => "monthly",
            Pattern::Yearly => "yearly",
            Pattern::Custom { .. } => "custom",
        }
    }

    /// Rejects parameter values that would make the pattern unfireable.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Pattern::Weekly { weekdays } if weekdays.is_empty() => Err(CoreError::InvalidRule(
                "weekly pattern needs at least one weekday".to_string(),
            )),
            Pattern::Monthly(MonthlyPattern::DayOfMonth(day)) if !(1..=31).contains(day) => Err(
                CoreError::InvalidRule(format!("month day must be 1-31, got {}", day)),
            ),
            Pattern::Monthly(MonthlyPattern::NthWeekday {
                week: WeekOfMonth::Nth(n),
                ..
            }) if !(1..=5).contains(n) => Err(CoreError::InvalidRule(format!(
                "month week must be 1-5 or last, got {}",
                n
            ))),
            Pattern::Custom { interval: 0, .. } => Err(CoreError::InvalidRule(
                "custom interval must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Flattens the pattern into the stored column layout.
    pub fn to_columns(&self) -> Result<PatternColumns, CoreError> {
        let mut columns = PatternColumns {
            kind: self.kind(),
            interval: 1,
            interval_unit: None,
            weekdays: None,
            month_day: None,
            month_week: None,
            month_weekday: None,
        };

        match self {
            Pattern::Weekly { weekdays } => {
                let names: Vec<&str> = weekdays.iter().map(|d| weekday_name(*d)).collect();
                columns.weekdays = Some(serde_json::to_string(&names)?);
            }
            Pattern::Monthly(MonthlyPattern::DayOfMonth(day)) => {
                columns.month_day = Some(*day as i64);
            }
            Pattern::Monthly(MonthlyPattern::NthWeekday { week, weekday }) => {
                columns.month_week = Some(week.to_stored());
                columns.month_weekday = Some(weekday_name(*weekday));
            }
            Pattern::Custom { interval, unit } => {
                columns.interval = *interval as i64;
                columns.interval_unit = Some(unit.as_str());
            }
            Pattern::Daily | Pattern::Workdays | Pattern::Weekends | Pattern::Yearly => {}
        }

        Ok(columns)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Daily => write!(f, "every day"),
            Pattern::Workdays => write!(f, "every workday"),
            Pattern::Weekends => write!(f, "every weekend day"),
            Pattern::Weekly { weekdays } => {
                let names: Vec<&str> = weekdays.iter().map(|d| weekday_name(*d)).collect();
                write!(f, "weekly on {}", names.join(", "))
            }
            Pattern::Monthly(MonthlyPattern::DayOfMonth(day)) => {
                write!(f, "monthly on day {}", day)
            }
            Pattern::Monthly(MonthlyPattern::NthWeekday { week, weekday }) => match week {
                WeekOfMonth::Nth(n) => {
                    write!(f, "monthly on the {} {}", ordinal(*n), weekday_name(*weekday))
                }
                WeekOfMonth::Last => write!(f, "monthly on the last {}", weekday_name(*weekday)),
            },
            Pattern::Yearly => write!(f, "yearly"),
            Pattern::Custom { interval, unit } => {
                write!(f, "every {} {}", interval, unit.as_str())
            }
        }
    }
}

fn ordinal(n: u8) -> String {
    let suffix = match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Column layout of a pattern in the `recurrences` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternColumns {
    pub kind: &'static str,
    pub interval: i64,
    pub interval_unit: Option<&'static str>,
    pub weekdays: Option<String>,
    pub month_day: Option<i64>,
    pub month_week: Option<i64>,
    pub month_weekday: Option<&'static str>,
}

/// When a rule stops producing occurrences.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    #[default]
    Never,
    /// Inclusive last eligible day.
    Until(NaiveDate),
    /// Maximum total number of occurrences.
    Count(u32),
}

impl Termination {
    pub fn end_type(&self) -> &'static str {
        match self {
            Termination::Never => "never",
            Termination::Until(_) => "date",
            Termination::Count(_) => "count",
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            Termination::Until(date) => Some(*date),
            _ => None,
        }
    }

    pub fn end_count(&self) -> Option<u32> {
        match self {
            Termination::Count(count) => Some(*count),
            _ => None,
        }
    }
}

/// Fields copied onto every generated instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskTemplate {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub priority: TaskPriority,
}

/// Mutable progress state of a rule. `version` is the concurrency token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleProgress {
    pub occurrences_generated: u32,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub version: i64,
}

/// A recurrence rule owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub owner_id: String,
    pub is_active: bool,
    pub pattern: Pattern,
    /// The anchor: first eligible day, and the time-of-day, day-of-month and
    /// day-of-year used for matching.
    pub start_date: DateTime<Utc>,
    pub termination: Termination,
    pub template: TaskTemplate,
    pub progress: RuleProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    pub fn anchor_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    /// True once a `Count` or `Until` bound can no longer admit occurrences
    /// from `today` on.
    pub fn is_exhausted(&self, today: NaiveDate) -> bool {
        match self.termination {
            Termination::Never => false,
            Termination::Until(end) => today > end,
            Termination::Count(limit) => self.progress.occurrences_generated >= limit,
        }
    }
}

/// Flat row of the `recurrences` table.
#[derive(Debug, Clone, FromRow)]
pub struct RecurrenceRow {
    pub id: Uuid,
    pub owner_id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub interval: i64,
    pub interval_unit: Option<String>,
    pub weekdays: Option<String>,
    pub month_day: Option<i64>,
    pub month_week: Option<i64>,
    pub month_weekday: Option<String>,
    pub end_type: String,
    pub end_date: Option<NaiveDate>,
    pub end_count: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub priority: TaskPriority,
    pub occurrences_generated: i64,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRow {
    fn pattern(&self) -> Result<Pattern, CoreError> {
        let pattern = match self.kind.as_str() {
            "daily" => Pattern::Daily,
            "workdays" => Pattern::Workdays,
            "weekends" => Pattern::Weekends,
            "yearly" => Pattern::Yearly,
            "weekly" => {
                let raw = self.weekdays.as_deref().ok_or_else(|| {
                    CoreError::InvalidRule("weekly rule without weekdays".to_string())
                })?;
                let names: Vec<String> = serde_json::from_str(raw)?;
                let days = names
                    .iter()
                    .map(|name| parse_weekday(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Pattern::weekly(days)
            }
            "monthly" => match (self.month_day, self.month_week, self.month_weekday.as_deref()) {
                (Some(day), _, _) if day != 0 => {
                    Pattern::Monthly(MonthlyPattern::DayOfMonth(to_u32(day, "month_day")?))
                }
                (_, Some(week), Some(weekday)) => Pattern::Monthly(MonthlyPattern::NthWeekday {
                    week: WeekOfMonth::from_stored(week)?,
                    weekday: parse_weekday(weekday)?,
                }),
                _ => {
                    return Err(CoreError::InvalidRule(
                        "monthly rule needs a month day or a week/weekday pair".to_string(),
                    ))
                }
            },
            "custom" => {
                let unit = self.interval_unit.as_deref().ok_or_else(|| {
                    CoreError::InvalidRule("custom rule without interval unit".to_string())
                })?;
                Pattern::Custom {
                    interval: to_u32(self.interval, "interval")?,
                    unit: unit.parse()?,
                }
            }
            other => {
                return Err(CoreError::InvalidRule(format!(
                    "unknown recurrence type '{}'",
                    other
                )))
            }
        };
        pattern.validate()?;
        Ok(pattern)
    }

    fn termination(&self) -> Result<Termination, CoreError> {
        match self.end_type.as_str() {
            "never" => Ok(Termination::Never),
            "date" => self.end_date.map(Termination::Until).ok_or_else(|| {
                CoreError::InvalidRule("end type 'date' without end date".to_string())
            }),
            "count" => match self.end_count {
                Some(count) => Ok(Termination::Count(to_u32(count, "end_count")?)),
                None => Err(CoreError::InvalidRule(
                    "end type 'count' without end count".to_string(),
                )),
            },
            other => Err(CoreError::InvalidRule(format!("unknown end type '{}'", other))),
        }
    }
}

impl TryFrom<RecurrenceRow> for RecurrenceRule {
    type Error = CoreError;

    fn try_from(row: RecurrenceRow) -> Result<Self, Self::Error> {
        let pattern = row.pattern()?;
        let termination = row.termination()?;
        let duration_minutes = row
            .duration_minutes
            .map(|m| to_u32(m, "duration_minutes"))
            .transpose()?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            is_active: row.is_active,
            pattern,
            start_date: row.start_date,
            termination,
            template: TaskTemplate {
                title: row.title,
                description: row.description,
                duration_minutes,
                priority: row.priority,
            },
            progress: RuleProgress {
                occurrences_generated: to_u32(row.occurrences_generated, "occurrences_generated")?,
                last_generated_at: row.last_generated_at,
                version: row.version,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32, CoreError> {
    u32::try_from(value)
        .map_err(|_| CoreError::InvalidRule(format!("{} out of range: {}", column, value)))
}

/// Data required to create a new rule.
#[derive(Debug, Clone)]
pub struct NewRuleData {
    pub owner_id: String,
    pub pattern: Pattern,
    pub start_date: DateTime<Utc>,
    pub termination: Termination,
    pub template: TaskTemplate,
}

impl NewRuleData {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.pattern.validate()?;
        validate_rule_fields(&self.template, self.termination)
    }
}

pub(crate) fn validate_rule_fields(
    template: &TaskTemplate,
    termination: Termination,
) -> Result<(), CoreError> {
    if template.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("title must not be empty".to_string()));
    }
    if let Termination::Count(0) = termination {
        return Err(CoreError::InvalidRule("end count must be at least 1".to_string()));
    }
    Ok(())
}

/// Partial update of a rule. Already-materialized instances are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
    pub pattern: Option<Pattern>,
    pub start_date: Option<DateTime<Utc>>,
    pub termination: Option<Termination>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub duration_minutes: Option<Option<u32>>,
    pub priority: Option<TaskPriority>,
    pub is_active: Option<bool>,
}

impl UpdateRuleData {
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.start_date.is_none()
            && self.termination.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.duration_minutes.is_none()
            && self.priority.is_none()
            && self.is_active.is_none()
    }
}

// ============================================================================
// Weekday names
// ============================================================================

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

/// Parses full lowercase names as stored, plus the usual three-letter forms.
pub fn parse_weekday(name: &str) -> Result<Weekday, CoreError> {
    match name.trim().to_lowercase().as_str() {
        "sunday" | "sun" => Ok(Weekday::Sun),
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        _ => Err(CoreError::InvalidRule(format!("unknown weekday '{}'", name))),
    }
}
