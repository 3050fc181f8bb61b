use anyhow::{anyhow, Result};
use cadence_core::models::{parse_weekday, MonthlyPattern, Pattern, WeekOfMonth};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

use crate::cli::{PatternArgs, PatternKind};

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses an absolute or relative date-time, read in `tz`.
pub fn parse_datetime(input: &str, now: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return localize(naive, tz, input);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return localize(date.and_hms_opt(0, 0, 0).unwrap_or_default(), tz, input);
    }

    parse_date_string(input, now.with_timezone(&tz), Dialect::Us)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses a calendar day. Relative inputs resolve against today in `tz`.
pub fn parse_day(input: &str, now: DateTime<Utc>, tz: Tz) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input.trim(), now.with_timezone(&tz), Dialect::Us)
        .map(|dt| dt.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

fn localize(naive: NaiveDateTime, tz: Tz, input: &str) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{}' does not exist in timezone {}", input, tz.name()))
}

/// Comma separated weekday names, e.g. `mon,wed`.
pub fn parse_weekdays(input: &str) -> Result<Vec<Weekday>> {
    input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_weekday(part).map_err(Into::into))
        .collect()
}

/// `1`-`5` or `last`.
pub fn parse_week_of_month(input: &str) -> Result<WeekOfMonth> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("last") {
        return Ok(WeekOfMonth::Last);
    }
    let n: i64 = input
        .parse()
        .map_err(|_| anyhow!("Week of month must be 1-5 or 'last', got '{}'", input))?;
    Ok(WeekOfMonth::from_stored(n)?)
}

/// Builds a pattern from `--every` and its parameter flags.
pub fn build_pattern(kind: PatternKind, args: &PatternArgs) -> Result<Pattern> {
    let pattern = match kind {
        PatternKind::Daily => Pattern::Daily,
        PatternKind::Workdays => Pattern::Workdays,
        PatternKind::Weekends => Pattern::Weekends,
        PatternKind::Yearly => Pattern::Yearly,
        PatternKind::Weekly => {
            let on = args
                .on
                .as_deref()
                .ok_or_else(|| anyhow!("Weekly rules need --on (e.g. --on mon,wed)"))?;
            Pattern::weekly(parse_weekdays(on)?)
        }
        PatternKind::Monthly => match (args.day, args.week.as_deref(), args.weekday.as_deref()) {
            (Some(day), _, _) => Pattern::Monthly(MonthlyPattern::DayOfMonth(day)),
            (None, Some(week), Some(weekday)) => Pattern::Monthly(MonthlyPattern::NthWeekday {
                week: parse_week_of_month(week)?,
                weekday: parse_weekday(weekday)?,
            }),
            _ => {
                return Err(anyhow!(
                    "Monthly rules need --day, or --week together with --weekday"
                ))
            }
        },
        PatternKind::Custom => {
            let unit = args
                .unit
                .ok_or_else(|| anyhow!("Custom rules need --unit"))?;
            Pattern::Custom {
                interval: args.interval.unwrap_or(1),
                unit,
            }
        }
    };
    pattern.validate()?;
    Ok(pattern)
}
