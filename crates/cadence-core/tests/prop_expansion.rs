//! Property-based tests for window expansion using proptest.
//!
//! Persistence is simulated with a set of materialized days and a counter,
//! advanced the same way the engine advances them after a committed batch.

use cadence_core::models::*;
use cadence_core::recurrence::{ExpansionConfig, WindowExpander};
use chrono::{Duration, NaiveDate, TimeZone, Utc, Weekday};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_weekday() -> impl Strategy<Value = Weekday> {
    prop_oneof![
        Just(Weekday::Mon),
        Just(Weekday::Tue),
        Just(Weekday::Wed),
        Just(Weekday::Thu),
        Just(Weekday::Fri),
        Just(Weekday::Sat),
        Just(Weekday::Sun),
    ]
}

fn arb_pattern() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        Just(Pattern::Daily),
        Just(Pattern::Workdays),
        Just(Pattern::Weekends),
        Just(Pattern::Yearly),
        prop::collection::vec(arb_weekday(), 1..=7).prop_map(Pattern::weekly),
        (1u32..=31).prop_map(|d| Pattern::Monthly(MonthlyPattern::DayOfMonth(d))),
        (prop_oneof![(1u8..=5).prop_map(WeekOfMonth::Nth), Just(WeekOfMonth::Last)], arb_weekday())
            .prop_map(|(week, weekday)| Pattern::Monthly(MonthlyPattern::NthWeekday { week, weekday })),
        (1u32..=10, prop_oneof![
            Just(IntervalUnit::Hours),
            Just(IntervalUnit::Days),
            Just(IntervalUnit::Weeks),
            Just(IntervalUnit::Months),
        ])
            .prop_map(|(interval, unit)| Pattern::Custom { interval, unit }),
    ]
}

/// Anchor dates in 2024-2025, day capped at 28.
fn arb_anchor() -> impl Strategy<Value = NaiveDate> {
    (2024i32..=2025, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN))
}

/// A window as (offset from anchor, length in days).
fn arb_window() -> impl Strategy<Value = (i64, i64)> {
    (-30i64..=200, 0i64..=90)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rule(pattern: Pattern, anchor: NaiveDate, termination: Termination) -> RecurrenceRule {
    let start = Utc.from_utc_datetime(&anchor.and_hms_opt(8, 0, 0).unwrap_or_default());
    RecurrenceRule {
        id: Uuid::now_v7(),
        owner_id: "prop".to_string(),
        is_active: true,
        pattern,
        start_date: start,
        termination,
        template: TaskTemplate {
            title: "prop".to_string(),
            ..Default::default()
        },
        progress: RuleProgress::default(),
        created_at: start,
        updated_at: start,
    }
}

/// Expands and records the accepted days, returning how many were added.
fn expand_and_commit(
    expander: &WindowExpander,
    rule: &mut RecurrenceRule,
    stored: &mut HashSet<NaiveDate>,
    from: NaiveDate,
    to: NaiveDate,
) -> usize {
    let window = expander.clamp(from, to);
    let existing: HashSet<NaiveDate> = stored.iter().copied().filter(|d| window.contains(*d)).collect();
    let plan = expander.expand(rule, &window, &existing);
    for date in &plan.dates {
        assert!(stored.insert(*date), "expander proposed an existing day {}", date);
    }
    rule.progress.occurrences_generated += plan.dates.len() as u32;
    plan.dates.len()
}

fn window_bounds(anchor: NaiveDate, (offset, len): (i64, i64)) -> (NaiveDate, NaiveDate) {
    let from = anchor + Duration::days(offset);
    (from, from + Duration::days(len))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn second_expansion_of_same_window_adds_nothing(
        pattern in arb_pattern(),
        anchor in arb_anchor(),
        window in arb_window(),
    ) {
        let expander = WindowExpander::new(ExpansionConfig::default());
        let mut rule = rule(pattern, anchor, Termination::Never);
        let mut stored = HashSet::new();
        let (from, to) = window_bounds(anchor, window);

        expand_and_commit(&expander, &mut rule, &mut stored, from, to);
        let before = stored.clone();
        let added = expand_and_commit(&expander, &mut rule, &mut stored, from, to);

        prop_assert_eq!(added, 0);
        prop_assert_eq!(stored, before);
    }

    #[test]
    fn count_is_never_exceeded_across_windows(
        pattern in arb_pattern(),
        anchor in arb_anchor(),
        limit in 1u32..=20,
        windows in prop::collection::vec(arb_window(), 1..6),
    ) {
        let expander = WindowExpander::new(ExpansionConfig::default());
        let mut rule = rule(pattern, anchor, Termination::Count(limit));
        let mut stored = HashSet::new();

        for window in windows {
            let (from, to) = window_bounds(anchor, window);
            expand_and_commit(&expander, &mut rule, &mut stored, from, to);
            prop_assert!(stored.len() as u32 <= limit);
        }

        prop_assert_eq!(rule.progress.occurrences_generated as usize, stored.len());
    }

    #[test]
    fn nothing_lands_before_anchor_or_after_end_date(
        pattern in arb_pattern(),
        anchor in arb_anchor(),
        until_offset in 0i64..=120,
        window in arb_window(),
    ) {
        let until = anchor + Duration::days(until_offset);
        let expander = WindowExpander::new(ExpansionConfig::default());
        let mut rule = rule(pattern, anchor, Termination::Until(until));
        let mut stored = HashSet::new();
        let (from, to) = window_bounds(anchor, window);

        expand_and_commit(&expander, &mut rule, &mut stored, from, to);

        for date in &stored {
            prop_assert!(*date >= anchor);
            prop_assert!(*date <= until);
            prop_assert!(*date >= from && *date <= to);
        }
    }

    #[test]
    fn accepted_days_stay_within_horizon(
        anchor in arb_anchor(),
        horizon in 1u32..=60,
        len in 0i64..=200,
    ) {
        let expander = WindowExpander::new(ExpansionConfig { horizon_days: horizon });
        let rule = rule(Pattern::Daily, anchor, Termination::Never);

        let (window, plan) = expander.preview(&rule, anchor, anchor + Duration::days(len));

        prop_assert!(plan.dates.len() as u32 <= horizon);
        prop_assert_eq!(window.truncated, len >= i64::from(horizon));
        prop_assert!(plan.dates.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
