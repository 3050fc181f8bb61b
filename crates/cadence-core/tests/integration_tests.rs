use cadence_core::clock::FixedClock;
use cadence_core::db::{establish_connection, DbPool};
use cadence_core::engine::ExpansionEngine;
use cadence_core::error::CoreError;
use cadence_core::models::*;
use cadence_core::recurrence::ExpansionConfig;
use cadence_core::repository::{RuleStore, SqliteRepository, TaskStore};
use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use rstest::rstest;
use tempfile::TempDir;

type Engine = ExpansionEngine<SqliteRepository, FixedClock>;

const OWNER: &str = "alice";

/// Helper function to create a test database and an engine over it
async fn setup_engine(horizon_days: u32) -> (Engine, DbPool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    let repository = SqliteRepository::new(pool.clone());
    let clock = FixedClock::new(at(2024, 1, 1, 0));
    let engine = ExpansionEngine::new(repository, clock, ExpansionConfig { horizon_days });

    (engine, pool, temp_dir)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap()
}

fn rule_data(pattern: Pattern, start: DateTime<Utc>, termination: Termination) -> NewRuleData {
    NewRuleData {
        owner_id: OWNER.to_string(),
        pattern,
        start_date: start,
        termination,
        template: TaskTemplate {
            title: "Water plants".to_string(),
            description: None,
            duration_minutes: Some(30),
            priority: TaskPriority::Medium,
        },
    }
}

/// Helper function to create a rule anchored at 09:00 UTC on `start`
async fn create_rule(engine: &Engine, pattern: Pattern, start: NaiveDate, termination: Termination) -> RecurrenceRule {
    let start = Utc.from_utc_datetime(&start.and_hms_opt(9, 0, 0).unwrap());
    engine
        .store()
        .create_rule(rule_data(pattern, start, termination))
        .await
        .expect("Failed to create test rule")
}

async fn occurrence_days(engine: &Engine, rule: &RecurrenceRule) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = engine
        .store()
        .materialized_days(rule.id, NaiveDate::MIN, NaiveDate::MAX)
        .await
        .expect("Failed to read materialized days")
        .into_iter()
        .collect();
    days.sort();
    days
}

async fn reload(engine: &Engine, rule: &RecurrenceRule) -> RecurrenceRule {
    engine
        .store()
        .find_rule(OWNER, rule.id)
        .await
        .expect("Failed to load rule")
        .expect("Rule disappeared")
}

#[rstest]
#[case::weekly(
    Pattern::weekly([Weekday::Mon, Weekday::Wed]),
    day(2024, 1, 1), day(2024, 1, 14),
    vec![day(2024, 1, 1), day(2024, 1, 3), day(2024, 1, 8), day(2024, 1, 10)]
)]
#[case::custom_days(
    Pattern::Custom { interval: 3, unit: IntervalUnit::Days },
    day(2024, 1, 1), day(2024, 1, 10),
    vec![day(2024, 1, 1), day(2024, 1, 4), day(2024, 1, 7), day(2024, 1, 10)]
)]
#[case::last_friday(
    Pattern::Monthly(MonthlyPattern::NthWeekday { week: WeekOfMonth::Last, weekday: Weekday::Fri }),
    day(2024, 1, 1), day(2024, 1, 31),
    vec![day(2024, 1, 26)]
)]
#[case::short_month(
    Pattern::Monthly(MonthlyPattern::DayOfMonth(31)),
    day(2024, 6, 1), day(2024, 6, 30),
    vec![]
)]
#[case::workdays(
    Pattern::Workdays,
    day(2024, 1, 5), day(2024, 1, 9),
    vec![day(2024, 1, 5), day(2024, 1, 8), day(2024, 1, 9)]
)]
#[tokio::test]
async fn test_pattern_scenarios(
    #[case] pattern: Pattern,
    #[case] from: NaiveDate,
    #[case] to: NaiveDate,
    #[case] expected: Vec<NaiveDate>,
) {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, pattern, day(2024, 1, 1), Termination::Never).await;

    let report = engine
        .expand_for_owner(OWNER, from, to)
        .await
        .expect("Expansion failed");

    assert_eq!(report.rules_processed, 1);
    assert_eq!(report.instances_created as usize, expected.len());
    assert_eq!(occurrence_days(&engine, &rule).await, expected);
    assert_eq!(
        reload(&engine, &rule).await.progress.occurrences_generated as usize,
        expected.len()
    );
}

#[tokio::test]
async fn test_expansion_is_idempotent() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let first = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .expect("First expansion failed");
    assert_eq!(first.instances_created, 7);

    let second = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .expect("Second expansion failed");
    assert_eq!(second.instances_created, 0);
    assert_eq!(second.rules[0].skipped_existing, 7);

    assert_eq!(occurrence_days(&engine, &rule).await.len(), 7);
    let reloaded = reload(&engine, &rule).await;
    assert_eq!(reloaded.progress.occurrences_generated, 7);
    assert_eq!(reloaded.progress.last_generated_at, Some(at(2024, 1, 1, 0)));
}

#[tokio::test]
async fn test_count_bound_across_overlapping_windows() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Count(3)).await;

    let first = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 2))
        .await
        .unwrap();
    assert_eq!(first.instances_created, 2);
    assert!(!first.rules[0].exhausted);

    let second = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 10))
        .await
        .unwrap();
    assert_eq!(second.instances_created, 1);
    assert!(second.rules[0].exhausted);

    // Exhausted: nothing more, whatever the window.
    for (from, to) in [(day(2024, 1, 1), day(2024, 1, 31)), (day(2024, 3, 1), day(2024, 3, 5))] {
        let report = engine.expand_for_owner(OWNER, from, to).await.unwrap();
        assert_eq!(report.instances_created, 0);
    }

    assert_eq!(
        occurrence_days(&engine, &rule).await,
        vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3)]
    );
    assert_eq!(reload(&engine, &rule).await.progress.occurrences_generated, 3);
}

#[tokio::test]
async fn test_date_bound_is_inclusive() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(
        &engine,
        Pattern::Daily,
        day(2024, 1, 1),
        Termination::Until(day(2024, 1, 5)),
    )
    .await;

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 31))
        .await
        .unwrap();

    assert_eq!(report.instances_created, 5);
    assert!(report.rules[0].exhausted);
    let days = occurrence_days(&engine, &rule).await;
    assert_eq!(days.last(), Some(&day(2024, 1, 5)));
}

#[tokio::test]
async fn test_horizon_truncation_is_reported() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 7, 18))
        .await
        .unwrap();

    assert!(report.window.truncated);
    assert_eq!(report.window.to, day(2024, 4, 29));
    assert_eq!(report.instances_created, 120);
    assert_eq!(occurrence_days(&engine, &rule).await.last(), Some(&day(2024, 4, 29)));
}

#[tokio::test]
async fn test_inverted_window_is_empty() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 10), day(2024, 1, 1))
        .await
        .unwrap();

    assert_eq!(report.rules_processed, 0);
    assert_eq!(report.instances_created, 0);
}

#[tokio::test]
async fn test_paused_rule_produces_nothing() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let paused = engine
        .store()
        .update_rule(
            OWNER,
            rule.id,
            UpdateRuleData {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!paused.is_active);
    assert_eq!(paused.progress.version, rule.progress.version + 1);

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .unwrap();
    assert_eq!(report.rules_processed, 0);
    assert!(occurrence_days(&engine, &rule).await.is_empty());

    // A paused rule is skipped by expand_rule as well, even from an active copy.
    let window = engine.expander().clamp(day(2024, 1, 1), day(2024, 1, 7));
    let expansion = engine.expand_rule(&rule, &window).await.unwrap();
    assert_eq!(expansion.created, 0);
    assert!(occurrence_days(&engine, &rule).await.is_empty());

    engine
        .store()
        .update_rule(
            OWNER,
            rule.id,
            UpdateRuleData {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .unwrap();
    assert_eq!(report.rules_processed, 1);
    assert_eq!(occurrence_days(&engine, &rule).await.len(), 7);
}

#[tokio::test]
async fn test_failed_batch_leaves_progress_untouched() {
    let (engine, pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Count(5)).await;

    sqlx::query(
        "CREATE TRIGGER reject_tasks BEFORE INSERT ON tasks BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await;
    assert!(matches!(result, Err(CoreError::Database(_))));

    let reloaded = reload(&engine, &rule).await;
    assert_eq!(reloaded.progress.occurrences_generated, 0);
    assert_eq!(reloaded.progress.last_generated_at, None);
    assert!(occurrence_days(&engine, &rule).await.is_empty());

    sqlx::query("DROP TRIGGER reject_tasks").execute(&pool).await.unwrap();

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .unwrap();
    assert_eq!(report.instances_created, 5);
    assert_eq!(
        occurrence_days(&engine, &rule).await,
        (1..=5).map(|d| day(2024, 1, d)).collect::<Vec<_>>()
    );
    assert_eq!(reload(&engine, &rule).await.progress.occurrences_generated, 5);
}

#[tokio::test]
async fn test_duplicate_day_is_reported_not_raised() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 1))
        .await
        .unwrap();

    let instances = cadence_core::engine::materialize(
        &rule,
        &[day(2024, 1, 1), day(2024, 1, 2)],
        at(2024, 1, 1, 0),
    );
    let outcomes = engine.store().insert_instances(&instances).await.unwrap();

    assert_eq!(outcomes, vec![InsertOutcome::AlreadyExists, InsertOutcome::Inserted]);
    assert_eq!(
        occurrence_days(&engine, &rule).await,
        vec![day(2024, 1, 1), day(2024, 1, 2)]
    );
}

#[tokio::test]
async fn test_list_tasks_expands_window_and_includes_one_off_tasks() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    create_rule(
        &engine,
        Pattern::weekly([Weekday::Mon, Weekday::Wed]),
        day(2024, 1, 1),
        Termination::Never,
    )
    .await;

    let one_off = engine
        .store()
        .add_task(NewTaskData {
            owner_id: OWNER.to_string(),
            title: "Dentist".to_string(),
            start_at: Some(at(2024, 1, 2, 14)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(one_off.status, TaskStatus::Planned);
    assert_eq!(one_off.priority, TaskPriority::Medium);

    let query = TaskQuery::window(at(2024, 1, 1, 0), Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 59).unwrap());
    let listing = engine.list_tasks(OWNER, query).await.unwrap();

    let report = listing.report.expect("Bounded query should expand");
    assert_eq!(report.instances_created, 2);

    let titles: Vec<&str> = listing.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Water plants", "Dentist", "Water plants"]);
    assert_eq!(listing.tasks[0].start_at, at(2024, 1, 1, 9));
    assert_eq!(listing.tasks[0].deadline_at, Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()));

    // Unbounded queries only read.
    let listing = engine.list_tasks(OWNER, TaskQuery::default()).await.unwrap();
    assert!(listing.report.is_none());
    assert_eq!(listing.tasks.len(), 3);
}

#[tokio::test]
async fn test_task_status_and_archive_filters() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let store = engine.store();

    let task = store
        .add_task(NewTaskData {
            owner_id: OWNER.to_string(),
            title: "Pay rent".to_string(),
            start_at: Some(at(2024, 1, 3, 8)),
            priority: Some(TaskPriority::High),
            ..Default::default()
        })
        .await
        .unwrap();

    let done = store.set_task_status(OWNER, task.id, TaskStatus::Done).await.unwrap();
    assert_eq!(done.status, TaskStatus::Done);

    let by_status = store
        .find_tasks(
            OWNER,
            &TaskQuery {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_status.len(), 1);

    let by_search = store
        .find_tasks(
            OWNER,
            &TaskQuery {
                search: Some("rent".to_string()),
                priority: Some(TaskPriority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);

    store.archive_task(OWNER, task.id).await.unwrap();
    assert!(store.find_tasks(OWNER, &TaskQuery::default()).await.unwrap().is_empty());
    let archived = store
        .find_tasks(
            OWNER,
            &TaskQuery {
                archived: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);

    let missing = store
        .set_task_status("bob", task.id, TaskStatus::Skipped)
        .await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_rule_validation_rejects_unfireable_rules() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let start = at(2024, 1, 1, 9);

    let invalid = [
        Pattern::weekly(Vec::new()),
        Pattern::Monthly(MonthlyPattern::DayOfMonth(0)),
        Pattern::Monthly(MonthlyPattern::NthWeekday {
            week: WeekOfMonth::Nth(6),
            weekday: Weekday::Mon,
        }),
        Pattern::Custom {
            interval: 0,
            unit: IntervalUnit::Days,
        },
    ];
    for pattern in invalid {
        let result = engine
            .store()
            .create_rule(rule_data(pattern, start, Termination::Never))
            .await;
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    let zero_count = engine
        .store()
        .create_rule(rule_data(Pattern::Daily, start, Termination::Count(0)))
        .await;
    assert!(matches!(zero_count, Err(CoreError::InvalidRule(_))));

    let mut untitled = rule_data(Pattern::Daily, start, Termination::Never);
    untitled.template.title = "  ".to_string();
    let result = engine.store().create_rule(untitled).await;
    assert!(matches!(result, Err(CoreError::InvalidInput(_))));

    assert!(engine.store().find_rules_for_owner(OWNER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_rule_rejects_invalid_pattern() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let result = engine
        .store()
        .update_rule(
            OWNER,
            rule.id,
            UpdateRuleData {
                pattern: Some(Pattern::weekly(Vec::new())),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::InvalidRule(_))));

    let updated = engine
        .store()
        .update_rule(
            OWNER,
            rule.id,
            UpdateRuleData {
                pattern: Some(Pattern::Weekends),
                title: Some("Long run".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.pattern, Pattern::Weekends);
    assert_eq!(reload(&engine, &rule).await.template.title, "Long run");

    let empty = engine
        .store()
        .update_rule(OWNER, rule.id, UpdateRuleData::default())
        .await;
    assert!(matches!(empty, Err(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn test_undecodable_legacy_rule_is_skipped() {
    let (engine, pool, _temp_dir) = setup_engine(120).await;
    let valid = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    // A weekly row with no weekdays, as older writers could leave behind.
    sqlx::query(
        r#"INSERT INTO recurrences (id, owner_id, type, start_date, title, created_at, updated_at)
        VALUES ($1, $2, 'weekly', $3, 'Legacy', $3, $3)"#,
    )
    .bind(uuid::Uuid::now_v7())
    .bind(OWNER)
    .bind(at(2024, 1, 1, 9))
    .execute(&pool)
    .await
    .unwrap();

    let rules = engine.store().find_rules_for_owner(OWNER).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, valid.id);

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 3))
        .await
        .unwrap();
    assert_eq!(report.rules_processed, 1);
    assert_eq!(report.instances_created, 3);
}

#[tokio::test]
async fn test_rules_are_scoped_to_owner() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    assert!(engine.store().find_rule("bob", rule.id).await.unwrap().is_none());
    let report = engine
        .expand_for_owner("bob", day(2024, 1, 1), day(2024, 1, 7))
        .await
        .unwrap();
    assert_eq!(report.rules_processed, 0);

    let delete = engine.store().delete_rule("bob", rule.id).await;
    assert!(matches!(delete, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_short_id_lookup_and_delete_keeps_instances() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let simple = rule.id.simple().to_string();
    let short = &simple[simple.len() - 8..];
    let found = engine
        .store()
        .find_rules_by_short_id(OWNER, short)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, rule.id);

    engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 2))
        .await
        .unwrap();
    engine.store().delete_rule(OWNER, rule.id).await.unwrap();

    assert!(engine.store().find_rule(OWNER, rule.id).await.unwrap().is_none());
    assert_eq!(occurrence_days(&engine, &rule).await.len(), 2);

    let progress = engine.store().record_progress(rule.id, 1, at(2024, 1, 2, 0)).await;
    assert!(matches!(progress, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_preview_does_not_persist() {
    let (engine, _pool, _temp_dir) = setup_engine(10).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    let (window, plan) = engine.preview(&rule, day(2024, 1, 1), day(2024, 1, 31));
    assert!(window.truncated);
    assert_eq!(plan.dates.len(), 10);
    assert!(occurrence_days(&engine, &rule).await.is_empty());
    assert_eq!(reload(&engine, &rule).await.progress.occurrences_generated, 0);

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(report.instances_created, 10);
    assert_eq!(occurrence_days(&engine, &rule).await, plan.dates);
}

#[tokio::test]
async fn test_materialized_days_with_unbounded_range() {
    let (engine, pool, _temp_dir) = setup_engine(120).await;
    let rule = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Never).await;

    engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 3))
        .await
        .unwrap();

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE recurrence_id = $1")
        .bind(rule.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 3);

    let narrow = engine
        .store()
        .materialized_days(rule.id, day(2024, 1, 1), day(2024, 1, 3))
        .await
        .unwrap();
    let wide = engine
        .store()
        .materialized_days(rule.id, NaiveDate::MIN, NaiveDate::MAX)
        .await
        .unwrap();
    assert_eq!(narrow.len(), 3);
    assert_eq!(wide, narrow);
}

#[tokio::test]
async fn test_stale_rule_copy_cannot_exceed_count() {
    let (engine, _pool, _temp_dir) = setup_engine(120).await;
    let stale = create_rule(&engine, Pattern::Daily, day(2024, 1, 1), Termination::Count(3)).await;

    let report = engine
        .expand_for_owner(OWNER, day(2024, 1, 1), day(2024, 1, 3))
        .await
        .unwrap();
    assert_eq!(report.instances_created, 3);

    // `stale` still says nothing has been generated.
    let window = engine.expander().clamp(day(2024, 1, 4), day(2024, 1, 10));
    let expansion = engine.expand_rule(&stale, &window).await.unwrap();
    assert_eq!(expansion.created, 0);

    assert_eq!(occurrence_days(&engine, &stale).await.len(), 3);
    assert_eq!(reload(&engine, &stale).await.progress.occurrences_generated, 3);
}

#[tokio::test]
async fn test_status_changes_are_persisted() {
    let (engine, pool, temp_dir) = setup_engine(120).await;
    let task = engine
        .store()
        .add_task(NewTaskData {
            owner_id: OWNER.to_string(),
            title: "Buy milk".to_string(),
            start_at: Some(at(2024, 1, 2, 10)),
            ..Default::default()
        })
        .await
        .unwrap();

    engine.store().set_task_status(OWNER, task.id, TaskStatus::Done).await.unwrap();
    engine.store().archive_task(OWNER, task.id).await.unwrap();

    // Read through a fresh connection so nothing pending on the writer's
    // connection can leak into the answer.
    let mut conn = pool.acquire().await.unwrap();
    let (status, archived): (String, bool) =
        sqlx::query_as("SELECT status, is_archived FROM tasks WHERE id = $1")
            .bind(task.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    assert_eq!(status, "done");
    assert!(archived);
    drop(conn);
    pool.close().await;

    let reopened = SqliteRepository::new(
        establish_connection(&temp_dir.path().join("test.db").to_string_lossy())
            .await
            .unwrap(),
    );
    let stored = reopened.find_task(OWNER, task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Done);
    assert!(stored.is_archived);
}
