//! # Cadence Core Library
//!
//! Recurrence rules and the engine that turns them into concrete task
//! instances, lazily, for whatever window of days a caller asks about.
//!
//! ## Features
//!
//! - **Typed patterns**: daily, workdays, weekends, weekly, monthly (fixed day
//!   or nth/last weekday), yearly and custom intervals, validated on write
//! - **Idempotent expansion**: at most one instance per rule and UTC day,
//!   enforced by a unique index
//! - **Bounded work**: each request expands at most a configurable horizon
//! - **Termination**: by inclusive end date or by total occurrence count
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Rules, tasks and transfer objects
//! - [`recurrence`]: Rule evaluator and window expander (pure)
//! - [`engine`]: Dedup, materialization and progress tracking
//! - [`repository`]: Storage ports and their SQLite implementation
//! - [`clock`]: Injectable time source
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     clock::SystemClock,
//!     db,
//!     engine::ExpansionEngine,
//!     models::{NewRuleData, Pattern, TaskTemplate, Termination},
//!     recurrence::ExpansionConfig,
//!     repository::{RuleStore, SqliteRepository},
//! };
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::establish_connection("tasks.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     repo.create_rule(NewRuleData {
//!         owner_id: "alice".to_string(),
//!         pattern: Pattern::Workdays,
//!         start_date: Utc::now(),
//!         termination: Termination::Count(10),
//!         template: TaskTemplate {
//!             title: "Daily standup".to_string(),
//!             duration_minutes: Some(15),
//!             ..Default::default()
//!         },
//!     })
//!     .await?;
//!
//!     let engine = ExpansionEngine::new(repo, SystemClock, ExpansionConfig::default());
//!     let today = Utc::now().date_naive();
//!     let report = engine
//!         .expand_for_owner("alice", today, today + Duration::days(13))
//!         .await?;
//!     println!("created {} instances", report.instances_created);
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
