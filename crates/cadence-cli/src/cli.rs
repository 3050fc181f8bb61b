use clap::{Args, Parser, Subcommand, ValueEnum};
use cadence_core::models::{IntervalUnit, TaskPriority, TaskStatus};

/// Recurring tasks, expanded into concrete instances on demand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Act on behalf of this owner instead of the configured one
    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage recurrence rules
    Rule(RuleCommand),
    /// Manage individual tasks
    Task(TaskCommand),
    /// List tasks in a window, materializing recurring ones first
    List(ListCommand),
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct RuleCommand {
    #[command(subcommand)]
    pub command: RuleSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleSubcommand {
    /// Create a recurrence rule
    Add(RuleAddCommand),
    /// List recurrence rules
    List,
    /// Show a rule and its progress
    Show(RuleIdCommand),
    /// Change a rule (existing instances are left as they are)
    Edit(RuleEditCommand),
    /// Stop generating instances
    Pause(RuleIdCommand),
    /// Resume a paused rule
    Resume(RuleIdCommand),
    /// Delete a rule, keeping the instances it already produced
    Delete(RuleDeleteCommand),
    /// Show the days a rule would produce, without writing anything
    Preview(RulePreviewCommand),
}

/// Pattern kinds accepted by `--every`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Every day
    Daily,
    /// Monday to Friday
    Workdays,
    /// Saturday and Sunday
    Weekends,
    /// Chosen weekdays (see --on)
    Weekly,
    /// A day of the month (--day) or an nth weekday (--week and --weekday)
    Monthly,
    /// Same month and day as the start date
    Yearly,
    /// Every --interval --unit from the start date
    Custom,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// Days of week for weekly rules
    #[arg(long, help = "Days of week for weekly rules (mon,tue,wed,thu,fri,sat,sun)")]
    pub on: Option<String>,
    /// Day of month for monthly rules
    #[arg(long, conflicts_with_all = ["week", "weekday"])]
    pub day: Option<u32>,
    /// Week of month for monthly rules
    #[arg(long, help = "Week of month for monthly rules (1-5 or 'last')", requires = "weekday")]
    pub week: Option<String>,
    /// Weekday for monthly rules
    #[arg(long, requires = "week")]
    pub weekday: Option<String>,
    /// Interval for custom rules
    #[arg(long)]
    pub interval: Option<u32>,
    /// Unit for custom rules
    #[arg(long, help = "Unit for custom rules (hours, days, weeks, months, years)")]
    pub unit: Option<IntervalUnit>,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleAddCommand {
    /// Title of the generated tasks
    pub title: String,
    /// How often the rule fires
    #[arg(long, value_enum)]
    pub every: PatternKind,
    #[command(flatten)]
    pub pattern: PatternArgs,
    /// First eligible day and time of day of each instance
    #[arg(long, help = "Start date and time (e.g., '2024-01-01 09:00', 'tomorrow 9am')")]
    pub start: Option<String>,
    /// Last eligible day (inclusive)
    #[arg(long, conflicts_with = "count")]
    pub until: Option<String>,
    /// Maximum number of instances
    #[arg(long)]
    pub count: Option<u32>,
    /// Length of each instance in minutes
    #[arg(long)]
    pub duration: Option<u32>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long)]
    pub priority: Option<TaskPriority>,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleEditCommand {
    /// The ID of the rule to edit
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, value_enum)]
    pub every: Option<PatternKind>,
    #[command(flatten)]
    pub pattern: PatternArgs,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long, conflicts_with_all = ["count", "forever"])]
    pub until: Option<String>,
    #[arg(long, conflicts_with = "forever")]
    pub count: Option<u32>,
    /// Remove any end date or count
    #[arg(long)]
    pub forever: bool,

    #[arg(long)]
    pub duration: Option<u32>,
    #[arg(long, conflicts_with = "duration")]
    pub duration_clear: bool,

    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(long)]
    pub priority: Option<TaskPriority>,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleIdCommand {
    /// Rule ID or unique prefix
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleDeleteCommand {
    /// Rule ID or unique prefix
    pub id: String,
    /// Delete without confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RulePreviewCommand {
    /// Rule ID or unique prefix
    pub id: String,
    /// First day to preview (defaults to today)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to preview (defaults to the configured window)
    #[arg(long)]
    pub to: Option<String>,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub command: TaskSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskSubcommand {
    /// Add a one-off task
    Add(TaskAddCommand),
    /// Mark a task as done
    Done(TaskIdCommand),
    /// Mark a task as in progress
    Start(TaskIdCommand),
    /// Skip a task
    Skip(TaskIdCommand),
    /// Cancel a task
    Cancel(TaskIdCommand),
    /// Hide a task from listings
    Archive(TaskIdCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct TaskAddCommand {
    /// The title of the task
    pub title: String,
    #[arg(short, long)]
    pub description: Option<String>,
    /// When the task starts (defaults to now)
    #[arg(long)]
    pub start: Option<String>,
    /// When the task is due
    #[arg(long)]
    pub deadline: Option<String>,
    #[arg(long)]
    pub priority: Option<TaskPriority>,
}

#[derive(Parser, Debug, Clone)]
pub struct TaskIdCommand {
    /// Task ID or unique prefix
    pub id: String,
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Window start (defaults to today)
    #[arg(long)]
    pub from: Option<String>,
    /// Window end (defaults to the configured window length)
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub priority: Option<TaskPriority>,
    /// Only tasks whose title contains this text
    #[arg(long)]
    pub search: Option<String>,
    /// List archived tasks instead
    #[arg(long)]
    pub archived: bool,
}
