use anyhow::{anyhow, Result};
use cadence_core::models::TaskQuery;
use cadence_core::repository::Repository;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::ListCommand;
use crate::commands::{day_bounds, window_end, Context};
use crate::parser::parse_day;
use crate::views::table::display_tasks;

/// Materializes recurring tasks for the window, then prints everything in it.
pub async fn list_tasks<R: Repository>(ctx: &Context<R>, command: ListCommand) -> Result<()> {
    let now = Utc::now();
    let from = match command.from.as_deref() {
        Some(from) => parse_day(from, now, ctx.tz)?,
        None => ctx.today(),
    };
    let to = match command.to.as_deref() {
        Some(to) => parse_day(to, now, ctx.tz)?,
        None => window_end(from, ctx.config.expansion.default_window_days)?,
    };
    if to < from {
        return Err(anyhow!("--to ({}) is before --from ({})", to, from));
    }

    let (start, end) = day_bounds(from, to)?;
    let query = TaskQuery {
        status: command.status,
        priority: command.priority,
        search: command.search,
        archived: command.archived,
        ..TaskQuery::window(start, end)
    };

    let listing = ctx.engine.list_tasks(&ctx.owner, query).await?;
    display_tasks(&listing.tasks, ctx.tz);

    if let Some(report) = listing.report {
        if report.instances_created > 0 {
            println!(
                "{}",
                format!(
                    "Created {} new instance(s) from {} rule(s)",
                    report.instances_created, report.rules_processed
                )
                .dimmed()
            );
        }
        if report.window.truncated {
            println!(
                "{} only days up to {} were expanded; list a later window for the rest",
                "Warning:".yellow().bold(),
                report.window.to
            );
        }
    }

    Ok(())
}
