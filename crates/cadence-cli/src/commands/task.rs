use anyhow::{anyhow, Result};
use cadence_core::models::{NewTaskData, TaskStatus};
use cadence_core::repository::Repository;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::{TaskAddCommand, TaskCommand, TaskIdCommand, TaskSubcommand};
use crate::commands::Context;
use crate::parser::parse_datetime;
use crate::util::{resolve_task_id, short_id};

pub async fn task_command<R: Repository>(ctx: &Context<R>, command: TaskCommand) -> Result<()> {
    match command.command {
        TaskSubcommand::Add(cmd) => add_task(ctx, cmd).await,
        TaskSubcommand::Done(cmd) => set_status(ctx, cmd, TaskStatus::Done).await,
        TaskSubcommand::Start(cmd) => set_status(ctx, cmd, TaskStatus::InProgress).await,
        TaskSubcommand::Skip(cmd) => set_status(ctx, cmd, TaskStatus::Skipped).await,
        TaskSubcommand::Cancel(cmd) => set_status(ctx, cmd, TaskStatus::Canceled).await,
        TaskSubcommand::Archive(cmd) => archive_task(ctx, cmd).await,
    }
}

async fn add_task<R: Repository>(ctx: &Context<R>, command: TaskAddCommand) -> Result<()> {
    let now = Utc::now();
    let start_at = command
        .start
        .as_deref()
        .map(|s| parse_datetime(s, now, ctx.tz))
        .transpose()?;
    let deadline_at = command
        .deadline
        .as_deref()
        .map(|s| parse_datetime(s, now, ctx.tz))
        .transpose()?;

    if let (Some(start), Some(deadline)) = (start_at, deadline_at) {
        if deadline < start {
            return Err(anyhow!("Deadline must not be before the start"));
        }
    }

    let task = ctx
        .engine
        .store()
        .add_task(NewTaskData {
            owner_id: ctx.owner.clone(),
            title: command.title,
            description: command.description,
            start_at,
            deadline_at,
            priority: command.priority,
            status: None,
        })
        .await?;

    println!(
        "Added task '{}' ({})",
        task.title.cyan(),
        short_id(task.id).yellow()
    );
    Ok(())
}

async fn set_status<R: Repository>(ctx: &Context<R>, command: TaskIdCommand, status: TaskStatus) -> Result<()> {
    let id = resolve_task_id(ctx.engine.store(), &ctx.owner, &command.id).await?;
    let task = ctx
        .engine
        .store()
        .set_task_status(&ctx.owner, id, status)
        .await?;

    let label = match status {
        TaskStatus::Done => "done".green().to_string(),
        TaskStatus::InProgress => "in progress".cyan().to_string(),
        TaskStatus::Skipped => "skipped".dimmed().to_string(),
        TaskStatus::Canceled => "canceled".red().to_string(),
        TaskStatus::Planned => "planned".to_string(),
    };
    println!("Task '{}' marked {}", task.title, label);
    Ok(())
}

async fn archive_task<R: Repository>(ctx: &Context<R>, command: TaskIdCommand) -> Result<()> {
    let id = resolve_task_id(ctx.engine.store(), &ctx.owner, &command.id).await?;
    let task = ctx.engine.store().archive_task(&ctx.owner, id).await?;
    println!("Archived task '{}'", task.title);
    Ok(())
}
