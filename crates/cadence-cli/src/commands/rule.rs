use anyhow::{anyhow, Result};
use cadence_core::models::{NewRuleData, TaskTemplate, Termination, UpdateRuleData};
use cadence_core::repository::Repository;
use chrono::Utc;
use chrono_tz::Tz;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::cli::{
    PatternArgs, RuleAddCommand, RuleCommand, RuleDeleteCommand, RuleEditCommand, RuleIdCommand,
    RulePreviewCommand, RuleSubcommand,
};
use crate::commands::{window_end, Context};
use crate::parser::{build_pattern, parse_datetime, parse_day};
use crate::util::{resolve_rule, short_id};
use crate::views::table::{describe_termination, display_rules, format_in_timezone};

pub async fn rule_command<R: Repository>(ctx: &Context<R>, command: RuleCommand) -> Result<()> {
    match command.command {
        RuleSubcommand::Add(cmd) => add_command(ctx, cmd).await,
        RuleSubcommand::List => list_command(ctx).await,
        RuleSubcommand::Show(cmd) => show_command(ctx, cmd).await,
        RuleSubcommand::Edit(cmd) => edit_command(ctx, cmd).await,
        RuleSubcommand::Pause(cmd) => set_active(ctx, cmd, false).await,
        RuleSubcommand::Resume(cmd) => set_active(ctx, cmd, true).await,
        RuleSubcommand::Delete(cmd) => delete_command(ctx, cmd).await,
        RuleSubcommand::Preview(cmd) => preview_command(ctx, cmd).await,
    }
}

fn termination_from(until: Option<&str>, count: Option<u32>, tz: Tz) -> Result<Option<Termination>> {
    match (until, count) {
        (Some(until), _) => Ok(Some(Termination::Until(parse_day(until, Utc::now(), tz)?))),
        (None, Some(count)) => Ok(Some(Termination::Count(count))),
        (None, None) => Ok(None),
    }
}

fn has_pattern_args(args: &PatternArgs) -> bool {
    args.on.is_some()
        || args.day.is_some()
        || args.week.is_some()
        || args.weekday.is_some()
        || args.interval.is_some()
        || args.unit.is_some()
}

async fn add_command<R: Repository>(ctx: &Context<R>, command: RuleAddCommand) -> Result<()> {
    let pattern = build_pattern(command.every, &command.pattern)?;
    let now = Utc::now();
    let start_date = match command.start.as_deref() {
        Some(start) => parse_datetime(start, now, ctx.tz)?,
        None => now,
    };
    let termination =
        termination_from(command.until.as_deref(), command.count, ctx.tz)?.unwrap_or_default();

    let rule = ctx
        .engine
        .store()
        .create_rule(NewRuleData {
            owner_id: ctx.owner.clone(),
            pattern,
            start_date,
            termination,
            template: TaskTemplate {
                title: command.title,
                description: command.description,
                duration_minutes: command.duration,
                priority: command.priority.unwrap_or_default(),
            },
        })
        .await?;

    println!(
        "Created rule '{}' ({}): {}",
        rule.template.title.cyan(),
        short_id(rule.id).yellow(),
        rule.pattern
    );
    Ok(())
}

async fn list_command<R: Repository>(ctx: &Context<R>) -> Result<()> {
    let rules = ctx.engine.store().find_rules_for_owner(&ctx.owner).await?;
    display_rules(&rules, ctx.tz);
    Ok(())
}

async fn show_command<R: Repository>(ctx: &Context<R>, command: RuleIdCommand) -> Result<()> {
    let rule = resolve_rule(ctx.engine.store(), &ctx.owner, &command.id).await?;

    println!("{}", "Rule Information".blue().bold());
    println!("Rule ID: {}", rule.id.yellow());
    println!("Title: {}", rule.template.title.cyan());
    if let Some(description) = &rule.template.description {
        println!("Description: {}", description);
    }
    println!("Pattern: {}", rule.pattern.green());
    println!("Starts: {}", format_in_timezone(rule.start_date, ctx.tz));
    println!("Ends: {}", describe_termination(&rule.termination));
    if let Some(minutes) = rule.template.duration_minutes {
        println!("Duration: {} minutes", minutes);
    }
    println!("Priority: {}", rule.template.priority);
    println!(
        "Active: {}",
        if rule.is_active {
            "Yes".green().to_string()
        } else {
            "No".red().to_string()
        }
    );
    println!("Generated: {}", rule.progress.occurrences_generated);
    if let Some(last) = rule.progress.last_generated_at {
        println!("Last generated: {}", format_in_timezone(last, ctx.tz));
    }

    let today = ctx.today();
    let to = window_end(today, ctx.config.expansion.default_window_days)?;
    let (_, plan) = ctx.engine.preview(&rule, today, to);

    println!();
    println!("{}", "Upcoming".blue().bold());
    if plan.dates.is_empty() {
        println!("No occurrences between {} and {}", today, to);
    } else {
        for date in &plan.dates {
            println!("  {}", date);
        }
    }

    Ok(())
}

async fn edit_command<R: Repository>(ctx: &Context<R>, command: RuleEditCommand) -> Result<()> {
    let rule = resolve_rule(ctx.engine.store(), &ctx.owner, &command.id).await?;

    let pattern = match command.every {
        Some(kind) => Some(build_pattern(kind, &command.pattern)?),
        None if has_pattern_args(&command.pattern) => {
            return Err(anyhow!("Pattern parameters need --every to say which pattern they describe"));
        }
        None => None,
    };

    let termination = if command.forever {
        Some(Termination::Never)
    } else {
        termination_from(command.until.as_deref(), command.count, ctx.tz)?
    };

    let start_date = command
        .start
        .as_deref()
        .map(|start| parse_datetime(start, Utc::now(), ctx.tz))
        .transpose()?;

    let description = if command.description_clear {
        Some(None)
    } else {
        command.description.map(Some)
    };
    let duration_minutes = if command.duration_clear {
        Some(None)
    } else {
        command.duration.map(Some)
    };

    let update = UpdateRuleData {
        pattern,
        start_date,
        termination,
        title: command.title,
        description,
        duration_minutes,
        priority: command.priority,
        is_active: None,
    };

    let updated = ctx
        .engine
        .store()
        .update_rule(&ctx.owner, rule.id, update)
        .await?;
    println!(
        "Updated rule '{}': {}",
        updated.template.title.cyan(),
        updated.pattern
    );
    println!("{}", "Instances already created are unchanged.".dimmed());
    Ok(())
}

async fn set_active<R: Repository>(ctx: &Context<R>, command: RuleIdCommand, active: bool) -> Result<()> {
    let rule = resolve_rule(ctx.engine.store(), &ctx.owner, &command.id).await?;

    if rule.is_active == active {
        println!(
            "Rule '{}' is already {}",
            rule.template.title,
            if active { "active" } else { "paused" }
        );
        return Ok(());
    }

    let updated = ctx
        .engine
        .store()
        .update_rule(
            &ctx.owner,
            rule.id,
            UpdateRuleData {
                is_active: Some(active),
                ..Default::default()
            },
        )
        .await?;

    if active {
        println!("Resumed rule '{}'", updated.template.title.green());
    } else {
        println!("Paused rule '{}'", updated.template.title.yellow());
    }
    Ok(())
}

async fn delete_command<R: Repository>(ctx: &Context<R>, command: RuleDeleteCommand) -> Result<()> {
    let rule = resolve_rule(ctx.engine.store(), &ctx.owner, &command.id).await?;

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Are you sure you want to delete rule '{}'? Its existing tasks are kept.",
                rule.template.title
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    ctx.engine.store().delete_rule(&ctx.owner, rule.id).await?;
    println!("Deleted rule '{}'", rule.template.title);
    Ok(())
}

async fn preview_command<R: Repository>(ctx: &Context<R>, command: RulePreviewCommand) -> Result<()> {
    let rule = resolve_rule(ctx.engine.store(), &ctx.owner, &command.id).await?;
    let now = Utc::now();

    let from = match command.from.as_deref() {
        Some(from) => parse_day(from, now, ctx.tz)?,
        None => ctx.today(),
    };
    let to = match command.to.as_deref() {
        Some(to) => parse_day(to, now, ctx.tz)?,
        None => window_end(from, ctx.config.expansion.default_window_days)?,
    };

    let (window, plan) = ctx.engine.preview(&rule, from, to);

    println!(
        "{} '{}' from {} to {}",
        "Preview".blue().bold(),
        rule.template.title.cyan(),
        window.from,
        window.to
    );
    if plan.dates.is_empty() {
        println!("No occurrences in this window");
    }
    let time_of_day = rule.start_date.time();
    for (i, date) in plan.dates.iter().enumerate() {
        let start = date.and_time(time_of_day).and_utc();
        println!("  {}. {}", i + 1, format_in_timezone(start, ctx.tz));
    }
    if plan.exhausted {
        println!("{}", "The rule ends within this window.".dimmed());
    }
    if window.truncated {
        println!(
            "{} window cut at the {}-day horizon",
            "Note:".yellow().bold(),
            ctx.engine.expander().config().horizon_days
        );
    }

    Ok(())
}
