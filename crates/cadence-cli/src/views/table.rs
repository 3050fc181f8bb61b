use cadence_core::models::{RecurrenceRule, Task, TaskPriority, TaskStatus, Termination};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::util::short_id;

/// Formats an instant in the display timezone, e.g. `2024-01-01 09:00 CET`.
pub fn format_in_timezone(datetime: DateTime<Utc>, tz: Tz) -> String {
    datetime.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z").to_string()
}

pub fn display_tasks(tasks: &[Task], tz: Tz) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Start", "Deadline", "Priority"]);

    let now = Utc::now();
    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(task.id)));

        let mut title = String::new();
        if task.recurrence_id.is_some() {
            title.push('↻');
            title.push(' ');
        }
        title.push_str(&task.title);

        let mut title_cell = Cell::new(title);
        title_cell = match task.status {
            TaskStatus::Done | TaskStatus::Canceled | TaskStatus::Skipped => title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            TaskStatus::Planned | TaskStatus::InProgress => match task.priority {
                TaskPriority::Critical => title_cell.fg(Color::Red).add_attribute(Attribute::Bold),
                TaskPriority::High => title_cell.fg(Color::Red),
                TaskPriority::Medium => title_cell,
                TaskPriority::Low => title_cell.fg(Color::Green),
            },
        };
        row.add_cell(title_cell);

        let status_cell = Cell::new(task.status.to_string());
        row.add_cell(match task.status {
            TaskStatus::Done => status_cell.fg(Color::Green),
            TaskStatus::InProgress => status_cell.fg(Color::Cyan),
            TaskStatus::Skipped | TaskStatus::Canceled => status_cell.fg(Color::DarkGrey),
            TaskStatus::Planned => status_cell,
        });

        row.add_cell(Cell::new(format_in_timezone(task.start_at, tz)));

        let open = matches!(task.status, TaskStatus::Planned | TaskStatus::InProgress);
        row.add_cell(match task.deadline_at {
            Some(deadline) if open && deadline < now => {
                Cell::new(format_in_timezone(deadline, tz)).fg(Color::Red)
            }
            Some(deadline) => Cell::new(format_in_timezone(deadline, tz)),
            None => Cell::new("None"),
        });

        row.add_cell(Cell::new(task.priority.to_string()));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn describe_termination(termination: &Termination) -> String {
    match termination {
        Termination::Never => "never".to_string(),
        Termination::Until(date) => format!("on {}", date),
        Termination::Count(count) => format!("after {} occurrences", count),
    }
}

pub fn display_rules(rules: &[RecurrenceRule], tz: Tz) {
    if rules.is_empty() {
        println!("No rules found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Pattern", "Starts", "Ends", "Generated", "Active"]);

    for rule in rules {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(rule.id)));
        row.add_cell(Cell::new(&rule.template.title));
        row.add_cell(Cell::new(rule.pattern.to_string()));
        row.add_cell(Cell::new(format_in_timezone(rule.start_date, tz)));
        row.add_cell(Cell::new(describe_termination(&rule.termination)));
        row.add_cell(Cell::new(rule.progress.occurrences_generated));
        row.add_cell(if rule.is_active {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("paused").fg(Color::Yellow)
        });
        table.add_row(row);
    }

    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_in_timezone() {
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 7, 0, 0).unwrap();
        assert_eq!(format_in_timezone(instant, Tz::UTC), "2024-07-01 07:00 UTC");
        assert_eq!(
            format_in_timezone(instant, Tz::Europe__Berlin),
            "2024-07-01 09:00 CEST"
        );
    }

    #[test]
    fn test_describe_termination() {
        assert_eq!(describe_termination(&Termination::Count(3)), "after 3 occurrences");
        assert_eq!(describe_termination(&Termination::Never), "never");
    }
}
