use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{RecurrenceRule, Task};
use cadence_core::repository::Repository;
use uuid::Uuid;

pub async fn resolve_task_id(repo: &impl Repository, owner: &str, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return Ok(id);
    }
    let tasks = repo.find_tasks_by_short_id(owner, short_id).await?;
    pick_one(tasks, short_id, "task", |t: &Task| (t.id, t.title.clone()))
}

pub async fn resolve_rule(repo: &impl Repository, owner: &str, short_id: &str) -> Result<RecurrenceRule> {
    if let Ok(id) = Uuid::parse_str(short_id) {
        return repo
            .find_rule(owner, id)
            .await?
            .ok_or_else(|| anyhow!(CoreError::NotFound(format!("No rule found with ID '{}'", id))));
    }
    let rules = repo.find_rules_by_short_id(owner, short_id).await?;
    let id = pick_one(rules.clone(), short_id, "rule", |r: &RecurrenceRule| {
        (r.id, r.template.title.clone())
    })?;
    rules
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| anyhow!(CoreError::NotFound(format!("No rule found with ID '{}'", id))))
}

fn pick_one<T>(items: Vec<T>, short_id: &str, kind: &str, describe: impl Fn(&T) -> (Uuid, String)) -> Result<Uuid> {
    match items.as_slice() {
        [single] => Ok(describe(single).0),
        [] => Err(anyhow!(CoreError::NotFound(format!(
            "No {} found with short ID '{}'",
            kind, short_id
        )))),
        many => {
            let info = many
                .iter()
                .map(|item| {
                    let (id, title) = describe(item);
                    (id.to_string(), title)
                })
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(info)))
        }
    }
}

/// Last eight hex digits of an ID, as shown in tables.
pub fn short_id(id: Uuid) -> String {
    let simple = id.simple().to_string();
    simple[simple.len() - 8..].to_string()
}
