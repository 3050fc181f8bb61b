use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Runs the `cadence` binary against a throwaway database.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// A command isolated from any `config.toml` or `CADENCE_*` settings of
    /// the host.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");
        cmd.current_dir(self.temp_dir.path())
            .env_remove("CADENCE_OWNER")
            .env_remove("CADENCE_DISPLAY_TIMEZONE")
            .env_remove("CADENCE_EXPANSION__HORIZON_DAYS")
            .env_remove("CADENCE_EXPANSION__DEFAULT_WINDOW_DAYS")
            .env_remove("RUST_LOG")
            .env("CADENCE_DATABASE_PATH", &self.db_path);
        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs a command that prints `... (<short id>) ...` and returns the ID.
    pub fn create_and_get_id(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        let stdout = strip_ansi(&String::from_utf8_lossy(&output));
        extract_short_id(&stdout).unwrap_or_else(|| panic!("no ID in output: {stdout}"))
    }
}

/// Removes terminal color sequences.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn extract_short_id(stdout: &str) -> Option<String> {
    let start = stdout.find('(')? + 1;
    let end = start + stdout[start..].find(')')?;
    Some(stdout[start..end].to_string())
}

/// Weekly Monday/Wednesday standup starting 2024-01-01 09:00 UTC.
pub fn standup_rule_args() -> Vec<&'static str> {
    vec![
        "rule",
        "add",
        "Standup",
        "--every",
        "weekly",
        "--on",
        "mon,wed",
        "--start",
        "2024-01-01 09:00",
    ]
}

#[test]
fn test_strip_ansi() {
    assert_eq!(strip_ansi("\u{1b}[33mab12cd34\u{1b}[39m"), "ab12cd34");
    assert_eq!(extract_short_id("Created rule 'X' (ab12cd34): weekly").as_deref(), Some("ab12cd34"));
}
