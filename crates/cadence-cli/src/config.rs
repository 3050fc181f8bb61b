use cadence_core::recurrence::{ExpansionConfig, DEFAULT_HORIZON_DAYS};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub owner: String,
    /// IANA timezone used when printing times; UTC when unset
    pub display_timezone: Option<String>,
    pub expansion: ExpansionSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExpansionSettings {
    /// Maximum number of days expanded per request
    pub horizon_days: u32,
    /// Window length used by `list` and `rule preview` without `--to`
    pub default_window_days: u32,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            default_window_days: 7,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            owner: "local".to_string(),
            display_timezone: None,
            expansion: ExpansionSettings::default(),
        }
    }
}

impl Config {
    /// Defaults, overridden by `config.toml`, overridden by `CADENCE_*`
    /// variables (`CADENCE_EXPANSION__HORIZON_DAYS` for nested keys).
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn expansion_config(&self) -> ExpansionConfig {
        ExpansionConfig {
            horizon_days: self.expansion.horizon_days.max(1),
        }
    }

    pub fn display_tz(&self) -> Result<Tz, String> {
        match &self.display_timezone {
            Some(name) => validate_timezone(name),
            None => Ok(Tz::UTC),
        }
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    timezone.parse::<Tz>().map_err(|_| {
        format!(
            "Invalid timezone: '{}'. Use IANA timezone names like 'America/New_York'",
            timezone
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::new()?;
            assert_eq!(config.database_path, "cadence.db");
            assert_eq!(config.owner, "local");
            assert_eq!(config.expansion.horizon_days, 120);
            assert_eq!(config.expansion.default_window_days, 7);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                owner = "alice"
                display_timezone = "Europe/Berlin"

                [expansion]
                horizon_days = 30
                "#,
            )?;
            jail.set_env("CADENCE_OWNER", "bob");
            jail.set_env("CADENCE_EXPANSION__DEFAULT_WINDOW_DAYS", "14");

            let config = Config::new()?;
            assert_eq!(config.owner, "bob");
            assert_eq!(config.expansion.horizon_days, 30);
            assert_eq!(config.expansion.default_window_days, 14);
            assert_eq!(config.display_tz(), Ok(Tz::Europe__Berlin));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_timezone_is_reported() {
        assert!(validate_timezone("Mars/Olympus").is_err());
    }
}
