use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default scheduler tick: once a day. Re-running is idempotent, so a
/// denser tick only costs a few queries.
const DEFAULT_TICK_SECS: u64 = 86_400;

/// Top-level config (upkeep.toml + UPKEEP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpkeepConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Bounded retry while the database file/volume comes up — opening
    /// the handle is the daemon's concern, never the scheduler's.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            connect_retries: default_connect_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
        }
    }
}

impl UpkeepConfig {
    /// Load config. Search order:
    ///   1. explicit path argument (from UPKEEP_CONFIG)
    ///   2. ~/.upkeep/upkeep.toml
    /// Env vars prefixed UPKEEP_ override file values
    /// (e.g. UPKEEP_DATABASE_PATH).
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: UpkeepConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("UPKEEP_").split("_"))
            .extract()?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.upkeep/upkeep.toml")
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.upkeep/upkeep.db")
}

fn default_connect_retries() -> u32 {
    30
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = UpkeepConfig::default();
        assert_eq!(config.scheduler.tick_secs, 86_400);
        assert_eq!(config.database.connect_retries, 30);
        assert!(config.database.path.ends_with("upkeep.db"));
    }
}
