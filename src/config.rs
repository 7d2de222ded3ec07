use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::triage::scorer::RiskThresholds;
use crate::triage::types::TriageError;

/// Application-level constants
pub const APP_NAME: &str = "HealthBridge";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_RESOURCES_DIR: &str = "HEALTHBRIDGE_RESOURCES_DIR";
pub const ENV_ENSEMBLE: &str = "HEALTHBRIDGE_ENSEMBLE";
pub const ENV_THRESHOLDS: &str = "HEALTHBRIDGE_THRESHOLDS";
pub const ENV_HISTORY_TIMEOUT_MS: &str = "HEALTHBRIDGE_HISTORY_TIMEOUT_MS";
pub const ENV_MAX_EPISODES: &str = "HEALTHBRIDGE_MAX_EPISODES";
pub const ENV_HISTORY_DB: &str = "HEALTHBRIDGE_HISTORY_DB";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HISTORY_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_MAX_EPISODES: usize = 10;

/// Used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,healthbridge=debug"
}

/// ~/HealthBridge/, or `None` when no home directory can be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default on-disk location of the history database.
pub fn default_history_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("history.db"))
}

/// Named risk threshold sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdProfile {
    /// red >= 80, amber >= 50
    #[default]
    Standard,
    /// red >= 70, amber >= 40
    Strict,
}

impl ThresholdProfile {
    pub fn thresholds(self) -> RiskThresholds {
        match self {
            Self::Standard => RiskThresholds::STANDARD,
            Self::Strict => RiskThresholds::STRICT,
        }
    }
}

impl FromStr for ThresholdProfile {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(TriageError::Configuration(format!(
                "unknown threshold profile: {other}"
            ))),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, TriageError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TriageError::Configuration(format!("invalid {key}: {raw:?}"))),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<bool, TriageError> {
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(TriageError::Configuration(format!("invalid {key}: {v:?}"))),
        },
    }
}

/// Tunables for the triage engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory of reference JSON tables. `None` uses the bundled tables.
    pub resources_dir: Option<PathBuf>,
    /// Average the rule-based score with the weighted offline signal.
    pub ensemble: bool,
    pub thresholds: ThresholdProfile,
    pub history_timeout: Duration,
    pub max_episodes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resources_dir: None,
            ensemble: false,
            thresholds: ThresholdProfile::Standard,
            history_timeout: Duration::from_millis(DEFAULT_HISTORY_TIMEOUT_MS),
            max_episodes: DEFAULT_MAX_EPISODES,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, TriageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TriageError> {
        let defaults = Self::default();
        let max_episodes = parse_var(&lookup, ENV_MAX_EPISODES)?.unwrap_or(defaults.max_episodes);
        if max_episodes == 0 {
            return Err(TriageError::Configuration(format!(
                "{ENV_MAX_EPISODES} must be at least 1"
            )));
        }

        Ok(Self {
            resources_dir: lookup(ENV_RESOURCES_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ensemble: parse_flag(&lookup, ENV_ENSEMBLE)?,
            thresholds: parse_var(&lookup, ENV_THRESHOLDS)?.unwrap_or_default(),
            history_timeout: parse_var(&lookup, ENV_HISTORY_TIMEOUT_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.history_timeout),
            max_episodes,
        })
    }
}

/// Where the history store keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryBackend {
    Memory,
    Sqlite(PathBuf),
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub history: HistoryBackend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            history: HistoryBackend::Memory,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, TriageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `HEALTHBRIDGE_HISTORY_DB` selects SQLite; the value `memory` or an
    /// unset variable keeps records in memory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TriageError> {
        let defaults = Self::default();
        let ip: IpAddr = parse_var(&lookup, ENV_HOST)?.unwrap_or(defaults.bind.ip());
        let port: u16 = parse_var(&lookup, ENV_PORT)?.unwrap_or(defaults.bind.port());

        let history = match lookup(ENV_HISTORY_DB).map(|v| v.trim().to_string()) {
            None => HistoryBackend::Memory,
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("memory") => HistoryBackend::Memory,
            Some(v) if v.eq_ignore_ascii_case("default") => default_history_db_path()
                .map(HistoryBackend::Sqlite)
                .ok_or_else(|| {
                    TriageError::Configuration("cannot determine home directory".into())
                })?,
            Some(v) => HistoryBackend::Sqlite(PathBuf::from(v)),
        };

        Ok(Self {
            bind: SocketAddr::new(ip, port),
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_under_home() {
        if let (Some(dir), Some(home)) = (app_data_dir(), dirs::home_dir()) {
            assert!(dir.starts_with(home));
            assert!(dir.ends_with("HealthBridge"));
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn engine_defaults_without_env() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history_timeout, Duration::from_millis(2000));
        assert_eq!(config.max_episodes, 10);
        assert_eq!(config.thresholds.thresholds(), RiskThresholds::STANDARD);
    }

    #[test]
    fn engine_reads_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_ENSEMBLE, "true"),
            (ENV_THRESHOLDS, "Strict"),
            (ENV_HISTORY_TIMEOUT_MS, "250"),
            (ENV_MAX_EPISODES, "5"),
            (ENV_RESOURCES_DIR, "/opt/triage"),
        ]))
        .unwrap();
        assert!(config.ensemble);
        assert_eq!(config.thresholds, ThresholdProfile::Strict);
        assert_eq!(config.history_timeout, Duration::from_millis(250));
        assert_eq!(config.max_episodes, 5);
        assert_eq!(config.resources_dir, Some(PathBuf::from("/opt/triage")));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for pairs in [
            [(ENV_THRESHOLDS, "lenient")],
            [(ENV_HISTORY_TIMEOUT_MS, "soon")],
            [(ENV_ENSEMBLE, "maybe")],
            [(ENV_MAX_EPISODES, "0")],
        ] {
            match EngineConfig::from_lookup(lookup_from(&pairs)).unwrap_err() {
                TriageError::Configuration(_) => {}
                other => panic!("Expected Configuration, got {other:?}"),
            }
        }
    }

    #[test]
    fn server_defaults_to_port_5000_in_memory() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind.port(), 5000);
        assert!(config.bind.ip().is_unspecified());
        assert_eq!(config.history, HistoryBackend::Memory);
    }

    #[test]
    fn server_reads_host_port_and_db() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_HOST, "127.0.0.1"),
            (ENV_PORT, "8080"),
            (ENV_HISTORY_DB, "/var/lib/hb/history.db"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.history,
            HistoryBackend::Sqlite(PathBuf::from("/var/lib/hb/history.db"))
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(ServerConfig::from_lookup(lookup_from(&[(ENV_PORT, "99999")])).is_err());
    }
}
