// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::omdb::DEFAULT_BASE_URL;
use crate::fetcher::RetryPolicy;
use crate::scheduler::SchedulerConfig;

pub const ENV_CONFIG_PATH: &str = "RATING_OVERLAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/overlay.toml";
/// Seeds the stored API key when none is set yet.
pub const ENV_API_KEY: &str = "OMDB_API_KEY";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// Synced scope: API key and color ranges.
    pub settings_path: PathBuf,
    /// Local scope: rating cache.
    pub cache_path: PathBuf,
    /// Replaces the built-in site table when set.
    pub sites_path: Option<PathBuf>,
    pub api: ApiConfig,
    pub scan: ScanConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            settings_path: PathBuf::from("data/settings.json"),
            cache_path: PathBuf::from("data/ratings.json"),
            sites_path: None,
            api: ApiConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_ms: 4_000,
            timeout_ms: 10_000,
            retry_attempts: 3,
            retry_base_ms: 300,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub batch_size: usize,
    pub stagger_ms: u64,
    pub debounce_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            stagger_ms: 500,
            debounce_ms: 300,
        }
    }
}

impl ScanConfig {
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            batch_size: self.batch_size,
            stagger: Duration::from_millis(self.stagger_ms),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing overlay config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $RATING_OVERLAY_CONFIG (must exist)
    /// 2) config/overlay.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.api.retry_attempts == 0 {
            return Err(anyhow!("api.retry_attempts must be at least 1"));
        }
        if self.scan.batch_size == 0 {
            return Err(anyhow!("scan.batch_size must be at least 1"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(anyhow!("api.base_url must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"
            [scan]
            batch_size = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.scan.batch_size, 20);
        assert_eq!(cfg.scan.stagger_ms, 500);
        assert_eq!(cfg.api.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.api.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn example_file_spells_out_the_defaults() {
        let cfg = AppConfig::from_toml_str(include_str!("../config/overlay.example.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.scan.scheduler(), SchedulerConfig::default());
        assert_eq!(cfg.scan.debounce(), crate::watcher::DEFAULT_QUIET);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_batches() {
        assert!(AppConfig::from_toml_str("colour = 1").is_err());
        assert!(AppConfig::from_toml_str("[scan]\nbatch_size = 0").is_err());
        assert!(AppConfig::from_toml_str("[api]\nretry_attempts = 0").is_err());
    }

    #[test]
    #[serial]
    fn env_path_overrides_default_location() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[api]\nbase_url = \"http://127.0.0.1:1/\"").unwrap();

        std::env::set_var(ENV_CONFIG_PATH, f.path());
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.api.base_url, "http://127.0.0.1:1/");

        std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        assert!(AppConfig::load_default().is_err());
        std::env::remove_var(ENV_CONFIG_PATH);
    }
}
