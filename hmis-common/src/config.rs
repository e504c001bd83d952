//! Configuration loading and resolution
//!
//! Stager settings live in a TOML file. Every key is optional; anything
//! missing falls back to the compiled defaults below.

use crate::time::secs_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HMIS_CONFIG";

/// Environment variable carrying the export notification address
pub const NOTIFY_ENV_VAR: &str = "HMIS_NOTIFY_ADDRESS";

/// Stager configuration (TOML schema)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagerConfig {
    /// Data series to export
    pub series_name: String,
    /// Address the export service notifies; must be registered with JSOC
    pub notify_address: Option<String>,
    /// Segment selector appended to the record set query
    pub segment: String,
    /// Sampling cadence of the query in seconds
    pub sample_seconds: u32,
    /// Destination directory handed to the staging client when nudging jobs
    pub download_dir: PathBuf,
    /// Directory holding the outcome logs
    pub log_dir: PathBuf,
    /// Success log file name (inside `log_dir`)
    pub success_log: String,
    /// Failure log file name (inside `log_dir`)
    pub failure_log: String,
    /// Output file name for extracted request IDs (inside `log_dir`)
    pub id_list: String,
    /// Prefix of request identifiers, e.g. `JSOC` in `JSOC_20130801_123`
    pub id_prefix: String,
    /// Submission cycles allowed per range before the range is abandoned
    pub max_attempts: u32,
    /// Ranges matching more records than this are bisected
    pub max_records_per_request: u64,
    /// Months staged concurrently by a multi-month run
    pub max_concurrent_sessions: usize,
    pub jsoc: JsocConfig,
    pub delays: DelayConfig,
    pub logging: LoggingConfig,
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            series_name: "hmi.sharp_cea_720s".to_string(),
            notify_address: None,
            segment: "bitmap".to_string(),
            sample_seconds: 3600,
            download_dir: PathBuf::from("HMI Downloaded Files"),
            log_dir: PathBuf::from("DownloadRequestData"),
            success_log: "request_numbers.txt".to_string(),
            failure_log: "problem_requests.txt".to_string(),
            id_list: "request_ids.txt".to_string(),
            id_prefix: "JSOC".to_string(),
            max_attempts: 10,
            max_records_per_request: 2500,
            max_concurrent_sessions: 1,
            jsoc: JsocConfig::default(),
            delays: DelayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl StagerConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StagerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the stager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.series_name.trim().is_empty() {
            return Err(Error::Config("series_name must not be empty".to_string()));
        }
        if self.segment.trim().is_empty() {
            return Err(Error::Config("segment must not be empty".to_string()));
        }
        if self.sample_seconds == 0 {
            return Err(Error::Config("sample_seconds must be positive".to_string()));
        }
        if self.max_records_per_request == 0 {
            return Err(Error::Config(
                "max_records_per_request must be positive".to_string(),
            ));
        }
        if self.max_concurrent_sessions == 0 {
            return Err(Error::Config(
                "max_concurrent_sessions must be at least 1".to_string(),
            ));
        }
        if self.jsoc.requests_per_second == 0 {
            return Err(Error::Config(
                "jsoc.requests_per_second must be positive".to_string(),
            ));
        }
        if self.id_prefix.trim().is_empty() {
            return Err(Error::Config("id_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// Full path of the success log
    pub fn success_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.success_log)
    }

    /// Full path of the failure log
    pub fn failure_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.failure_log)
    }

    /// Full path of the extracted ID list
    pub fn id_list_path(&self) -> PathBuf {
        self.log_dir.join(&self.id_list)
    }
}

/// JSOC export service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsocConfig {
    pub base_url: String,
    pub requests_per_second: u32,
    pub timeout_seconds: u64,
}

impl Default for JsocConfig {
    fn default() -> Self {
        Self {
            base_url: "http://jsoc.stanford.edu".to_string(),
            requests_per_second: 1,
            timeout_seconds: 60,
        }
    }
}

/// Throttle waits between service calls, in seconds
///
/// These are deliberate pauses against the export service and the log sink,
/// not timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Before recording a success
    pub success_settle: u64,
    /// Before appending any outcome line
    pub log_throttle: u64,
    /// Between a successful search and the submit call
    pub pre_submit: u64,
    /// Between nudges while double-tapping
    pub double_tap_interval: u64,
    /// Before resubmitting after double-tapping failed
    pub double_tap_retry: u64,
    /// Before resubmitting when a single nudge left the job stalled
    pub post_nudge_retry: u64,
    /// Before resubmitting a job that failed to stage
    pub stage_failure_retry: u64,
    /// Before resubmitting after a transport error
    pub transport_retry: u64,
    /// Before resubmitting after an unrecognized status
    pub unknown_status_retry: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            success_settle: 1,
            log_throttle: 5,
            pre_submit: 5,
            double_tap_interval: 10,
            double_tap_retry: 15,
            post_nudge_retry: 20,
            stage_failure_retry: 30,
            transport_retry: 60,
            unknown_status_retry: 60,
        }
    }
}

impl DelayConfig {
    /// All waits disabled
    pub fn none() -> Self {
        Self {
            success_settle: 0,
            log_throttle: 0,
            pre_submit: 0,
            double_tap_interval: 0,
            double_tap_retry: 0,
            post_nudge_retry: 0,
            stage_failure_retry: 0,
            transport_retry: 0,
            unknown_status_retry: 0,
        }
    }

    pub fn success_settle(&self) -> Duration {
        secs_to_duration(self.success_settle)
    }

    pub fn log_throttle(&self) -> Duration {
        secs_to_duration(self.log_throttle)
    }

    pub fn pre_submit(&self) -> Duration {
        secs_to_duration(self.pre_submit)
    }

    pub fn double_tap_interval(&self) -> Duration {
        secs_to_duration(self.double_tap_interval)
    }

    pub fn double_tap_retry(&self) -> Duration {
        secs_to_duration(self.double_tap_retry)
    }

    pub fn post_nudge_retry(&self) -> Duration {
        secs_to_duration(self.post_nudge_retry)
    }

    pub fn stage_failure_retry(&self) -> Duration {
        secs_to_duration(self.stage_failure_retry)
    }

    pub fn transport_retry(&self) -> Duration {
        secs_to_duration(self.transport_retry)
    }

    pub fn unknown_status_retry(&self) -> Duration {
        secs_to_duration(self.unknown_status_retry)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Config file resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. `HMIS_CONFIG` environment variable
/// 3. User config file (`~/.config/hmis/config.toml` on Linux)
/// 4. Compiled defaults (fallback)
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file to load, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir()
            .map(|d| d.join("hmis").join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Load configuration
    ///
    /// A missing file is not an error: the stager starts on defaults with a
    /// warning. A file that exists but does not parse is fatal.
    pub fn load(&self) -> Result<StagerConfig> {
        match self.config_path() {
            Some(path) => load_config_file(&path),
            None => {
                info!("No config file found, using compiled defaults");
                Ok(StagerConfig::default())
            }
        }
    }
}

/// Load a config file, falling back to defaults if it does not exist
pub fn load_config_file(path: &Path) -> Result<StagerConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using compiled defaults)",
            path.display()
        );
        return Ok(StagerConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = StagerConfig::from_toml_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the export notification address
///
/// **Priority:** ENV → TOML
pub fn resolve_notify_address(config: &StagerConfig) -> Result<String> {
    let env_address = std::env::var(NOTIFY_ENV_VAR)
        .ok()
        .filter(|a| is_valid_address(a));
    let toml_address = config
        .notify_address
        .as_ref()
        .filter(|a| is_valid_address(a));

    if let (Some(_), Some(_)) = (&env_address, &toml_address) {
        warn!(
            "Notify address found in both {} and TOML config. Using environment.",
            NOTIFY_ENV_VAR
        );
    }

    if let Some(address) = env_address {
        return Ok(address.trim().to_string());
    }

    if let Some(address) = toml_address {
        return Ok(address.trim().to_string());
    }

    Err(Error::Config(format!(
        "Notify address not configured. Set one of:\n\
         1. Environment: {}=you@example.org\n\
         2. TOML config: notify_address = \"you@example.org\"\n\
         \n\
         The address must be registered with the JSOC export system.",
        NOTIFY_ENV_VAR
    )))
}

/// Minimal sanity check for a notify address (non-blank, contains `@`)
pub fn is_valid_address(address: &str) -> bool {
    let trimmed = address.trim();
    !trimmed.is_empty() && trimmed.contains('@')
}
