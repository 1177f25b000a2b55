//! Terminal settings.
//!
//! Settings come from an optional JSON file, then environment variables
//! override individual fields:
//!
//! | Variable                   | Field                  |
//! |----------------------------|------------------------|
//! | `POS_ENDPOINT_URL`         | `endpointUrl`          |
//! | `POS_TRANSPORT`            | `transport`            |
//! | `POS_BOARD_POLL_SECS`      | `pollIntervalSecs`     |
//! | `POS_REQUEST_TIMEOUT_SECS` | `requestTimeoutSecs`   |
//! | `POS_LOG_DIR`              | `logDir`               |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{normalize_endpoint_url, Transport};
use crate::error::{PosError, PosResult};

const ENV_ENDPOINT_URL: &str = "POS_ENDPOINT_URL";
const ENV_TRANSPORT: &str = "POS_TRANSPORT";
const ENV_POLL_SECS: &str = "POS_BOARD_POLL_SECS";
const ENV_TIMEOUT_SECS: &str = "POS_REQUEST_TIMEOUT_SECS";
const ENV_LOG_DIR: &str = "POS_LOG_DIR";

/// Board polling faster than this just hammers the spreadsheet quota.
pub const MIN_POLL_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterSettings {
    pub endpoint_url: String,
    pub transport: Transport,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub max_log_files: usize,
    /// Write the log file as JSON lines instead of plain text.
    pub json_logs: bool,
}

impl Default for RegisterSettings {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            transport: Transport::Json,
            poll_interval_secs: 10,
            request_timeout_secs: 30,
            log_dir: None,
            max_log_files: 10,
            json_logs: false,
        }
    }
}

impl RegisterSettings {
    /// Read `path` (when given), apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> PosResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validated()
    }

    pub fn from_file(path: &Path) -> PosResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PosError::Settings(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| PosError::Settings(format!("parse {}: {e}", path.display())))
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> PosResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_ENDPOINT_URL) {
            debug!(source = ENV_ENDPOINT_URL, "endpoint url overridden");
            self.endpoint_url = url;
        }
        if let Some(raw) = lookup(ENV_TRANSPORT) {
            self.transport = Transport::parse(&raw).ok_or_else(|| {
                PosError::Settings(format!("{ENV_TRANSPORT}: unknown transport {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_POLL_SECS) {
            self.poll_interval_secs = parse_secs(ENV_POLL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Normalize the endpoint URL and clamp intervals.
    pub fn validated(mut self) -> PosResult<Self> {
        if self.endpoint_url.trim().is_empty() {
            return Err(PosError::Settings(format!(
                "endpoint URL is not configured (set endpointUrl or {ENV_ENDPOINT_URL})"
            )));
        }
        self.endpoint_url = normalize_endpoint_url(&self.endpoint_url);
        self.poll_interval_secs = self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.max_log_files = self.max_log_files.max(1);
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured log directory, or the per-user data directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

fn parse_secs(key: &str, raw: &str) -> PosResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| PosError::Settings(format!("{key}: expected whole seconds, got {raw:?}")))
}

/// Per-user data directory used when no log directory is configured.
pub fn default_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("pos-register").join("logs")
}
