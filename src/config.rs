//! Connection configuration
//!
//! [`ClientOptions`] is the explicit per-invocation configuration for
//! [`SearchClient`](crate::SearchClient). [`FileConfig`] is the optional
//! YAML config file layer the CLI merges beneath flags and environment
//! variables.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default dial timeout when neither flag, env, nor file sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Config file searched in the current and home directories when
/// `--config` is not given.
pub const CONFIG_FILE_NAME: &str = ".imap-cli.yaml";

/// How a [`SearchClient`](crate::SearchClient) reaches its server.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server address in `host:port` form.
    pub server: String,
    /// Connect with a direct TLS handshake instead of plain TCP.
    pub use_tls: bool,
    /// Skip server certificate verification (insecure, explicit opt-in).
    pub skip_verify: bool,
    /// Bound on the initial dial only; later stages are not deadlined.
    pub timeout: Duration,
}

impl ClientOptions {
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            use_tls: false,
            skip_verify: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The host part of the server address, for TLS name verification.
    #[must_use]
    pub fn host(&self) -> &str {
        self.server
            .rsplit_once(':')
            .map_or(self.server.as_str(), |(host, _)| host)
    }
}

/// Values read from a YAML config file. Every field is optional; the
/// CLI fills in whatever flags and environment variables left unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub mailbox: Option<String>,
    pub tls: Option<bool>,
    #[serde(rename = "skip-verify")]
    pub skip_verify: Option<bool>,
    pub timeout: Option<String>,
    #[serde(rename = "no-results-error")]
    pub no_results_error: Option<bool>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// With an explicit path, the file must exist and parse. Without
    /// one, `.imap-cli.yaml` is searched in the current directory and
    /// then the home directory; absence is not an error.
    ///
    /// Returns the parsed config and the path it was read from.
    pub fn load(explicit: Option<&Path>) -> Result<Option<(Self, PathBuf)>> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match Self::search_default_locations() {
                Some(path) => path,
                None => return Ok(None),
            },
        };

        let raw = std::fs::read_to_string(&path)?;
        let config = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
        Ok(Some((config, path)))
    }

    fn search_default_locations() -> Option<PathBuf> {
        let cwd = PathBuf::from(CONFIG_FILE_NAME);
        if cwd.exists() {
            return Some(cwd);
        }
        let home = dirs::home_dir()?.join(CONFIG_FILE_NAME);
        home.exists().then_some(home)
    }
}

/// Parse a human-readable duration such as `5s`, `500ms`, `2m`, or a
/// bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || Error::Config(format!("invalid duration: {raw:?}"));

    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(invalid()),
    }
}
