use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use routable_core::error::{Result, RoutableError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutableConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for RoutableConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            session: SessionConfig::default(),
        }
    }
}

impl RoutableConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RoutableError::UnsupportedVersion);
        }
        self.session.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Per-session timing and request decoration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Deadline for `send` when the caller gives none.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Deadline for `open` to observe the transport opening.
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Deadline for `close` to observe the transport closing.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Registry-wide default when a pending call is set without a timeout.
    #[serde(default = "default_registry_timeout_ms")]
    pub registry_timeout_ms: u64,

    /// Headers injected into every inbound request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            open_timeout_ms: default_open_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            registry_timeout_ms: default_registry_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("session.request_timeout_ms", self.request_timeout_ms),
            ("session.open_timeout_ms", self.open_timeout_ms),
            ("session.close_timeout_ms", self.close_timeout_ms),
            ("session.registry_timeout_ms", self.registry_timeout_ms),
        ];
        for (name, v) in ranges {
            if !(1..=600000).contains(&v) {
                return Err(RoutableError::BadRequest(format!(
                    "{name} must be between 1 and 600000"
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8787".into()
}
fn default_request_timeout_ms() -> u64 {
    3000
}
fn default_open_timeout_ms() -> u64 {
    30000
}
fn default_close_timeout_ms() -> u64 {
    30000
}
fn default_registry_timeout_ms() -> u64 {
    30000
}
