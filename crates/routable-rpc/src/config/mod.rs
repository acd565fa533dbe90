//! Config loader (strict parsing).

pub mod schema;

use std::fs;

use routable_core::error::{Result, RoutableError};

pub use schema::{RoutableConfig, ServerSection, SessionConfig};

pub fn load_from_file(path: &str) -> Result<RoutableConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RoutableError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<RoutableConfig> {
    let cfg: RoutableConfig = serde_yaml::from_str(s)
        .map_err(|e| RoutableError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
