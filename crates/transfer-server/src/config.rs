//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Bind address used when neither the CLI nor the config file sets one.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Directory uploaded files are stored in.
    pub upload_dir: Option<String>,
    /// Reject file names that could escape the upload directory.
    pub strict_file_names: Option<bool>,
    /// Serialize concurrent uploads targeting the same file name.
    pub serialize_writes: Option<bool>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<ServerConfig>(raw)?)
    }

    pub fn strict_file_names(&self) -> bool {
        self.strict_file_names.unwrap_or(false)
    }

    pub fn serialize_writes(&self) -> bool {
        self.serialize_writes.unwrap_or(true)
    }
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Extract the upload directory from config.
pub fn upload_dir_from_config(cfg: &ServerConfig) -> Result<PathBuf> {
    cfg.upload_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("upload_dir is required (config or --upload-dir)"))
}
