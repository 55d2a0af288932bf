//! Service-level configuration: HTTP bind address plus the embedded
//! [`ControllerConfig`]. Loaded with a load-with-default-on-missing
//! pattern from a flat `serde_json` file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use roof_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Top-level configuration for the `roofd` daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP/SSE API listens on.
    pub bind_addr: SocketAddr,
    /// Controller configuration.
    pub controller: ControllerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".parse().unwrap_or_else(|_| {
                SocketAddr::from(([127, 0, 0, 1], 8787))
            }),
            controller: ControllerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from the default location (`$HOME/.config/roofd/config.json`
    /// or `%LOCALAPPDATA%\roofd\config.json`), writing a default file if
    /// none exists yet.
    pub async fn load() -> Result<Self> {
        let path = Self::default_config_path()?;
        Self::load_from_path(&path).await
    }

    /// Load from an explicit path, writing a default file if none exists.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(?path, "config file not found; writing default");
            let config = Self::default();
            config.save_to_path(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {path:?}"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {path:?}"))?;
        debug!(?path, "loaded service config");
        Ok(config)
    }

    /// Persist to an explicit path, creating parent directories as needed.
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("creating config directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing config")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing config file {path:?}"))?;
        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(windows) {
            std::env::var("LOCALAPPDATA").context("LOCALAPPDATA is not set")?
        } else {
            format!("{}/.config", std::env::var("HOME").context("HOME is not set")?)
        };
        Ok(PathBuf::from(config_dir).join("roofd").join("config.json"))
    }
}
