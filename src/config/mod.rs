//! Host configuration.
//!
//! Configuration is an optional TOML file with one table per backend id:
//!
//! ```toml
//! default_backend = "claude"
//!
//! [backends.claude]
//! binary = "/usr/local/bin/claude"
//! model = "sonnet"
//! permission_mode = "acceptEdits"
//!
//! [backends.claude.env]
//! NO_COLOR = "1"
//! ```
//!
//! Everything is defaultable; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend binary override. Defaults to the backend's own binary name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// Default model (e.g., "sonnet", "opus"). Overridable per invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Operating mode passed as `--permission-mode` (e.g., `acceptEdits`,
    /// `bypassPermissions`, `plan`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    /// Extra environment variables for the backend process.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl BackendConfig {
    /// Resolve the binary to spawn, falling back to the backend's default.
    pub fn get_binary<'a>(&'a self, default: &'a str) -> &'a str {
        self.binary.as_deref().filter(|b| !b.trim().is_empty()).unwrap_or(default)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend used when the caller does not name one.
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// Per-backend tables keyed by backend id.
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
}

fn default_backend() -> String {
    "claude".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            backends: HashMap::new(),
        }
    }
}

impl Config {
    /// Load from a TOML file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Settings for one backend; defaults when the table is absent.
    pub fn backend(&self, id: &str) -> BackendConfig {
        self.backends.get(id).cloned().unwrap_or_default()
    }
}
