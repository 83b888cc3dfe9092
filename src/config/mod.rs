//! Configuration management

use crate::protocol::DEFAULT_PORT;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,

    /// TCP port
    pub port: u16,

    /// Lines buffered per client before new ones are dropped
    pub outbox_capacity: usize,

    /// Longest accepted input line in bytes, terminator excluded
    pub max_line_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            outbox_capacity: 256,
            max_line_len: 8 * 1024,
        }
    }
}

/// Who may log in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Allowed handles
    pub allowed: Vec<String>,

    /// Handle allowed to observe rooms
    pub supervisor: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            allowed: ["BOB", "JACK", "ALICE", "EVA", "MIKE", "SHIFT_LEAD"]
                .into_iter()
                .map(String::from)
                .collect(),
            supervisor: "SHIFT_LEAD".to_string(),
        }
    }
}

/// Normalized allow-list and supervisor name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPolicy {
    allowed: Vec<String>,
    supervisor: String,
}

impl IdentityPolicy {
    pub fn new<I, S>(allowed: I, supervisor: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in allowed {
            let name = name.as_ref().trim().to_uppercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        Self {
            allowed: names,
            supervisor: supervisor.trim().to_uppercase(),
        }
    }

    /// Whether `name` is an allowed handle; expects an upper-cased name
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.iter().any(|n| n == name)
    }

    pub fn is_supervisor(&self, name: &str) -> bool {
        self.supervisor == name
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn supervisor(&self) -> &str {
        &self.supervisor
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        IdentityConfig::default().policy()
    }
}

impl IdentityConfig {
    pub fn policy(&self) -> IdentityPolicy {
        IdentityPolicy::new(&self.allowed, &self.supervisor)
    }
}

impl Config {
    /// Load config from `path`, or from the default location, or return defaults if not found
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config {:?}", config_path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {:?}", config_path))?
        } else {
            if path.is_some() {
                bail!("Config file not found: {:?}", config_path);
            }
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parlor")
            .join("config.toml")
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        let policy = self.identity.policy();
        if policy.allowed().is_empty() {
            bail!("identity.allowed must list at least one name");
        }
        if !policy.is_allowed(policy.supervisor()) {
            bail!(
                "identity.supervisor '{}' is not in identity.allowed",
                policy.supervisor()
            );
        }
        if self.server.outbox_capacity == 0 {
            bail!("server.outbox_capacity must be greater than zero");
        }
        if self.server.max_line_len == 0 {
            bail!("server.max_line_len must be greater than zero");
        }
        Ok(())
    }

    /// `bind:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
