//! Run configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use hospital_core::{EtlError, EtlResult, SourcePaths, Table};
use hospital_graph::retry::{DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS};
use hospital_graph::{GraphConfig, RetryPolicy};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub graph: GraphConfig,
    pub sources: SourcePaths,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_DELAY.as_secs(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

/// Connection and source flags shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Directory holding the six CSV files (hospitals.csv, payers.csv, ...)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Neo4j bolt URI
    #[arg(long, global = true)]
    pub uri: Option<String>,

    /// Neo4j user
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Neo4j password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Neo4j database name
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Connection attempts before giving up
    #[arg(long, global = true)]
    pub retry_attempts: Option<u32>,

    /// Seconds between connection attempts
    #[arg(long, global = true)]
    pub retry_delay: Option<u64>,
}

impl EtlConfig {
    /// Build the effective configuration for this process.
    pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> EtlResult<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> EtlResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EtlError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
            .map_err(|e| EtlError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> EtlResult<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| EtlError::config(e.to_string()))?;
        // Paths in the file may use the file:// URI form.
        for table in Table::ALL {
            let raw = config.sources.get(table).to_string_lossy().into_owned();
            config.sources.set(table, &raw);
        }
        Ok(config)
    }

    /// Apply environment overrides. `lookup` returns a variable's value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> EtlResult<()> {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USERNAME") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.graph.database = database;
        }

        for table in Table::ALL {
            if let Some(location) = lookup(table.env_var()) {
                self.sources.set(table, &location);
            }
        }

        if let Some(raw) = lookup("ETL_RETRY_ATTEMPTS") {
            self.retry.max_attempts = parse_env("ETL_RETRY_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("ETL_RETRY_DELAY_SECS") {
            self.retry.delay_secs = parse_env("ETL_RETRY_DELAY_SECS", &raw)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.data_dir {
            self.sources = SourcePaths::from_dir(dir);
        }
        if let Some(uri) = &overrides.uri {
            self.graph.uri = uri.clone();
        }
        if let Some(user) = &overrides.user {
            self.graph.user = user.clone();
        }
        if let Some(password) = &overrides.password {
            self.graph.password = password.clone();
        }
        if let Some(database) = &overrides.database {
            self.graph.database = database.clone();
        }
        if let Some(attempts) = overrides.retry_attempts {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = overrides.retry_delay {
            self.retry.delay_secs = delay;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> EtlResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| EtlError::config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}
