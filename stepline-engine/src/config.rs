//! Engine configuration
//!
//! Defines the placement defaults handed to the compute provider, the name of
//! the code entry file inside each component folder, and the optional limits
//! applied to a component's polling loop.

use std::time::Duration;

use crate::execution::RunLimits;

/// Engine configuration
///
/// Every limit defaults to "off": polling is paced by the provider unless a
/// budget or deadline is configured explicitly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Compute manager base URL (e.g., "http://localhost:8081")
    pub manager_url: String,

    /// Domain sessions are created in
    pub domain: String,

    /// User group sessions are created in
    pub group: String,

    /// Hint passed to the provider on session creation; not enforced locally
    pub max_wait_seconds: u64,

    /// File name of the code blob inside each component folder
    pub code_entry: String,

    /// Maximum number of polls per component run
    pub max_polls: Option<u32>,

    /// Maximum wall-clock time of a component's polling loop
    pub run_deadline: Option<Duration>,

    /// Abort a full pipeline run at the first dependency violation
    pub stop_on_violation: bool,
}

impl EngineConfig {
    /// Creates a new configuration with defaults
    pub fn new(manager_url: String) -> Self {
        Self {
            manager_url,
            domain: "default".to_string(),
            group: "default".to_string(),
            max_wait_seconds: 5,
            code_entry: "main.py".to_string(),
            max_polls: None,
            run_deadline: None,
            stop_on_violation: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - STEPLINE_MANAGER_URL (optional, default: http://localhost:8081)
    /// - STEPLINE_DOMAIN (optional, default: default)
    /// - STEPLINE_GROUP (optional, default: default)
    /// - STEPLINE_MAX_WAIT_SECONDS (optional, default: 5)
    /// - STEPLINE_CODE_ENTRY (optional, default: main.py)
    /// - STEPLINE_MAX_POLLS (optional, unlimited when unset)
    /// - STEPLINE_RUN_DEADLINE (optional, seconds, unlimited when unset)
    /// - STEPLINE_STOP_ON_VIOLATION (optional, default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        let manager_url = std::env::var("STEPLINE_MANAGER_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());

        let mut config = Self::new(manager_url);

        if let Ok(domain) = std::env::var("STEPLINE_DOMAIN") {
            config.domain = domain;
        }

        if let Ok(group) = std::env::var("STEPLINE_GROUP") {
            config.group = group;
        }

        if let Some(wait) = parse_var::<u64>("STEPLINE_MAX_WAIT_SECONDS")? {
            config.max_wait_seconds = wait;
        }

        if let Ok(entry) = std::env::var("STEPLINE_CODE_ENTRY") {
            config.code_entry = entry;
        }

        config.max_polls = parse_var::<u32>("STEPLINE_MAX_POLLS")?;
        config.run_deadline = parse_var::<u64>("STEPLINE_RUN_DEADLINE")?.map(Duration::from_secs);

        if let Some(stop) = parse_var::<bool>("STEPLINE_STOP_ON_VIOLATION")? {
            config.stop_on_violation = stop;
        }

        Ok(config)
    }

    /// Sets the domain and group sessions are created in
    pub fn with_placement(mut self, domain: impl Into<String>, group: impl Into<String>) -> Self {
        self.domain = domain.into();
        self.group = group.into();
        self
    }

    /// Sets the code entry file name
    pub fn with_code_entry(mut self, entry: impl Into<String>) -> Self {
        self.code_entry = entry.into();
        self
    }

    /// Sets the per-component polling limits
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.max_polls = limits.max_polls;
        self.run_deadline = limits.deadline;
        self
    }

    /// Aborts full runs at the first dependency violation
    pub fn with_stop_on_violation(mut self, stop: bool) -> Self {
        self.stop_on_violation = stop;
        self
    }

    /// Polling limits applied to each component run
    pub fn limits(&self) -> RunLimits {
        RunLimits {
            max_polls: self.max_polls,
            deadline: self.run_deadline,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.manager_url.starts_with("http://") && !self.manager_url.starts_with("https://") {
            anyhow::bail!("manager_url must start with http:// or https://");
        }

        if self.domain.trim().is_empty() {
            anyhow::bail!("domain cannot be empty");
        }

        if self.group.trim().is_empty() {
            anyhow::bail!("group cannot be empty");
        }

        if self.code_entry.trim().is_empty() {
            anyhow::bail!("code_entry cannot be empty");
        }

        if self.code_entry.contains('/') {
            anyhow::bail!("code_entry must be a file name, not a path");
        }

        if self.max_polls == Some(0) {
            anyhow::bail!("max_polls must be greater than 0");
        }

        if self.run_deadline == Some(Duration::ZERO) {
            anyhow::bail!("run_deadline must be greater than 0");
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("http://localhost:8081".to_string())
    }
}

/// Reads and parses an optional environment variable
fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", name, e)),
        Err(_) => Ok(None),
    }
}
