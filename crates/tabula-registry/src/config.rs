//! Node runtime configuration.
//!
//! These settings make the node's timing and memory limits explicit and
//! reproducible for operators.

use std::time::Duration;

use crate::error::{RegistryError, Result};

const ENV_SUBMIT_TIMEOUT_SECS: &str = "TABULA_REGISTRY_SUBMIT_TIMEOUT_SECS";
const ENV_DEDUP_WINDOW: &str = "TABULA_REGISTRY_DEDUP_WINDOW";

const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEDUP_WINDOW: u64 = 1024;

/// Runtime limits for a registry node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How long a submitter waits for its applied outcome before giving up
    /// with the outcome unknown.
    pub submit_timeout: Duration,
    /// How many recently applied correlation ids each partition applier
    /// remembers for duplicate suppression.
    pub dedup_window: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            dedup_window: usize::try_from(DEFAULT_DEDUP_WINDOW).unwrap_or(1024),
        }
    }
}

impl RegistryConfig {
    /// Loads node config from the process environment with strict validation.
    ///
    /// The values must be positive integers when provided.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer or exceeds the supported range.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads node config with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an environment value is not a
    /// positive integer or exceeds the supported range.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let submit_timeout_secs = parse_positive_u64_env(
            &get_env,
            ENV_SUBMIT_TIMEOUT_SECS,
            DEFAULT_SUBMIT_TIMEOUT_SECS,
        )?;
        let dedup_window = parse_positive_u64_env(&get_env, ENV_DEDUP_WINDOW, DEFAULT_DEDUP_WINDOW)?;
        let dedup_window = usize::try_from(dedup_window).map_err(|_| {
            RegistryError::configuration(format!(
                "{ENV_DEDUP_WINDOW} value {dedup_window} exceeds supported range"
            ))
        })?;

        Ok(Self {
            submit_timeout: Duration::from_secs(submit_timeout_secs),
            dedup_window,
        })
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.parse::<u64>().map_err(|_| {
        RegistryError::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(RegistryError::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}
