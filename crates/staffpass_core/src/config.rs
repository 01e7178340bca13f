//! Runtime configuration for the check-in pipeline.
//!
//! # Responsibility
//! - Hold every tunable timing and identity parameter in one place.
//! - Load overrides from JSON, defaulting every missing field.
//!
//! # Invariants
//! - `validate()` rejects zero durations and empty capacity.
//! - Signing secrets are not part of this struct and never serialized.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Minimum accepted HMAC secret length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Tunables shared by issuer, reader and sync components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Lifetime of an issued token. Longer than the rotation interval so a
    /// displayed code stays valid until it is replaced.
    pub token_ttl_secs: u64,
    /// Interval between automatic token re-issues.
    pub rotation_interval_secs: u64,
    /// Maximum age of a legacy payload measured from its issue time.
    pub legacy_max_age_secs: u64,
    /// Window during which an identical decoded string is dropped.
    pub scan_cooldown_ms: u64,
    /// Capacity of the display-only recent activity list.
    pub recent_activity_capacity: usize,
    /// Period of the recurring sync trigger while online.
    pub sync_interval_secs: u64,
    /// Minimum spacing between the starts of two sync runs.
    pub sync_debounce_secs: u64,
    /// Grace minutes added to the scheduled entry time before marking late.
    pub entry_tolerance_minutes: u32,
    /// Unit the reader device is installed at.
    pub reading_unit_id: String,
    /// Value written to `recorded_by`.
    pub operator_id: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 90,
            rotation_interval_secs: 60,
            legacy_max_age_secs: 120,
            scan_cooldown_ms: 3_000,
            recent_activity_capacity: 20,
            sync_interval_secs: 30,
            sync_debounce_secs: 5,
            entry_tolerance_minutes: 0,
            reading_unit_id: String::new(),
            operator_id: "reader".to_string(),
        }
    }
}

impl CoreConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("token_ttl_secs", self.token_ttl_secs),
            ("rotation_interval_secs", self.rotation_interval_secs),
            ("legacy_max_age_secs", self.legacy_max_age_secs),
            ("scan_cooldown_ms", self.scan_cooldown_ms),
            ("sync_interval_secs", self.sync_interval_secs),
            ("sync_debounce_secs", self.sync_debounce_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if self.recent_activity_capacity == 0 {
            return Err(ConfigError::Invalid(
                "recent_activity_capacity must be greater than zero".to_string(),
            ));
        }
        if self.operator_id.trim().is_empty() {
            return Err(ConfigError::Invalid("operator_id cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    pub fn legacy_max_age(&self) -> Duration {
        Duration::from_secs(self.legacy_max_age_secs)
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_millis(self.scan_cooldown_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_secs(self.sync_debounce_secs)
    }
}
