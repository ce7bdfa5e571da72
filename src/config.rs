//! Engine configuration
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! wants to override.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendError};

/// Default cache time-to-live (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Default cache key namespace
pub const DEFAULT_KEY_PREFIX: &str = "spend_tracking";

/// Largest TTL whose millisecond count still fits a chrono duration
pub const MAX_CACHE_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_max_user_id_len() -> usize {
    128
}

/// Configuration for the spend tracking service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Logical TTL shared by the response slot and the timestamp slot
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Namespace for cache keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Longest accepted user id, in bytes
    #[serde(default = "default_max_user_id_len")]
    pub max_user_id_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            key_prefix: default_key_prefix(),
            max_user_id_len: default_max_user_id_len(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| SpendError::Config(format!("malformed config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SpendError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Builder-style TTL override
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(SpendError::Config("cache_ttl_secs must be positive".into()));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(SpendError::Config(format!(
                "cache_ttl_secs must not exceed {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(SpendError::Config("key_prefix must not be empty".into()));
        }
        if self.max_user_id_len == 0 {
            return Err(SpendError::Config("max_user_id_len must be positive".into()));
        }
        Ok(())
    }

    /// TTL as a chrono duration for timestamp comparisons
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }

    /// TTL as a std duration for cache store writes
    pub fn cache_ttl_std(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_secs)
    }

    /// Key of the cached response slot
    pub fn data_key(&self, user_id: &str) -> String {
        format!("{}:bff:{}", self.key_prefix, user_id)
    }

    /// Key of the last-update timestamp slot
    pub fn timestamp_key(&self, user_id: &str) -> String {
        format!("{}:last_update:{}", self.key_prefix, user_id)
    }

    /// Reject empty or malformed user ids before touching any store.
    ///
    /// `:` is refused because it separates cache key segments.
    pub fn validate_user_id(&self, user_id: &str) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(SpendError::InvalidUserId("user id is empty".into()));
        }
        if user_id.len() > self.max_user_id_len {
            return Err(SpendError::InvalidUserId(format!(
                "user id exceeds {} bytes",
                self.max_user_id_len
            )));
        }
        if user_id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == ':')
        {
            return Err(SpendError::InvalidUserId(format!(
                "user id {:?} contains forbidden characters",
                user_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys_match_wire_format() {
        let config = EngineConfig::default();
        assert_eq!(config.data_key("42"), "spend_tracking:bff:42");
        assert_eq!(config.timestamp_key("42"), "spend_tracking:last_update:42");
        assert_eq!(config.cache_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "cache_ttl_secs": 120 }"#).unwrap();
        assert_eq!(config.cache_ttl_secs, 120);
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.max_user_id_len, 128);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "cache_ttl_secs": 0 }"#).unwrap_err();
        assert!(matches!(err, SpendError::Config(_)));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "cache_ttl_secs": 18446744073709551615 }"#)
            .unwrap_err();
        assert!(matches!(err, SpendError::Config(_)));

        let max = EngineConfig::default().with_cache_ttl_secs(MAX_CACHE_TTL_SECS);
        assert!(max.validate().is_ok());
        assert!(max.cache_ttl() > chrono::Duration::zero());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(EngineConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_user_id_validation() {
        let config = EngineConfig::default();
        assert!(config.validate_user_id("user-17").is_ok());
        assert!(config.validate_user_id("3f2a9c").is_ok());

        for bad in ["", "   ", "a b", "a:b", "tab\there"] {
            let err = config.validate_user_id(bad).unwrap_err();
            assert!(matches!(err, SpendError::InvalidUserId(_)), "{:?} accepted", bad);
        }

        let long = "x".repeat(129);
        assert!(config.validate_user_id(&long).is_err());
    }
}
