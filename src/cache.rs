//! Cache-aside layer in front of the response builder
//!
//! Two slots per user share one logical TTL:
//! - `{prefix}:bff:{user}` holds the serialized response
//! - `{prefix}:last_update:{user}` holds an RFC 3339 timestamp
//!
//! The data slot is only trusted while the timestamp is fresh. Staleness is
//! evaluated lazily on read; nothing sweeps expired entries.
//!
//! Concurrent misses for the same user each recompute and overwrite the
//! slots (last writer wins).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::store::{CacheError, CacheStore};
use crate::summary::{SpendTrackingResponse, SpendTrackingResponseBuilder};

/// Snapshot of cache effectiveness counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache, 0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Staleness-gated cache wrapping [`SpendTrackingResponseBuilder`]
pub struct StalenessAwareCache {
    builder: SpendTrackingResponseBuilder,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StalenessAwareCache {
    pub fn new(
        builder: SpendTrackingResponseBuilder,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            builder,
            cache,
            clock,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached response when fresh, otherwise build and store one.
    ///
    /// Cache failures never fail the call; they are logged and the response
    /// is computed directly.
    pub fn get_or_compute(&self, user_id: &str) -> Result<SpendTrackingResponse> {
        self.config.validate_user_id(user_id)?;

        if let Some(response) = self.read_fresh(user_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("cache hit for {}", user_id);
            return Ok(response);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss for {}, recomputing", user_id);

        let response = self.builder.build(user_id)?;
        self.write(user_id, &response);
        Ok(response)
    }

    /// Delete both slots for `user_id`.
    ///
    /// Both deletes are attempted; the first failure is returned.
    pub fn invalidate_user_cache(&self, user_id: &str) -> Result<()> {
        self.config.validate_user_id(user_id)?;

        let data = self.cache.delete(&self.config.data_key(user_id));
        let timestamp = self.cache.delete(&self.config.timestamp_key(user_id));
        data?;
        timestamp?;

        info!("invalidated cache for {}", user_id);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Cached response if the timestamp slot is present and within TTL
    fn read_fresh(&self, user_id: &str) -> Option<SpendTrackingResponse> {
        let updated_at = match self.last_update(user_id) {
            Ok(Some(ts)) => ts,
            Ok(None) => return None,
            Err(e) => {
                warn!("reading cache timestamp for {} failed: {}", user_id, e);
                return None;
            }
        };

        let now = self.clock.now();
        // Timestamps from the future are not trusted
        if updated_at > now || now - updated_at >= self.config.cache_ttl() {
            debug!("cache entry for {} is stale (updated {})", user_id, updated_at);
            return None;
        }

        match self.read_data(user_id) {
            Ok(response) => response,
            Err(e) => {
                warn!("reading cached response for {} failed: {}", user_id, e);
                None
            }
        }
    }

    fn last_update(&self, user_id: &str) -> std::result::Result<Option<DateTime<Utc>>, CacheError> {
        let raw = match self.cache.get(&self.config.timestamp_key(user_id))? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let parsed = std::str::from_utf8(&raw)
            .ok()
            .and_then(|text| DateTime::parse_from_rfc3339(text.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc));
        if parsed.is_none() {
            warn!("ignoring unparsable cache timestamp for {}", user_id);
        }
        Ok(parsed)
    }

    fn read_data(&self, user_id: &str) -> std::result::Result<Option<SpendTrackingResponse>, CacheError> {
        match self.cache.get(&self.config.data_key(user_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store the response, then the timestamp
    fn write(&self, user_id: &str, response: &SpendTrackingResponse) {
        let ttl = self.config.cache_ttl_std();

        let payload = match serde_json::to_vec(response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("serializing response for {} failed: {}", user_id, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(&self.config.data_key(user_id), &payload, ttl) {
            warn!("caching response for {} failed: {}", user_id, e);
            return;
        }

        let stamp = self.clock.now().to_rfc3339();
        if let Err(e) = self
            .cache
            .set(&self.config.timestamp_key(user_id), stamp.as_bytes(), ttl)
        {
            warn!("caching timestamp for {} failed: {}", user_id, e);
        }
    }
}
