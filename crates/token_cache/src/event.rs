// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::{CacheTelemetryData, Result};

/// The host's in-memory token collection, as seen by the provider.
///
/// The format of the serialized bytes belongs to the host. The provider treats them as an
/// opaque blob.
pub trait TokenCacheSerializer: Send + Sync {
    /// Serializes the current token collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be serialized.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Loads `bytes` into the token collection.
    ///
    /// An empty slice means there is nothing persisted for the partition. With
    /// `clear_existing` set, the collection drops its current content first.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` cannot be parsed.
    fn deserialize(&self, bytes: &[u8], clear_existing: bool) -> Result<()>;
}

/// Describes one access to the host's token collection.
///
/// The host creates a fresh event for every access and passes it to each hook. The provider
/// only reads it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use token_cache::{AccessEvent, Result, TokenCacheSerializer};
///
/// struct Empty;
///
/// impl TokenCacheSerializer for Empty {
///     fn serialize(&self) -> Result<Vec<u8>> {
///         Ok(Vec::new())
///     }
///
///     fn deserialize(&self, _bytes: &[u8], _clear_existing: bool) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let event = AccessEvent::new(Arc::new(Empty), "user-1")
///     .with_state_changed(true)
///     .with_tokens(true);
///
/// assert_eq!(event.suggested_key(), "user-1");
/// assert!(event.has_state_changed());
/// ```
#[derive(Clone)]
pub struct AccessEvent {
    token_cache: Arc<dyn TokenCacheSerializer>,
    suggested_key: String,
    has_state_changed: bool,
    has_tokens: bool,
    is_app_cache: bool,
    cancellation: CancellationToken,
    suggested_expiry: Option<SystemTime>,
    telemetry: Option<CacheTelemetryData>,
    no_distributed_cache_reason: Option<String>,
}

impl AccessEvent {
    /// Creates an event for the partition the host suggests.
    #[must_use]
    pub fn new(token_cache: Arc<dyn TokenCacheSerializer>, suggested_key: impl Into<String>) -> Self {
        Self {
            token_cache,
            suggested_key: suggested_key.into(),
            has_state_changed: false,
            has_tokens: false,
            is_app_cache: false,
            cancellation: CancellationToken::new(),
            suggested_expiry: None,
            telemetry: None,
            no_distributed_cache_reason: None,
        }
    }

    /// Marks whether the host mutated the collection during this access.
    #[must_use]
    pub fn with_state_changed(mut self, has_state_changed: bool) -> Self {
        self.has_state_changed = has_state_changed;
        self
    }

    /// Marks whether the collection still holds tokens for the partition.
    #[must_use]
    pub fn with_tokens(mut self, has_tokens: bool) -> Self {
        self.has_tokens = has_tokens;
        self
    }

    /// Marks the access as targeting the application cache rather than a user cache.
    #[must_use]
    pub fn with_app_cache(mut self, is_app_cache: bool) -> Self {
        self.is_app_cache = is_app_cache;
        self
    }

    /// Sets the cancellation token for the access.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Sets the expiry the host suggests for the persisted partition.
    #[must_use]
    pub fn with_suggested_expiry(mut self, suggested_expiry: Option<SystemTime>) -> Self {
        self.suggested_expiry = suggested_expiry;
        self
    }

    /// Attaches the sink through which the store reports the serving cache level.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CacheTelemetryData) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the reason the host advises against using a distributed cache.
    #[must_use]
    pub fn with_no_distributed_cache_reason(mut self, reason: impl Into<String>) -> Self {
        self.no_distributed_cache_reason = Some(reason.into());
        self
    }

    /// Returns the host's token collection.
    #[must_use]
    pub fn token_cache(&self) -> &Arc<dyn TokenCacheSerializer> {
        &self.token_cache
    }

    /// Returns the partition key suggested by the host.
    #[must_use]
    pub fn suggested_key(&self) -> &str {
        &self.suggested_key
    }

    /// Returns `true` if the host mutated the collection.
    #[must_use]
    pub fn has_state_changed(&self) -> bool {
        self.has_state_changed
    }

    /// Returns `true` if the collection holds tokens for the partition.
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.has_tokens
    }

    /// Returns `true` if the access targets the application cache.
    #[must_use]
    pub fn is_app_cache(&self) -> bool {
        self.is_app_cache
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the suggested expiry.
    #[must_use]
    pub fn suggested_expiry(&self) -> Option<SystemTime> {
        self.suggested_expiry
    }

    /// Returns the telemetry sink.
    #[must_use]
    pub fn telemetry(&self) -> Option<&CacheTelemetryData> {
        self.telemetry.as_ref()
    }

    /// Returns the reason the host advises against a distributed cache.
    #[must_use]
    pub fn no_distributed_cache_reason(&self) -> Option<&str> {
        self.no_distributed_cache_reason.as_deref()
    }
}

impl fmt::Debug for AccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEvent")
            .field("suggested_key", &self.suggested_key)
            .field("has_state_changed", &self.has_state_changed)
            .field("has_tokens", &self.has_tokens)
            .field("is_app_cache", &self.is_app_cache)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("suggested_expiry", &self.suggested_expiry)
            .field("no_distributed_cache_reason", &self.no_distributed_cache_reason)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheHints;
    use crate::testing::MockTokenCache;

    #[test]
    fn new_event_is_unchanged_and_empty() {
        let event = AccessEvent::new(Arc::new(MockTokenCache::new()), "key");
        assert!(!event.has_state_changed());
        assert!(!event.has_tokens());
        assert!(!event.is_app_cache());
        assert!(event.suggested_expiry().is_none());
        assert!(event.telemetry().is_none());
    }

    #[test]
    fn hints_follow_event() {
        let expiry = SystemTime::UNIX_EPOCH;
        let telemetry = CacheTelemetryData::new();
        let event = AccessEvent::new(Arc::new(MockTokenCache::new()), "key")
            .with_suggested_expiry(Some(expiry))
            .with_telemetry(telemetry)
            .with_no_distributed_cache_reason("in-memory only");

        let hints = CacheHints::from_event(&event);
        assert_eq!(hints.suggested_expiry(), Some(expiry));
        assert!(hints.telemetry().is_some());
        assert_eq!(hints.disable_message(), Some("in-memory only"));

        event.cancellation().cancel();
        assert!(hints.cancellation().is_cancelled());
    }

    #[test]
    fn debug_omits_token_cache() {
        let event = AccessEvent::new(Arc::new(MockTokenCache::new()), "account");
        let debug = format!("{event:?}");
        assert!(debug.contains("account"));
        assert!(!debug.contains("MockTokenCache"));
    }
}
