// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;
use token_cache::{CacheHints, CacheLevel, Operation, Result, TokenCacheStore};

use crate::{BytesCache, MemoryTokenCacheOptions};

/// Lifetime given to a partition whose suggested expiry already passed.
const MIN_EXPIRATION: Duration = Duration::from_millis(1);

/// Keeps token cache partitions in process memory.
///
/// Partitions expire after [`MemoryTokenCacheOptions::expiration`], or earlier when the cache
/// hints carry a sooner suggested expiry. Reads served from memory report [`CacheLevel::L1`]
/// to the telemetry sink of the hints.
///
/// # Examples
///
/// ```
/// use tick::Clock;
/// use token_cache::{CacheHints, TokenCacheStore};
/// use token_cache_memory::MemoryTokenCache;
///
/// # fn example(clock: Clock) -> token_cache::Result<()> {
/// let store = MemoryTokenCache::new(clock);
///
/// # futures::executor::block_on(async {
/// store.write("user", vec![1, 2, 3]).await?;
/// assert_eq!(store.read("user").await?, Some(vec![1, 2, 3]));
/// # Ok(())
/// # })
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTokenCache {
    cache: BytesCache,
    options: MemoryTokenCacheOptions,
    clock: Clock,
}

impl MemoryTokenCache {
    /// Creates a store with default options.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::with_options(MemoryTokenCacheOptions::default(), clock)
    }

    /// Creates a store with the given options.
    #[must_use]
    pub fn with_options(options: MemoryTokenCacheOptions, clock: Clock) -> Self {
        let mut builder = BytesCache::builder().name("token_cache_memory");
        if let Some(limit) = options.size_limit() {
            builder = builder.max_bytes(limit);
        }

        Self {
            cache: builder.build(),
            options,
            clock,
        }
    }

    /// Returns the options the store was created with.
    #[must_use]
    pub fn options(&self) -> &MemoryTokenCacheOptions {
        &self.options
    }

    /// Returns the underlying byte cache.
    #[must_use]
    pub fn cache(&self) -> &BytesCache {
        &self.cache
    }

    /// Computes how long a partition written with `hints` stays cached.
    ///
    /// The shorter of the configured expiration and the time left until the suggested
    /// expiry wins.
    #[must_use]
    pub fn determine_expiry(&self, hints: &CacheHints) -> Duration {
        let configured = self.options.expiration();
        let Some(suggested) = hints.suggested_expiry() else {
            return configured;
        };

        let remaining = suggested
            .duration_since(self.clock.system_time())
            .unwrap_or(MIN_EXPIRATION)
            .max(MIN_EXPIRATION);
        remaining.min(configured)
    }
}

impl TokenCacheStore for MemoryTokenCache {
    async fn read_bytes(&self, key: &str, hints: &CacheHints) -> Result<Option<Vec<u8>>> {
        let bytes = hints
            .cancellable(Operation::Read, async { Ok(self.cache.get(key).await) })
            .await?;

        if bytes.is_some() {
            hints.report_level(CacheLevel::L1);
        }
        log_read(key, bytes.is_some());
        Ok(bytes)
    }

    async fn write_bytes(&self, key: &str, bytes: Vec<u8>, hints: &CacheHints) -> Result<()> {
        let expiry = self.determine_expiry(hints);
        hints
            .cancellable(Operation::Write, async {
                self.cache.insert(key, bytes, Some(expiry)).await;
                Ok(())
            })
            .await
    }

    async fn remove_key(&self, key: &str, hints: &CacheHints) -> Result<()> {
        hints
            .cancellable(Operation::Remove, async {
                self.cache.remove(key).await;
                Ok(())
            })
            .await
    }
}

#[cfg_attr(
    not(any(feature = "logs", test)),
    allow(unused_variables, reason = "events compile to nothing without the logs feature")
)]
fn log_read(key: &str, hit: bool) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.memory.read",
        tracing::Level::DEBUG,
        cache.key = key,
        cache.hit = hit,
    );
}
