// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyspawn::Spawner;
use tick::Clock;
use token_cache::{CacheHints, CacheLevel, MeasureExt, Operation, Result, TokenCacheStore};
use token_cache_memory::BytesCache;

use crate::builder::DistributedTokenCacheBuilder;
use crate::telemetry::{self, L2Call};
use crate::{DistributedCache, DistributedEntryOptions, DistributedTokenCacheOptions};

/// Lifetime given to an in-memory entry whose expiry already passed.
const MIN_EXPIRATION: Duration = Duration::from_millis(1);

/// A token cache store with an in-memory level (L1) in front of a distributed cache (L2).
///
/// - Reads try L1 first. An L1 hit refreshes the sliding expiration of the L2 entry; an L1
///   miss reads L2 and copies a hit back into L1.
/// - Writes go to both levels. The L2 write is awaited unless background writes are enabled.
/// - Removals clear L1, then L2.
///
/// L2 failures never reach the caller: they are logged, retried once when the configured
/// failure predicate allows it, and otherwise treated as a miss. Cancellation of the hints'
/// token does reach the caller.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tick::Clock;
/// use token_cache::TokenCacheProvider;
/// use token_cache_distributed::{DistributedCache, DistributedTokenCache, DistributedTokenCacheOptions};
///
/// # fn example(l2: impl DistributedCache + 'static, clock: Clock) -> Result<(), token_cache_distributed::OptionsError> {
/// let options = DistributedTokenCacheOptions::default()
///     .absolute_expiration_relative_to_now(Duration::from_secs(24 * 60 * 60))
///     .l1_expiration_time_ratio(0.5)
///     .on_l2_failure(|_| true);
///
/// let store = DistributedTokenCache::builder(l2, clock).options(options).build()?;
/// let provider = TokenCacheProvider::builder(store).build();
/// # let _ = provider;
/// # Ok(())
/// # }
/// ```
pub struct DistributedTokenCache<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    l2: C,
    l1: Option<BytesCache>,
    l1_expiration: Option<Duration>,
    options: DistributedTokenCacheOptions,
    clock: Clock,
    spawner: Option<Spawner>,
}

impl<C> Clone for DistributedTokenCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for DistributedTokenCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedTokenCache")
            .field("l1", &self.inner.l1)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl<C: DistributedCache + 'static> DistributedTokenCache<C> {
    /// Creates a builder around the distributed cache `l2`.
    #[must_use]
    pub fn builder(l2: C, clock: Clock) -> DistributedTokenCacheBuilder<C> {
        DistributedTokenCacheBuilder::new(l2, clock)
    }

    pub(crate) fn from_builder(builder: DistributedTokenCacheBuilder<C>) -> Self {
        let DistributedTokenCacheBuilder {
            l2,
            clock,
            options,
            spawner,
        } = builder;

        let l1 = (!options.is_l1_disabled()).then(|| {
            BytesCache::builder()
                .max_bytes(options.l1_size_limit())
                .name("token_cache_l1")
                .build()
        });

        Self {
            inner: Arc::new(Inner {
                l2,
                l1,
                l1_expiration: options.l1_expiration(),
                options,
                clock,
                spawner,
            }),
        }
    }

    /// Returns the options the store was built with.
    #[must_use]
    pub fn options(&self) -> &DistributedTokenCacheOptions {
        &self.inner.options
    }

    /// Returns the in-memory level, unless it is disabled.
    #[must_use]
    pub fn l1(&self) -> Option<&BytesCache> {
        self.inner.l1.as_ref()
    }

    /// Returns the distributed level.
    #[must_use]
    pub fn l2(&self) -> &C {
        &self.inner.l2
    }

    /// Computes how long a partition written with `hints` stays in memory.
    ///
    /// The entry expires at the suggested expiry, or the configured absolute expiration when
    /// there is no suggestion, or after the L1 lifetime, whichever comes first. `None` means
    /// the entry is only dropped when evicted.
    #[must_use]
    pub fn l1_expiry(&self, hints: &CacheHints) -> Option<Duration> {
        let until_absolute = hints
            .suggested_expiry()
            .or_else(|| self.inner.options.absolute_expiration_at())
            .map(|at| {
                at.duration_since(self.inner.clock.system_time())
                    .unwrap_or(MIN_EXPIRATION)
                    .max(MIN_EXPIRATION)
            });

        match (until_absolute, self.inner.l1_expiration) {
            (Some(absolute), Some(relative)) => Some(absolute.min(relative)),
            (absolute, relative) => absolute.or(relative),
        }
    }

    /// Computes the expiration settings of an L2 write made with `hints`.
    ///
    /// The earlier of the suggested expiry and the configured absolute expiration becomes the
    /// absolute expiration. Relative and sliding expirations come from the options.
    #[must_use]
    pub fn l2_entry_options(&self, hints: &CacheHints) -> DistributedEntryOptions {
        let options = &self.inner.options;
        DistributedEntryOptions {
            absolute_expiration: earliest(hints.suggested_expiry(), options.absolute_expiration_at()),
            absolute_expiration_relative_to_now: options.relative_expiration(),
            sliding_expiration: options.sliding_window(),
        }
    }

    async fn read_levels(&self, key: &str, hints: &CacheHints) -> Option<Vec<u8>> {
        let inner = &*self.inner;

        if let Some(l1) = &inner.l1 {
            let cached = l1.get(key).await;
            telemetry::l1_access("read", key, cached.as_ref().map_or(0, Vec::len), l1.entry_count());

            if let Some(bytes) = cached {
                let len = bytes.len();
                inner
                    .l2_call(L2Call::Refresh, key, |_: &()| len, || inner.l2.refresh(key))
                    .await;
                hints.report_level(CacheLevel::L1);
                return Some(bytes);
            }
        }

        let measured = inner
            .l2_call(
                L2Call::Read,
                key,
                |value: &Option<Vec<u8>>| value.as_ref().map_or(0, Vec::len),
                || inner.l2.get(key),
            )
            .measure(&inner.clock)
            .await;
        telemetry::l2_read_time(measured.millis());

        let bytes = measured.result.flatten()?;
        hints.report_level(CacheLevel::L2);

        if let Some(l1) = &inner.l1 {
            telemetry::back_propagated(key, bytes.len());
            l1.insert(key, bytes.clone(), inner.l1_expiration).await;
            telemetry::l1_access("back_propagate", key, bytes.len(), l1.entry_count());
        }
        Some(bytes)
    }

    async fn write_levels(&self, key: &str, bytes: Vec<u8>, hints: &CacheHints) {
        let inner = &*self.inner;

        if let Some(l1) = &inner.l1 {
            let len = bytes.len();
            l1.insert(key, bytes.clone(), self.l1_expiry(hints)).await;
            telemetry::l1_access("write", key, len, l1.entry_count());
        }

        let entry_options = self.l2_entry_options(hints);
        match &inner.spawner {
            Some(spawner) if inner.options.writes_in_background() => {
                let inner = Arc::clone(&self.inner);
                let key = key.to_owned();
                drop(spawner.spawn(async move { inner.write_l2(&key, &bytes, &entry_options).await }));
            }
            _ => inner.write_l2(key, &bytes, &entry_options).await,
        }
    }

    async fn remove_levels(&self, key: &str) {
        let inner = &*self.inner;

        if let Some(l1) = &inner.l1 {
            l1.remove(key).await;
            telemetry::l1_removed(key);
        }

        inner.l2_call(L2Call::Remove, key, |_: &()| 0, || inner.l2.remove(key)).await;
    }
}

impl<C: DistributedCache> Inner<C> {
    async fn write_l2(&self, key: &str, bytes: &[u8], options: &DistributedEntryOptions) {
        self.l2_call(L2Call::Write, key, |_: &()| bytes.len(), || self.l2.set(key, bytes, options))
            .await;
    }

    /// Runs an L2 call, retrying it once if the failure predicate allows.
    ///
    /// Returns `None` if the call did not succeed.
    async fn l2_call<T, F, Fut>(&self, call: L2Call, key: &str, size: impl Fn(&T) -> usize, mut operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut in_retry = false;
        loop {
            let measured = operation().measure(&self.clock).await;
            let millis = measured.millis();
            match measured.result {
                Ok(value) => {
                    telemetry::l2_state(call, key, size(&value), in_retry, millis);
                    return Some(value);
                }
                Err(error) => {
                    telemetry::l2_failed(call, in_retry, &error);
                    if in_retry || !self.options.should_retry(&error) {
                        return None;
                    }
                    telemetry::l2_retry(call, key);
                    in_retry = true;
                }
            }
        }
    }
}

impl<C: DistributedCache + 'static> TokenCacheStore for DistributedTokenCache<C> {
    async fn read_bytes(&self, key: &str, hints: &CacheHints) -> Result<Option<Vec<u8>>> {
        hints
            .cancellable(Operation::Read, async { Ok(self.read_levels(key, hints).await) })
            .await
    }

    async fn write_bytes(&self, key: &str, bytes: Vec<u8>, hints: &CacheHints) -> Result<()> {
        hints
            .cancellable(Operation::Write, async {
                self.write_levels(key, bytes, hints).await;
                Ok(())
            })
            .await
    }

    async fn remove_key(&self, key: &str, hints: &CacheHints) -> Result<()> {
        hints
            .cancellable(Operation::Remove, async {
                self.remove_levels(key).await;
                Ok(())
            })
            .await
    }
}

fn earliest(first: Option<SystemTime>, second: Option<SystemTime>) -> Option<SystemTime> {
    match (first, second) {
        (Some(first), Some(second)) => Some(first.min(second)),
        (first, second) => first.or(second),
    }
}
