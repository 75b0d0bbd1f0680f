// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Concurrent byte-blob cache with per-entry expiry.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

use crate::builder::BytesCacheBuilder;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    time_to_live: Option<Duration>,
}

struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.time_to_live
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.time_to_live
    }
}

/// A concurrent cache of byte blobs keyed by string.
///
/// Every entry carries its own optional time-to-live. When built with a byte limit, entries are
/// weighed by their length and evicted once the total exceeds the limit.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use token_cache_memory::BytesCache;
///
/// # futures::executor::block_on(async {
/// let cache = BytesCache::builder().max_bytes(1024).build();
///
/// cache.insert("user", vec![1, 2, 3], Some(Duration::from_secs(60))).await;
/// assert_eq!(cache.get("user").await, Some(vec![1, 2, 3]));
///
/// cache.remove("user").await;
/// assert_eq!(cache.get("user").await, None);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BytesCache {
    inner: Cache<String, Entry>,
}

impl Default for BytesCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BytesCache {
    /// Creates an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the cache.
    #[must_use]
    pub fn builder() -> BytesCacheBuilder {
        BytesCacheBuilder::new()
    }

    pub(crate) fn from_builder(builder: &BytesCacheBuilder) -> Self {
        let mut moka_builder = Cache::builder().expire_after(PerEntryExpiry);

        if let Some(max_bytes) = builder.max_bytes {
            moka_builder = moka_builder
                .max_capacity(max_bytes)
                .weigher(|_key: &String, entry: &Entry| u32::try_from(entry.bytes.len()).unwrap_or(u32::MAX));
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }

    /// Returns the blob stored under `key`, unless it is missing or expired.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.map(|entry| entry.bytes)
    }

    /// Stores `bytes` under `key` for `time_to_live`.
    ///
    /// Without a time-to-live the entry stays until it is removed, replaced or evicted.
    pub async fn insert(&self, key: impl Into<String>, bytes: Vec<u8>, time_to_live: Option<Duration>) {
        self.inner.insert(key.into(), Entry { bytes, time_to_live }).await;
    }

    /// Removes the blob stored under `key`.
    pub async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Removes every blob.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Returns the approximate number of entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Returns the approximate total weight of the entries, in bytes when a byte limit is set.
    #[must_use]
    pub fn weighted_size(&self) -> u64 {
        self.inner.weighted_size()
    }

    /// Applies pending evictions and refreshes the counters.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}
