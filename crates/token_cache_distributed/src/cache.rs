// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The distributed (L2) cache contract.

use std::time::{Duration, SystemTime};

use token_cache::Result;

/// Expiration settings attached to an entry written to a [`DistributedCache`].
///
/// When several settings are present the entry expires at whichever deadline comes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributedEntryOptions {
    /// Point in time at which the entry expires.
    pub absolute_expiration: Option<SystemTime>,
    /// Lifetime of the entry, counted from the write.
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Idle time after which the entry expires; reads and refreshes reset it.
    pub sliding_expiration: Option<Duration>,
}

/// A cache shared by all instances of a service, such as Redis or a SQL table.
///
/// Implementations report failures through [`token_cache::Error`], typically built with
/// [`Error::read`](token_cache::Error::read), [`Error::write`](token_cache::Error::write) or
/// [`Error::remove`](token_cache::Error::remove).
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Mutex;
///
/// use token_cache::Result;
/// use token_cache_distributed::{DistributedCache, DistributedEntryOptions};
///
/// #[derive(Default)]
/// struct MapCache(Mutex<HashMap<String, Vec<u8>>>);
///
/// impl DistributedCache for MapCache {
///     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
///         Ok(self.0.lock().unwrap().get(key).cloned())
///     }
///
///     async fn set(&self, key: &str, value: &[u8], _options: &DistributedEntryOptions) -> Result<()> {
///         self.0.lock().unwrap().insert(key.to_owned(), value.to_vec());
///         Ok(())
///     }
///
///     async fn refresh(&self, _key: &str) -> Result<()> {
///         Ok(())
///     }
///
///     async fn remove(&self, key: &str) -> Result<()> {
///         self.0.lock().unwrap().remove(key);
///         Ok(())
///     }
/// }
/// ```
pub trait DistributedCache: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &[u8], options: &DistributedEntryOptions) -> impl Future<Output = Result<()>> + Send;

    /// Resets the sliding expiration of `key` without reading its value.
    fn refresh(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
