// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The trait implemented by backing stores.
//!
//! [`TokenCacheStore`] is the single contract between the provider and persistence. A store
//! implements the three hints-aware operations; the hints-less forms are provided and pass
//! [`CacheHints::default()`] along.

use crate::{CacheHints, Result};

/// Persists one opaque blob per partition key.
///
/// Stores must honor the cancellation token in the hints they receive. They are free to
/// ignore the other hints.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Mutex;
///
/// use token_cache::{CacheHints, Error, Result, TokenCacheStore};
///
/// #[derive(Default)]
/// struct MapStore(Mutex<HashMap<String, Vec<u8>>>);
///
/// impl TokenCacheStore for MapStore {
///     async fn read_bytes(&self, key: &str, _hints: &CacheHints) -> Result<Option<Vec<u8>>> {
///         let map = self.0.lock().map_err(|e| Error::read(e.to_string()))?;
///         Ok(map.get(key).cloned())
///     }
///
///     async fn write_bytes(&self, key: &str, bytes: Vec<u8>, _hints: &CacheHints) -> Result<()> {
///         let mut map = self.0.lock().map_err(|e| Error::write(e.to_string()))?;
///         map.insert(key.to_owned(), bytes);
///         Ok(())
///     }
///
///     async fn remove_key(&self, key: &str, _hints: &CacheHints) -> Result<()> {
///         let mut map = self.0.lock().map_err(|e| Error::remove(e.to_string()))?;
///         map.remove(key);
///         Ok(())
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let store = MapStore::default();
/// store.write("A", vec![1, 2]).await?;
/// assert_eq!(store.read("A").await?, Some(vec![1, 2]));
/// store.remove("A").await?;
/// assert_eq!(store.read("A").await?, None);
/// # Ok::<(), Error>(())
/// # }).unwrap();
/// ```
pub trait TokenCacheStore: Send + Sync {
    /// Reads the blob stored under `key`, or `None` if there is none.
    fn read_bytes(&self, key: &str, hints: &CacheHints) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Stores `bytes` under `key`, replacing any previous blob.
    fn write_bytes(&self, key: &str, bytes: Vec<u8>, hints: &CacheHints) -> impl Future<Output = Result<()>> + Send;

    /// Deletes the blob stored under `key`. Removing a missing key succeeds.
    fn remove_key(&self, key: &str, hints: &CacheHints) -> impl Future<Output = Result<()>> + Send;

    /// Reads the blob stored under `key` with empty hints.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send {
        async move { self.read_bytes(key, &CacheHints::default()).await }
    }

    /// Stores `bytes` under `key` with empty hints.
    fn write(&self, key: &str, bytes: Vec<u8>) -> impl Future<Output = Result<()>> + Send {
        async move { self.write_bytes(key, bytes, &CacheHints::default()).await }
    }

    /// Deletes the blob stored under `key` with empty hints.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        async move { self.remove_key(key, &CacheHints::default()).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockStore, StoreOp};

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn hintsless_forms_delegate_with_empty_hints() -> Result<()> {
        let store = MockStore::new();

        block_on(store.write("A", vec![1]))?;
        assert_eq!(block_on(store.read("A"))?, Some(vec![1]));
        block_on(store.remove("A"))?;

        assert_eq!(
            store.operations(),
            vec![
                StoreOp::Write {
                    key: "A".to_owned(),
                    bytes: vec![1],
                    expiry: None,
                },
                StoreOp::Read {
                    key: "A".to_owned(),
                    expiry: None,
                },
                StoreOp::Remove {
                    key: "A".to_owned(),
                    expiry: None,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn store_futures_are_send() {
        fn assert_send<T: Send>(_: T) {}

        let store = MockStore::new();
        assert_send(store.read("A"));
        assert_send(store.write("A", Vec::new()));
        assert_send(store.remove("A"));
    }
}
