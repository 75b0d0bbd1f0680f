// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for code built on top of the token cache.
//!
//! - [`MockStore`] is a recording [`TokenCacheStore`] with failure injection.
//! - [`MockTokenCache`] stands in for the host's token collection.
//! - [`MockHost`] keeps the hooks a provider wires and lets a test drive them.
//! - [`LogCapture`] collects formatted log output for assertions.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::{AccessEvent, AccessHooks, CacheHints, Error, HookKind, HostTokenCache, Result, TokenCacheSerializer, TokenCacheStore};

/// A store operation recorded by [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A read of `key`.
    Read {
        /// The key that was read.
        key: String,
        /// The suggested expiry carried by the hints.
        expiry: Option<SystemTime>,
    },
    /// A write of `bytes` under `key`.
    Write {
        /// The key that was written.
        key: String,
        /// The bytes that were written.
        bytes: Vec<u8>,
        /// The suggested expiry carried by the hints.
        expiry: Option<SystemTime>,
    },
    /// A removal of `key`.
    Remove {
        /// The key that was removed.
        key: String,
        /// The suggested expiry carried by the hints.
        expiry: Option<SystemTime>,
    },
}

impl StoreOp {
    /// Returns the key the operation targeted.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key, .. } | Self::Write { key, .. } | Self::Remove { key, .. } => key,
        }
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// An in-memory [`TokenCacheStore`] that records every operation.
///
/// Clones share their data, so a test can keep one clone while the provider owns another.
///
/// # Examples
///
/// ```
/// use token_cache::TokenCacheStore;
/// use token_cache::testing::{MockStore, StoreOp};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::new();
/// store.fail_when(|op| matches!(op, StoreOp::Write { .. }));
///
/// assert!(store.write("A", vec![1]).await.is_err());
/// assert!(store.read("A").await.unwrap().is_none());
/// assert_eq!(store.operations().len(), 2);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `bytes` under `key`.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store.data.lock().insert(key.into(), bytes);
        store
    }

    /// Sets a predicate that makes matching operations fail.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns the recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Clears the recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the bytes stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn record(&self, op: StoreOp) -> Result<()> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let error = fail.then(|| match &op {
            StoreOp::Read { .. } => Error::read("mock: read failed"),
            StoreOp::Write { .. } => Error::write("mock: write failed"),
            StoreOp::Remove { .. } => Error::remove("mock: remove failed"),
        });
        self.operations.lock().push(op);
        error.map_or(Ok(()), Err)
    }
}

impl TokenCacheStore for MockStore {
    async fn read_bytes(&self, key: &str, hints: &CacheHints) -> Result<Option<Vec<u8>>> {
        self.record(StoreOp::Read {
            key: key.to_owned(),
            expiry: hints.suggested_expiry(),
        })?;
        Ok(self.get(key))
    }

    async fn write_bytes(&self, key: &str, bytes: Vec<u8>, hints: &CacheHints) -> Result<()> {
        self.record(StoreOp::Write {
            key: key.to_owned(),
            bytes: bytes.clone(),
            expiry: hints.suggested_expiry(),
        })?;
        self.data.lock().insert(key.to_owned(), bytes);
        Ok(())
    }

    async fn remove_key(&self, key: &str, hints: &CacheHints) -> Result<()> {
        self.record(StoreOp::Remove {
            key: key.to_owned(),
            expiry: hints.suggested_expiry(),
        })?;
        self.data.lock().remove(key);
        Ok(())
    }
}

/// A stand-in for the host's token collection.
///
/// The collection's state is a plain byte vector: `serialize` returns it and `deserialize`
/// replaces it. Every load is recorded.
#[derive(Debug, Default)]
pub struct MockTokenCache {
    state: Mutex<Vec<u8>>,
    loads: Mutex<Vec<(Vec<u8>, bool)>>,
    fail_serialize: Mutex<bool>,
    reject_loads: Mutex<bool>,
}

impl MockTokenCache {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection whose serialized form is `state`.
    #[must_use]
    pub fn with_state(state: Vec<u8>) -> Self {
        let cache = Self::new();
        *cache.state.lock() = state;
        cache
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> Vec<u8> {
        self.state.lock().clone()
    }

    /// Replaces the current state, as the host would after acquiring tokens.
    pub fn set_state(&self, state: Vec<u8>) {
        *self.state.lock() = state;
    }

    /// Returns every `(bytes, clear_existing)` pair passed to `deserialize`.
    #[must_use]
    pub fn loads(&self) -> Vec<(Vec<u8>, bool)> {
        self.loads.lock().clone()
    }

    /// Makes `serialize` fail.
    pub fn fail_serialize(&self) {
        *self.fail_serialize.lock() = true;
    }

    /// Makes `deserialize` reject any non-empty input.
    pub fn reject_loads(&self) {
        *self.reject_loads.lock() = true;
    }
}

impl TokenCacheSerializer for MockTokenCache {
    fn serialize(&self) -> Result<Vec<u8>> {
        if *self.fail_serialize.lock() {
            return Err(Error::serialize("mock: serialize failed"));
        }
        Ok(self.state())
    }

    fn deserialize(&self, bytes: &[u8], clear_existing: bool) -> Result<()> {
        self.loads.lock().push((bytes.to_vec(), clear_existing));
        if *self.reject_loads.lock() && !bytes.is_empty() {
            return Err(Error::deserialize("mock: malformed cache"));
        }

        let mut state = self.state.lock();
        if clear_existing {
            state.clear();
        }
        state.extend_from_slice(bytes);
        Ok(())
    }
}

/// A host that keeps the hooks a provider wires.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    hooks: Arc<Mutex<Option<AccessHooks>>>,
}

impl MockHost {
    /// Creates a host with no hooks wired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once hooks are wired.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.hooks.lock().is_some()
    }

    /// Invokes the wired hook of the given kind.
    ///
    /// # Errors
    ///
    /// Returns the hook's error, or a [`Operation::Hook`](crate::Operation::Hook) error if
    /// nothing is wired.
    pub async fn invoke(&self, kind: HookKind, event: AccessEvent) -> Result<()> {
        let hooks = self.hooks.lock().clone();
        match hooks {
            Some(hooks) => hooks.invoke(kind, event).await,
            None => Err(Error::caused_by(crate::Operation::Hook, "no hooks wired")),
        }
    }
}

impl HostTokenCache for MockHost {
    fn wire(&self, hooks: AccessHooks) {
        *self.hooks.lock() = Some(hooks);
    }
}

/// Collects formatted log output for assertions.
///
/// Install [`LogCapture::subscriber`] with `tracing::subscriber::set_default` to capture the
/// events of the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured output.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }

    /// Asserts that the captured output contains `expected`.
    ///
    /// # Panics
    ///
    /// Panics if `expected` was not logged.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a subscriber that writes every event to this buffer.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Appends to a [`LogCapture`] buffer.
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn failed_operations_are_recorded() {
        let store = MockStore::with_entry("A", vec![1]);
        store.fail_when(|op| op.key() == "A");

        assert!(block_on(store.read("A")).is_err());
        assert!(block_on(store.remove("A")).is_err());
        assert_eq!(store.operations().len(), 2);
        assert_eq!(store.get("A"), Some(vec![1]));

        store.clear_failures();
        store.clear_operations();
        assert!(block_on(store.remove("A")).is_ok());
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.operations().len(), 1);
    }

    #[test]
    fn token_cache_records_loads() -> Result<()> {
        let cache = MockTokenCache::with_state(vec![9]);
        cache.deserialize(&[1, 2], true)?;
        assert_eq!(cache.state(), vec![1, 2]);
        cache.deserialize(&[3], false)?;
        assert_eq!(cache.serialize()?, vec![1, 2, 3]);
        assert_eq!(cache.loads(), vec![(vec![1, 2], true), (vec![3], false)]);
        Ok(())
    }

    #[test]
    fn rejecting_cache_accepts_empty_input() {
        let cache = MockTokenCache::new();
        cache.reject_loads();
        assert!(cache.deserialize(&[], true).is_ok());
        assert!(cache.deserialize(&[1], true).is_err());
    }

    #[test]
    fn unwired_host_fails_invocation() {
        let host = MockHost::new();
        assert!(!host.is_wired());
        let event = AccessEvent::new(Arc::new(MockTokenCache::new()), "A");
        assert!(block_on(host.invoke(HookKind::BeforeAccess, event)).is_err());
    }
}
