// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for the distributed cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use token_cache::{Error, Result};

use crate::{DistributedCache, DistributedEntryOptions};

/// An operation recorded by [`MockDistributedCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2Op {
    /// A read of `key`.
    Get(String),
    /// A write of `bytes` under `key`.
    Set {
        /// The key that was written.
        key: String,
        /// The bytes that were written.
        bytes: Vec<u8>,
        /// The expiration settings of the write.
        options: DistributedEntryOptions,
    },
    /// A sliding-expiration refresh of `key`.
    Refresh(String),
    /// A removal of `key`.
    Remove(String),
}

impl L2Op {
    /// Returns the key the operation targeted.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get(key) | Self::Refresh(key) | Self::Remove(key) | Self::Set { key, .. } => key,
        }
    }
}

type FailPredicate = Box<dyn Fn(&L2Op) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    data: HashMap<String, Vec<u8>>,
    operations: Vec<L2Op>,
    fail_when: Option<FailPredicate>,
    fail_next: usize,
}

/// An in-memory [`DistributedCache`] that records every operation.
///
/// Failures are injected either for every operation matching a predicate or for the next
/// few operations. Clones share their state.
///
/// # Examples
///
/// ```
/// use token_cache_distributed::DistributedCache;
/// use token_cache_distributed::testing::{L2Op, MockDistributedCache};
///
/// # futures::executor::block_on(async {
/// let l2 = MockDistributedCache::with_entry("A", vec![1]);
/// l2.fail_next(1);
///
/// assert!(l2.get("A").await.is_err());
/// assert_eq!(l2.get("A").await.unwrap(), Some(vec![1]));
/// assert_eq!(l2.operations(), vec![L2Op::Get("A".into()), L2Op::Get("A".into())]);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockDistributedCache {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MockDistributedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDistributedCache")
            .field("data", &state.data)
            .field("operations", &state.operations)
            .field("fail_when", &state.fail_when.is_some())
            .field("fail_next", &state.fail_next)
            .finish()
    }
}

impl MockDistributedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache holding `bytes` under `key`.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        let cache = Self::new();
        cache.state.lock().data.insert(key.into(), bytes);
        cache
    }

    /// Makes every operation matching `predicate` fail.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&L2Op) -> bool + Send + Sync + 'static,
    {
        self.state.lock().fail_when = Some(Box::new(predicate));
    }

    /// Makes the next `count` operations fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Clears every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_when = None;
        state.fail_next = 0;
    }

    /// Returns the recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<L2Op> {
        self.state.lock().operations.clone()
    }

    /// Clears the recorded operations.
    pub fn clear_operations(&self) {
        self.state.lock().operations.clear();
    }

    /// Returns the bytes stored under `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().data.get(key).cloned()
    }

    fn record(&self, op: L2Op) -> Result<()> {
        let mut state = self.state.lock();
        let mut fail = state.fail_when.as_ref().is_some_and(|predicate| predicate(&op));
        if state.fail_next > 0 {
            state.fail_next -= 1;
            fail = true;
        }

        let error = fail.then(|| match &op {
            L2Op::Get(_) | L2Op::Refresh(_) => Error::read("mock: l2 read failed"),
            L2Op::Set { .. } => Error::write("mock: l2 write failed"),
            L2Op::Remove(_) => Error::remove("mock: l2 remove failed"),
        });
        state.operations.push(op);
        error.map_or(Ok(()), Err)
    }
}

impl DistributedCache for MockDistributedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.record(L2Op::Get(key.to_owned()))?;
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: &[u8], options: &DistributedEntryOptions) -> Result<()> {
        self.record(L2Op::Set {
            key: key.to_owned(),
            bytes: value.to_vec(),
            options: *options,
        })?;
        self.state.lock().data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<()> {
        self.record(L2Op::Refresh(key.to_owned()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.record(L2Op::Remove(key.to_owned()))?;
        self.state.lock().data.remove(key);
        Ok(())
    }
}
