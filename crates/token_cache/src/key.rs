// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{AccessEvent, Result};

/// Maps an access to the partition key under which its tokens are persisted.
///
/// Implementations must be deterministic and free of I/O. An empty key tells the provider
/// there is nothing to load or persist for this access.
///
/// Any `Fn(&AccessEvent) -> String` closure is a key provider:
///
/// ```
/// use std::sync::Arc;
///
/// use token_cache::{AccessEvent, KeyProvider};
/// # use token_cache::{Result, TokenCacheSerializer};
/// # struct Empty;
/// # impl TokenCacheSerializer for Empty {
/// #     fn serialize(&self) -> Result<Vec<u8>> { Ok(Vec::new()) }
/// #     fn deserialize(&self, _: &[u8], _: bool) -> Result<()> { Ok(()) }
/// # }
///
/// let upper = |event: &AccessEvent| event.suggested_key().to_uppercase();
/// let event = AccessEvent::new(Arc::new(Empty), "tenant.user");
///
/// assert_eq!(upper.key(&event).unwrap(), "TENANT.USER");
/// ```
pub trait KeyProvider: Send + Sync + 'static {
    /// Returns the partition key for `event`.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be derived from the event.
    fn key(&self, event: &AccessEvent) -> Result<String>;
}

/// Uses the key the host suggests, unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestedKey;

impl KeyProvider for SuggestedKey {
    fn key(&self, event: &AccessEvent) -> Result<String> {
        Ok(event.suggested_key().to_owned())
    }
}

/// Places the suggested key under a fixed namespace, such as one per environment.
///
/// An empty suggested key stays empty.
#[derive(Debug, Clone)]
pub struct PrefixedKey {
    prefix: String,
}

impl PrefixedKey {
    /// Creates a provider that prepends `prefix` to every suggested key.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl KeyProvider for PrefixedKey {
    fn key(&self, event: &AccessEvent) -> Result<String> {
        let suggested = event.suggested_key();
        if suggested.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}{suggested}", self.prefix))
    }
}

impl<F> KeyProvider for F
where
    F: Fn(&AccessEvent) -> String + Send + Sync + 'static,
{
    fn key(&self, event: &AccessEvent) -> Result<String> {
        Ok(self(event))
    }
}
