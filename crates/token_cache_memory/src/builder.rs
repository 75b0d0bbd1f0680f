// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::BytesCache;

/// Builder for [`BytesCache`].
#[derive(Debug, Clone, Default)]
pub struct BytesCacheBuilder {
    pub(crate) max_bytes: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) name: Option<String>,
}

impl BytesCacheBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Caps the total size of stored blobs, in bytes.
    ///
    /// Without a cap the cache only drops entries when they expire.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Pre-allocates room for `capacity` entries.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Names the cache for diagnostics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> BytesCache {
        BytesCache::from_builder(&self)
    }
}
