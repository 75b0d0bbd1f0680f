// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyspawn::Spawner;
use tick::Clock;

use crate::{DistributedCache, DistributedTokenCache, DistributedTokenCacheOptions, OptionsError};

/// Builder for [`DistributedTokenCache`].
#[derive(Debug)]
pub struct DistributedTokenCacheBuilder<C> {
    pub(crate) l2: C,
    pub(crate) clock: Clock,
    pub(crate) options: DistributedTokenCacheOptions,
    pub(crate) spawner: Option<Spawner>,
}

impl<C: DistributedCache + 'static> DistributedTokenCacheBuilder<C> {
    pub(crate) fn new(l2: C, clock: Clock) -> Self {
        Self {
            l2,
            clock,
            options: DistributedTokenCacheOptions::default(),
            spawner: None,
        }
    }

    /// Replaces the default options.
    #[must_use]
    pub fn options(mut self, options: DistributedTokenCacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the spawner that runs background writes to the distributed cache.
    #[must_use]
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are inconsistent, or if background writes are enabled
    /// without a spawner.
    pub fn build(self) -> Result<DistributedTokenCache<C>, OptionsError> {
        self.options.validate()?;
        if self.options.writes_in_background() && self.spawner.is_none() {
            return Err(OptionsError::caused_by("background l2 writes require a spawner"));
        }
        Ok(DistributedTokenCache::from_builder(self))
    }
}
