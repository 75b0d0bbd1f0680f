// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default lifetime of a cached partition.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Options for [`MemoryTokenCache`](crate::MemoryTokenCache).
///
/// With the `serde` feature the options can be read from a configuration file; missing
/// fields keep their defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use token_cache_memory::MemoryTokenCacheOptions;
///
/// let options = MemoryTokenCacheOptions::default()
///     .absolute_expiration_relative_to_now(Duration::from_secs(3600))
///     .size_limit_bytes(64 * 1024 * 1024);
///
/// assert_eq!(options.expiration(), Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct MemoryTokenCacheOptions {
    absolute_expiration_relative_to_now: Duration,
    size_limit_bytes: Option<u64>,
}

impl Default for MemoryTokenCacheOptions {
    fn default() -> Self {
        Self {
            absolute_expiration_relative_to_now: DEFAULT_EXPIRATION,
            size_limit_bytes: None,
        }
    }
}

impl MemoryTokenCacheOptions {
    /// Sets how long a partition stays cached after it was written.
    ///
    /// A shorter suggested expiry carried by the cache hints takes precedence.
    #[must_use]
    pub fn absolute_expiration_relative_to_now(mut self, expiration: Duration) -> Self {
        self.absolute_expiration_relative_to_now = expiration;
        self
    }

    /// Caps the total size of cached partitions, in bytes.
    #[must_use]
    pub fn size_limit_bytes(mut self, limit: u64) -> Self {
        self.size_limit_bytes = Some(limit);
        self
    }

    /// Returns the configured lifetime of a cached partition.
    #[must_use]
    pub fn expiration(&self) -> Duration {
        self.absolute_expiration_relative_to_now
    }

    /// Returns the configured size cap, if any.
    #[must_use]
    pub fn size_limit(&self) -> Option<u64> {
        self.size_limit_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_fourteen_days_unbounded() {
        let options = MemoryTokenCacheOptions::default();
        assert_eq!(options.expiration(), Duration::from_secs(1_209_600));
        assert_eq!(options.size_limit(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_configuration() {
        let options: MemoryTokenCacheOptions = serde_json::from_str(r#"{ "size_limit_bytes": 1024 }"#).unwrap();
        assert_eq!(options.size_limit(), Some(1024));
        assert_eq!(options.expiration(), DEFAULT_EXPIRATION);
    }
}
