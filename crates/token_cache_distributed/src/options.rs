// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use token_cache::Error;

use crate::OptionsError;

/// Default size cap of the in-memory level: 500 MB.
pub const DEFAULT_L1_SIZE_LIMIT: u64 = 500 * 1024 * 1024;

/// Decides whether a failed distributed cache operation is retried once.
pub type L2FailurePredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Options for [`DistributedTokenCache`](crate::DistributedTokenCache).
///
/// With the `serde` feature the options can be read from a configuration file; missing
/// fields keep their defaults. The failure predicate can only be set in code.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use token_cache_distributed::DistributedTokenCacheOptions;
///
/// let options = DistributedTokenCacheOptions::default()
///     .absolute_expiration_relative_to_now(Duration::from_secs(3600))
///     .l1_expiration_time_ratio(0.5)
///     .on_l2_failure(|error| !error.is_cancelled());
///
/// assert_eq!(options.l1_expiration(), Some(Duration::from_secs(1800)));
/// ```
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct DistributedTokenCacheOptions {
    disable_l1_cache: bool,
    l1_size_limit_bytes: u64,
    l1_expiration_time_ratio: f64,
    absolute_expiration: Option<SystemTime>,
    absolute_expiration_relative_to_now: Option<Duration>,
    sliding_expiration: Option<Duration>,
    enable_async_l2_write: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    on_l2_failure: Option<L2FailurePredicate>,
}

impl Default for DistributedTokenCacheOptions {
    fn default() -> Self {
        Self {
            disable_l1_cache: false,
            l1_size_limit_bytes: DEFAULT_L1_SIZE_LIMIT,
            l1_expiration_time_ratio: 1.0,
            absolute_expiration: None,
            absolute_expiration_relative_to_now: None,
            sliding_expiration: None,
            enable_async_l2_write: false,
            on_l2_failure: None,
        }
    }
}

impl fmt::Debug for DistributedTokenCacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedTokenCacheOptions")
            .field("disable_l1_cache", &self.disable_l1_cache)
            .field("l1_size_limit_bytes", &self.l1_size_limit_bytes)
            .field("l1_expiration_time_ratio", &self.l1_expiration_time_ratio)
            .field("absolute_expiration", &self.absolute_expiration)
            .field("absolute_expiration_relative_to_now", &self.absolute_expiration_relative_to_now)
            .field("sliding_expiration", &self.sliding_expiration)
            .field("enable_async_l2_write", &self.enable_async_l2_write)
            .field("on_l2_failure", &self.on_l2_failure.is_some())
            .finish()
    }
}

impl DistributedTokenCacheOptions {
    /// Turns off the in-memory level; every operation goes to the distributed cache.
    #[must_use]
    pub fn disable_l1_cache(mut self, disable: bool) -> Self {
        self.disable_l1_cache = disable;
        self
    }

    /// Caps the size of the in-memory level, in bytes.
    #[must_use]
    pub fn l1_size_limit_bytes(mut self, limit: u64) -> Self {
        self.l1_size_limit_bytes = limit;
        self
    }

    /// Sets the fraction of [`absolute_expiration_relative_to_now`](Self::absolute_expiration_relative_to_now)
    /// after which in-memory entries expire.
    ///
    /// Must be greater than 0 and at most 1 when a relative expiration is set.
    #[must_use]
    pub fn l1_expiration_time_ratio(mut self, ratio: f64) -> Self {
        self.l1_expiration_time_ratio = ratio;
        self
    }

    /// Sets the point in time at which distributed entries expire.
    #[must_use]
    pub fn absolute_expiration(mut self, at: SystemTime) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Sets the lifetime of distributed entries, counted from each write.
    #[must_use]
    pub fn absolute_expiration_relative_to_now(mut self, expiration: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(expiration);
        self
    }

    /// Sets the idle time after which distributed entries expire.
    #[must_use]
    pub fn sliding_expiration(mut self, expiration: Duration) -> Self {
        self.sliding_expiration = Some(expiration);
        self
    }

    /// Writes to the distributed cache in the background instead of awaiting them.
    ///
    /// Only takes effect while the in-memory level is enabled, and requires a spawner on the
    /// builder.
    #[must_use]
    pub fn enable_async_l2_write(mut self, enable: bool) -> Self {
        self.enable_async_l2_write = enable;
        self
    }

    /// Retries a failed distributed cache operation once when `predicate` returns `true`.
    #[must_use]
    pub fn on_l2_failure(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.on_l2_failure = Some(Arc::new(predicate));
        self
    }

    /// Returns `true` if the in-memory level is off.
    #[must_use]
    pub fn is_l1_disabled(&self) -> bool {
        self.disable_l1_cache
    }

    /// Returns the size cap of the in-memory level.
    #[must_use]
    pub fn l1_size_limit(&self) -> u64 {
        self.l1_size_limit_bytes
    }

    /// Returns the configured absolute expiration.
    #[must_use]
    pub fn absolute_expiration_at(&self) -> Option<SystemTime> {
        self.absolute_expiration
    }

    /// Returns the configured relative expiration.
    #[must_use]
    pub fn relative_expiration(&self) -> Option<Duration> {
        self.absolute_expiration_relative_to_now
    }

    /// Returns the configured sliding expiration.
    #[must_use]
    pub fn sliding_window(&self) -> Option<Duration> {
        self.sliding_expiration
    }

    /// Returns `true` if distributed writes run in the background.
    ///
    /// Background writes require the in-memory level, so this is `false` whenever it is
    /// disabled.
    #[must_use]
    pub fn writes_in_background(&self) -> bool {
        self.enable_async_l2_write && !self.disable_l1_cache
    }

    /// Returns the lifetime of in-memory entries derived from the relative expiration.
    #[must_use]
    pub fn l1_expiration(&self) -> Option<Duration> {
        self.absolute_expiration_relative_to_now
            .filter(|_| self.has_valid_ratio())
            .map(|relative| relative.mul_f64(self.l1_expiration_time_ratio))
    }

    /// Returns `true` if a failed operation should be retried.
    #[must_use]
    pub fn should_retry(&self, error: &Error) -> bool {
        self.on_l2_failure.as_ref().is_some_and(|predicate| predicate(error))
    }

    /// Checks that the options are consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if a relative expiration is set and the L1 expiration time ratio is
    /// not within (0, 1].
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.absolute_expiration_relative_to_now.is_some() && !self.has_valid_ratio() {
            return Err(OptionsError::caused_by(format!(
                "l1 expiration time ratio must be greater than 0 and at most 1, got {}",
                self.l1_expiration_time_ratio
            )));
        }
        Ok(())
    }

    fn has_valid_ratio(&self) -> bool {
        self.l1_expiration_time_ratio > 0.0 && self.l1_expiration_time_ratio <= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = DistributedTokenCacheOptions::default();
        assert!(!options.is_l1_disabled());
        assert_eq!(options.l1_size_limit(), 524_288_000);
        assert_eq!(options.l1_expiration(), None);
        assert!(!options.writes_in_background());
        assert!(!options.should_retry(&Error::read("offline")));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn ratio_outside_range_is_rejected_with_relative_expiration() {
        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let options = DistributedTokenCacheOptions::default()
                .absolute_expiration_relative_to_now(Duration::from_secs(60))
                .l1_expiration_time_ratio(ratio);
            let error = options.validate().expect_err("ratio out of range");
            assert!(error.to_string().contains("l1 expiration time ratio"), "got: {error}");
        }
    }

    #[test]
    fn ratio_is_ignored_without_relative_expiration() {
        let options = DistributedTokenCacheOptions::default().l1_expiration_time_ratio(3.0);
        assert!(options.validate().is_ok());
        assert_eq!(options.l1_expiration(), None);
    }

    #[test]
    fn l1_expiration_scales_relative_expiration() {
        let options = DistributedTokenCacheOptions::default()
            .absolute_expiration_relative_to_now(Duration::from_secs(100))
            .l1_expiration_time_ratio(0.25);
        assert_eq!(options.l1_expiration(), Some(Duration::from_secs(25)));
    }

    #[test]
    fn background_writes_need_l1() {
        let options = DistributedTokenCacheOptions::default()
            .enable_async_l2_write(true)
            .disable_l1_cache(true);
        assert!(!options.writes_in_background());
    }

    #[test]
    fn retry_predicate_sees_the_error() {
        let options = DistributedTokenCacheOptions::default().on_l2_failure(|error| error.operation() == token_cache::Operation::Read);
        assert!(options.should_retry(&Error::read("timeout")));
        assert!(!options.should_retry(&Error::write("timeout")));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_configuration() {
        let options: DistributedTokenCacheOptions = serde_json::from_str(
            r#"{ "disable_l1_cache": true, "sliding_expiration": { "secs": 30, "nanos": 0 } }"#,
        )
        .unwrap();
        assert!(options.is_l1_disabled());
        assert_eq!(options.sliding_window(), Some(Duration::from_secs(30)));
        assert_eq!(options.l1_size_limit(), DEFAULT_L1_SIZE_LIMIT);
    }
}
