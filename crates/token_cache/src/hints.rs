// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Side-channel data passed to backing-store operations.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;

use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

use crate::{AccessEvent, Error, Operation, Result};

/// The cache level that served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CacheLevel {
    /// The entry was not found in any level.
    #[default]
    None,
    /// The entry was served from the in-process memory level.
    L1,
    /// The entry was served from the distributed level.
    L2,
}

impl CacheLevel {
    const fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::L1 => 1,
            Self::L2 => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::L1,
            2 => Self::L2,
            _ => Self::None,
        }
    }
}

/// A shared sink through which a backing store reports how a read was served.
///
/// Clones share the same underlying value, so the host can keep one clone and hand the other
/// to the store through [`CacheHints`].
#[derive(Debug, Clone, Default)]
pub struct CacheTelemetryData {
    level: Arc<AtomicU8>,
}

impl CacheTelemetryData {
    /// Creates a sink reporting [`CacheLevel::None`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the level that served the read.
    pub fn set_level(&self, level: CacheLevel) {
        self.level.store(level.to_u8(), Ordering::Relaxed);
    }

    /// Returns the last recorded level.
    #[must_use]
    pub fn level(&self) -> CacheLevel {
        CacheLevel::from_u8(self.level.load(Ordering::Relaxed))
    }
}

/// Hints handed to a backing store alongside each operation.
///
/// Hints are advisory. A store may use the suggested expiry to bound the lifetime of an entry,
/// report the serving level through the telemetry sink, and must stop work once the
/// cancellation token fires. `CacheHints::default()` carries no information at all and is what
/// the hints-less store operations pass along.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use token_cache::CacheHints;
///
/// let expiry = SystemTime::UNIX_EPOCH + Duration::from_secs(3600);
/// let hints = CacheHints::new().with_suggested_expiry(Some(expiry));
///
/// assert_eq!(hints.suggested_expiry(), Some(expiry));
/// assert!(!hints.cancellation().is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheHints {
    cancellation: CancellationToken,
    suggested_expiry: Option<SystemTime>,
    telemetry: Option<CacheTelemetryData>,
    disable_message: Option<String>,
}

impl CacheHints {
    /// Creates empty hints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the hints for a store call made on behalf of `event`.
    #[must_use]
    pub fn from_event(event: &AccessEvent) -> Self {
        Self {
            cancellation: event.cancellation().clone(),
            suggested_expiry: event.suggested_expiry(),
            telemetry: event.telemetry().cloned(),
            disable_message: event.no_distributed_cache_reason().map(ToOwned::to_owned),
        }
    }

    /// Sets the token that signals the operation should be abandoned.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Sets the point in time after which the cached data is no longer useful.
    #[must_use]
    pub fn with_suggested_expiry(mut self, suggested_expiry: Option<SystemTime>) -> Self {
        self.suggested_expiry = suggested_expiry;
        self
    }

    /// Sets the sink that receives the serving cache level.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CacheTelemetryData) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the advisory message explaining why this cache should not be used.
    #[must_use]
    pub fn with_disable_message(mut self, message: impl Into<String>) -> Self {
        self.disable_message = Some(message.into());
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the suggested expiry, if the host provided one.
    #[must_use]
    pub fn suggested_expiry(&self) -> Option<SystemTime> {
        self.suggested_expiry
    }

    /// Returns the telemetry sink, if any.
    #[must_use]
    pub fn telemetry(&self) -> Option<&CacheTelemetryData> {
        self.telemetry.as_ref()
    }

    /// Returns the advisory "do not use this cache" message, if any.
    #[must_use]
    pub fn disable_message(&self) -> Option<&str> {
        self.disable_message.as_deref()
    }

    /// Reports the serving level to the telemetry sink, if one is attached.
    pub fn report_level(&self, level: CacheLevel) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.set_level(level);
        }
    }

    /// Runs `future` until it completes or the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns the error of `future`, or a cancellation error for `during` if the token
    /// fires first. A token that is already cancelled fails without polling `future`.
    pub async fn cancellable<F, T>(&self, during: Operation, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(Error::cancelled(during));
        }

        let cancelled = pin!(self.cancellation.cancelled());
        let future = pin!(future);
        match select(future, cancelled).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(Error::cancelled(during)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn default_hints_are_empty() {
        let hints = CacheHints::default();
        assert!(hints.suggested_expiry().is_none());
        assert!(hints.telemetry().is_none());
        assert!(hints.disable_message().is_none());
        assert!(!hints.cancellation().is_cancelled());
    }

    #[test]
    fn telemetry_clones_share_level() {
        let telemetry = CacheTelemetryData::new();
        assert_eq!(telemetry.level(), CacheLevel::None);

        let hints = CacheHints::new().with_telemetry(telemetry.clone());
        hints.report_level(CacheLevel::L2);

        assert_eq!(telemetry.level(), CacheLevel::L2);
    }

    #[test]
    fn report_level_without_sink_is_noop() {
        CacheHints::new().report_level(CacheLevel::L1);
    }

    #[test]
    fn builders_set_fields() {
        let expiry = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let token = CancellationToken::new();
        let hints = CacheHints::new()
            .with_cancellation(token.clone())
            .with_suggested_expiry(Some(expiry))
            .with_disable_message("session cache only");

        token.cancel();
        assert!(hints.cancellation().is_cancelled());
        assert_eq!(hints.suggested_expiry(), Some(expiry));
        assert_eq!(hints.disable_message(), Some("session cache only"));
    }

    #[test]
    fn cancellable_passes_result_through() -> Result<()> {
        let value = block_on(CacheHints::new().cancellable(Operation::Read, async { Ok(7) }))?;
        assert_eq!(value, 7);
        Ok(())
    }

    #[test]
    fn cancellable_fails_fast_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let hints = CacheHints::new().with_cancellation(token);

        let error = block_on(hints.cancellable(Operation::Write, async { Ok(()) })).expect_err("cancelled");
        assert!(error.is_cancelled());
    }

    #[test]
    fn cancellable_stops_pending_future() {
        let token = CancellationToken::new();
        let hints = CacheHints::new().with_cancellation(token.clone());

        let error = block_on(hints.cancellable(Operation::Read, async {
            token.cancel();
            futures::future::pending::<Result<()>>().await
        }))
        .expect_err("cancelled");
        assert!(error.is_cancelled());
    }
}
