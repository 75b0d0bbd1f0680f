// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Timing of asynchronous operations.

use std::time::Duration;

use tick::Clock;

const NANOS_PER_TICK: u128 = 100;

/// The output of a measured future together with how long it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measured<T> {
    /// The output of the future.
    pub result: T,
    /// The elapsed time between the first poll and completion.
    pub duration: Duration,
}

impl<T> Measured<T> {
    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn millis(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }

    /// Returns the elapsed time in ticks of 100 nanoseconds.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        u64::try_from(self.duration.as_nanos() / NANOS_PER_TICK).unwrap_or(u64::MAX)
    }

    /// Discards the timing and returns the output.
    pub fn into_result(self) -> T {
        self.result
    }
}

/// Extension trait that measures how long a future takes to complete.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tick::ClockControl;
/// use token_cache::MeasureExt;
///
/// # futures::executor::block_on(async {
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let measured = async {
///     control.advance(Duration::from_millis(5));
///     "done"
/// }
/// .measure(&clock)
/// .await;
///
/// assert_eq!(measured.result, "done");
/// assert_eq!(measured.millis(), 5.0);
/// # });
/// ```
pub trait MeasureExt: Future + Sized {
    /// Runs the future to completion and records the elapsed time on `clock`.
    fn measure(self, clock: &Clock) -> impl Future<Output = Measured<Self::Output>>;
}

impl<F: Future> MeasureExt for F {
    async fn measure(self, clock: &Clock) -> Measured<F::Output> {
        let stopwatch = clock.stopwatch();
        let result = self.await;
        Measured {
            result,
            duration: stopwatch.elapsed(),
        }
    }
}
