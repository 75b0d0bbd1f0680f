// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Log events emitted by the two-level store.

#![cfg_attr(
    not(any(feature = "logs", test)),
    allow(unused_variables, reason = "events compile to nothing without the logs feature")
)]

use token_cache::Error;

/// A distributed cache call, as named in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum L2Call {
    Read,
    Write,
    Refresh,
    Remove,
}

impl L2Call {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Refresh => "refresh",
            Self::Remove => "remove",
        }
    }
}

pub(crate) fn l1_access(operation: &'static str, key: &str, len: usize, entries: u64) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l1.access",
        tracing::Level::DEBUG,
        cache.operation = operation,
        cache.key = key,
        cache.bytes = len,
        cache.entries = entries,
    );
}

pub(crate) fn l1_removed(key: &str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l1.removed",
        tracing::Level::DEBUG,
        cache.key = key,
    );
}

pub(crate) fn l2_state(call: L2Call, key: &str, len: usize, in_retry: bool, millis: f64) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l2.state",
        tracing::Level::DEBUG,
        cache.operation = call.as_str(),
        cache.key = key,
        cache.bytes = len,
        cache.retry = in_retry,
        cache.duration_ms = millis,
    );
}

pub(crate) fn l2_read_time(millis: f64) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l2.read_time",
        tracing::Level::DEBUG,
        cache.duration_ms = millis,
    );
}

pub(crate) fn back_propagated(key: &str, len: usize) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l2.back_propagated",
        tracing::Level::DEBUG,
        cache.key = key,
        cache.bytes = len,
    );
}

pub(crate) fn l2_failed(call: L2Call, in_retry: bool, error: &Error) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l2.failed",
        tracing::Level::ERROR,
        cache.operation = call.as_str(),
        cache.retry = in_retry,
        error = %error,
    );
}

pub(crate) fn l2_retry(call: L2Call, key: &str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.l2.retry",
        tracing::Level::DEBUG,
        cache.operation = call.as_str(),
        cache.key = key,
    );
}
