// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Log events emitted by the provider.

#![cfg_attr(
    not(any(feature = "logs", test)),
    allow(unused_variables, reason = "events compile to nothing without the logs feature")
)]

use crate::{Error, HookKind};

pub(crate) fn partition_loaded(key: &str, len: usize, app_cache: bool) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.loaded",
        tracing::Level::DEBUG,
        cache.key = key,
        cache.bytes = len,
        cache.app_cache = app_cache,
    );
}

pub(crate) fn partition_persisted(key: &str, len: usize, app_cache: bool) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.persisted",
        tracing::Level::DEBUG,
        cache.key = key,
        cache.bytes = len,
        cache.app_cache = app_cache,
    );
}

pub(crate) fn partition_removed(key: &str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.removed",
        tracing::Level::DEBUG,
        cache.key = key,
    );
}

pub(crate) fn decrypt_fallback(error: &Error) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.decrypt_fallback",
        tracing::Level::DEBUG,
        error = %error,
        "payload could not be decrypted, treating it as plaintext",
    );
}

pub(crate) fn deserialize_failed(key: &str, encryption_enabled: bool, error: &Error) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.deserialize_failed",
        tracing::Level::ERROR,
        cache.key = key,
        cache.encryption_enabled = encryption_enabled,
        error = %error,
    );
}

pub(crate) fn failure_suppressed(hook: HookKind, error: &Error) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.failure_suppressed",
        tracing::Level::WARN,
        cache.hook = %hook,
        error = %error,
    );
}

pub(crate) fn observer_panicked(hook: HookKind, message: &str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: "token_cache.observer_panicked",
        tracing::Level::WARN,
        cache.hook = %hook,
        error = message,
    );
}
