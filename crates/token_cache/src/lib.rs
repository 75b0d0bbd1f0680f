// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Persistence for an authentication library's in-memory token cache.
//!
//! An authentication library keeps acquired tokens in memory. This crate loads the relevant
//! partition of that collection from a backing store before each access and writes it back
//! afterwards, optionally encrypting what it persists.
//!
//! # Overview
//!
//! - [`TokenCacheProvider`] wires three lifecycle hooks into the host through
//!   [`HostTokenCache::wire`]. Before an access it reads, decrypts and loads the partition.
//!   After an access that changed the collection it serializes, encrypts and writes the
//!   partition, or removes it once no tokens remain.
//! - [`TokenCacheStore`] is the backing-store contract. Stores receive [`CacheHints`] carrying
//!   cancellation, the suggested expiry, and a telemetry sink.
//! - [`KeyProvider`] picks the partition key. [`SuggestedKey`] uses the host's suggestion.
//! - [`Encryptor`] protects persisted blobs. Blobs the encryptor cannot decrypt are loaded as
//!   plaintext, so encryption can be enabled on an existing store.
//! - [`SafeMode`] turns hook failures into logged warnings, keeping an unavailable store from
//!   failing authentication.
//! - [`MeasureExt`] times store calls against a [`tick::Clock`].
//!
//! # Strict and safe wiring
//!
//! [`TokenCacheProvider::initialize`] registers hooks whose failures reach the host.
//! [`TokenCacheProvider::initialize_safe`] registers the same hooks wrapped by [`SafeMode`];
//! a failing store then behaves like an empty one.
//!
//! # Features
//!
//! - `logs` (default): emits `tracing` events for loads, writes, removals and suppressed
//!   failures.
//! - `aes-gcm` (default): provides [`AesGcmEncryptor`].
//! - `test-util`: exposes the [`testing`] module with a recording store, a fake token
//!   collection, a fake host and a log capture helper.

mod error;
mod event;
mod hints;
mod host;
mod key;
mod measure;
mod protect;
mod provider;
mod safe;
mod store;
mod telemetry;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use error::{Error, Operation, Result};
#[doc(inline)]
pub use event::{AccessEvent, TokenCacheSerializer};
#[doc(inline)]
pub use hints::{CacheHints, CacheLevel, CacheTelemetryData};
#[doc(inline)]
pub use host::{AccessHook, AccessHooks, HookKind, HostTokenCache, access_hook};
#[doc(inline)]
pub use key::{KeyProvider, PrefixedKey, SuggestedKey};
#[doc(inline)]
pub use measure::{MeasureExt, Measured};
#[cfg(feature = "aes-gcm")]
#[doc(inline)]
pub use protect::AesGcmEncryptor;
#[doc(inline)]
pub use protect::{Encryptor, Protector};
#[doc(inline)]
pub use provider::{TokenCacheProvider, TokenCacheProviderBuilder, WriteLock};
#[doc(inline)]
pub use safe::{FailureObserver, HookFailure, SafeMode};
#[doc(inline)]
pub use store::TokenCacheStore;
#[doc(inline)]
pub use tokio_util::sync::CancellationToken;
