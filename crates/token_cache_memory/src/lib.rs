// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory backing store for [`token_cache`].
//!
//! [`MemoryTokenCache`] keeps serialized token cache partitions in a [`moka`]-backed
//! [`BytesCache`]. Each partition expires after the configured lifetime or at the suggested
//! expiry carried by the cache hints, whichever comes first. An optional byte limit bounds
//! the memory the store may use.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use tick::Clock;
//! use token_cache::TokenCacheProvider;
//! use token_cache_memory::{MemoryTokenCache, MemoryTokenCacheOptions};
//!
//! # fn example(clock: Clock) {
//! let options = MemoryTokenCacheOptions::default()
//!     .absolute_expiration_relative_to_now(Duration::from_secs(12 * 60 * 60))
//!     .size_limit_bytes(256 * 1024 * 1024);
//!
//! let provider = TokenCacheProvider::builder(MemoryTokenCache::with_options(options, clock)).build();
//! # let _ = provider;
//! # }
//! ```
//!
//! # Features
//!
//! - `logs` (default): emits `tracing` events for reads.
//! - `serde`: implements `serde::Deserialize` for [`MemoryTokenCacheOptions`].

mod builder;
mod bytes;
mod options;
mod store;

#[doc(inline)]
pub use builder::BytesCacheBuilder;
#[doc(inline)]
pub use bytes::BytesCache;
#[doc(inline)]
pub use options::{DEFAULT_EXPIRATION, MemoryTokenCacheOptions};
#[doc(inline)]
pub use store::MemoryTokenCache;
