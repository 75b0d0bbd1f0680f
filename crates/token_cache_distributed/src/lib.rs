// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Two-level backing store for [`token_cache`]: memory in front of a distributed cache.
//!
//! [`DistributedTokenCache`] keeps recently used token cache partitions in an in-memory
//! level (L1) and persists every partition to a [`DistributedCache`] shared by all instances
//! of a service (L2). The distributed cache is a small trait so that any key-value service
//! can back it.
//!
//! # Reads, writes and removals
//!
//! - Reads are served from L1 when possible. Partitions found only in L2 are copied into L1
//!   for a fraction of their L2 lifetime, set by
//!   [`l1_expiration_time_ratio`](DistributedTokenCacheOptions::l1_expiration_time_ratio).
//! - Writes update L1 and then L2. With
//!   [`enable_async_l2_write`](DistributedTokenCacheOptions::enable_async_l2_write) the L2 write
//!   runs in the background on an [`anyspawn::Spawner`].
//! - Removals clear both levels.
//!
//! # Failures
//!
//! An unavailable distributed cache behaves like an empty one. Failures are logged at error
//! level and, when [`on_l2_failure`](DistributedTokenCacheOptions::on_l2_failure) returns
//! `true`, the call is retried once.
//!
//! # Features
//!
//! - `logs` (default): emits `tracing` events for both levels.
//! - `serde`: implements `serde::Deserialize` for [`DistributedTokenCacheOptions`].
//! - `tokio`: enables `Spawner::new_tokio`.
//! - `test-util`: exposes the [`testing`] module with a recording distributed cache.

mod builder;
mod cache;
mod error;
mod options;
mod store;
mod telemetry;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use anyspawn::Spawner;
#[doc(inline)]
pub use builder::DistributedTokenCacheBuilder;
#[doc(inline)]
pub use cache::{DistributedCache, DistributedEntryOptions};
#[doc(inline)]
pub use error::OptionsError;
#[doc(inline)]
pub use options::{DEFAULT_L1_SIZE_LIMIT, DistributedTokenCacheOptions, L2FailurePredicate};
#[doc(inline)]
pub use store::DistributedTokenCache;
