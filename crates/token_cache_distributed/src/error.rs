// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Invalid [`DistributedTokenCacheOptions`](crate::DistributedTokenCacheOptions).
///
/// Returned by [`DistributedTokenCacheBuilder::build`](crate::DistributedTokenCacheBuilder::build)
/// when the options contradict each other.
#[ohno::error]
pub struct OptionsError {}
