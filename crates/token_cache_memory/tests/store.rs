// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memory store driven by a token cache provider.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tick::ClockControl;
use token_cache::testing::{MockHost, MockTokenCache};
use token_cache::{AccessEvent, CacheLevel, CacheTelemetryData, HookKind, Result, TokenCacheProvider, TokenCacheStore};
use token_cache_memory::{MemoryTokenCache, MemoryTokenCacheOptions};

fn block_on<F: Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn start() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

#[test]
fn partition_survives_between_accesses() -> Result<()> {
    block_on(async {
        let clock = ClockControl::new_at(start()).to_clock();
        let store = MemoryTokenCache::new(clock);
        let host = MockHost::new();
        TokenCacheProvider::builder(store.clone()).build().initialize(&host);

        let first = Arc::new(MockTokenCache::with_state(vec![7, 8, 9]));
        host.invoke(
            HookKind::AfterAccess,
            AccessEvent::new(first, "user1").with_state_changed(true).with_tokens(true),
        )
        .await?;
        assert_eq!(store.read("user1").await?, Some(vec![7, 8, 9]));

        let second = Arc::new(MockTokenCache::new());
        let telemetry = CacheTelemetryData::new();
        host.invoke(
            HookKind::BeforeAccess,
            AccessEvent::new(Arc::clone(&second) as _, "user1").with_telemetry(telemetry.clone()),
        )
        .await?;

        assert_eq!(second.state(), vec![7, 8, 9]);
        assert_eq!(telemetry.level(), CacheLevel::L1);
        Ok(())
    })
}

#[test]
fn suggested_expiry_shortens_partition_lifetime() -> Result<()> {
    block_on(async {
        let clock = ClockControl::new_at(start()).to_clock();
        let options = MemoryTokenCacheOptions::default().absolute_expiration_relative_to_now(Duration::from_secs(3600));
        let store = MemoryTokenCache::with_options(options, clock);
        let host = MockHost::new();
        TokenCacheProvider::builder(store.clone()).build().initialize(&host);

        let tokens = Arc::new(MockTokenCache::with_state(vec![1]));
        host.invoke(
            HookKind::AfterAccess,
            AccessEvent::new(tokens, "user1")
                .with_state_changed(true)
                .with_tokens(true)
                .with_suggested_expiry(Some(start() - Duration::from_secs(1))),
        )
        .await?;
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(store.read("user1").await?, None);
        Ok(())
    })
}

#[test]
fn sign_out_removes_partition_from_memory() -> Result<()> {
    block_on(async {
        let store = MemoryTokenCache::new(ClockControl::new_at(start()).to_clock());
        store.write("user1", vec![1]).await?;
        let host = MockHost::new();
        TokenCacheProvider::builder(store.clone()).build().initialize(&host);

        host.invoke(
            HookKind::AfterAccess,
            AccessEvent::new(Arc::new(MockTokenCache::new()), "user1")
                .with_state_changed(true)
                .with_tokens(false),
        )
        .await?;

        assert_eq!(store.read("user1").await?, None);
        Ok(())
    })
}
