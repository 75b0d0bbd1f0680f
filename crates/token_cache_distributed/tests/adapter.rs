// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The two-level store driven by a token cache provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;
use token_cache::testing::{MockHost, MockTokenCache};
use token_cache::{AccessEvent, CacheLevel, CacheTelemetryData, Error, HookKind, Result, TokenCacheProvider, TokenCacheStore};
use token_cache_distributed::{DistributedCache, DistributedEntryOptions, DistributedTokenCache, DistributedTokenCacheOptions, Spawner};

#[derive(Clone, Default)]
struct SharedCache {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    offline: Arc<Mutex<bool>>,
}

impl SharedCache {
    fn check(&self) -> Result<()> {
        if *self.offline.lock() {
            return Err(Error::read("connection refused"));
        }
        Ok(())
    }
}

impl DistributedCache for SharedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], _options: &DistributedEntryOptions) -> Result<()> {
        self.check()?;
        self.data.lock().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn refresh(&self, _key: &str) -> Result<()> {
        self.check()
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.data.lock().remove(key);
        Ok(())
    }
}

fn changed(tokens: &Arc<MockTokenCache>, key: &str) -> AccessEvent {
    AccessEvent::new(Arc::clone(tokens) as _, key)
        .with_state_changed(true)
        .with_tokens(true)
}

#[test]
fn instances_share_partitions_through_l2() -> Result<()> {
    futures::executor::block_on(async {
        let shared = SharedCache::default();
        let clock = Clock::new_frozen();

        let first_host = MockHost::new();
        let first = DistributedTokenCache::builder(shared.clone(), clock.clone())
            .build()
            .expect("valid options");
        TokenCacheProvider::builder(first).build().initialize(&first_host);

        let second_host = MockHost::new();
        let second = DistributedTokenCache::builder(shared.clone(), clock)
            .build()
            .expect("valid options");
        TokenCacheProvider::builder(second).build().initialize(&second_host);

        let written = Arc::new(MockTokenCache::with_state(vec![1, 2, 3]));
        first_host.invoke(HookKind::AfterAccess, changed(&written, "user1")).await?;

        let loaded = Arc::new(MockTokenCache::new());
        let telemetry = CacheTelemetryData::new();
        second_host
            .invoke(
                HookKind::BeforeAccess,
                AccessEvent::new(Arc::clone(&loaded) as _, "user1").with_telemetry(telemetry.clone()),
            )
            .await?;

        assert_eq!(loaded.state(), vec![1, 2, 3]);
        assert_eq!(telemetry.level(), CacheLevel::L2);
        Ok(())
    })
}

#[test]
fn offline_l2_still_serves_l1() -> Result<()> {
    futures::executor::block_on(async {
        let shared = SharedCache::default();
        let store = DistributedTokenCache::builder(shared.clone(), Clock::new_frozen())
            .options(DistributedTokenCacheOptions::default().on_l2_failure(|_| true))
            .build()
            .expect("valid options");

        store.write("user1", vec![9]).await?;
        *shared.offline.lock() = true;

        assert_eq!(store.read("user1").await?, Some(vec![9]));
        assert_eq!(store.read("user2").await?, None);
        Ok(())
    })
}

#[tokio::test]
async fn background_write_lands_on_tokio() -> Result<()> {
    let shared = SharedCache::default();
    let store = DistributedTokenCache::builder(shared.clone(), Clock::new_frozen())
        .options(
            DistributedTokenCacheOptions::default()
                .enable_async_l2_write(true)
                .absolute_expiration_relative_to_now(Duration::from_secs(3600)),
        )
        .spawner(Spawner::new_tokio())
        .build()
        .expect("valid options");

    store.write("user1", vec![5]).await?;

    for _ in 0..100 {
        if shared.data.lock().contains_key("user1") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(shared.data.lock().get("user1"), Some(&vec![5]));
    Ok(())
}
