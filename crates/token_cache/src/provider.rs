// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The provider that connects a host's token collection to a backing store.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::safe::FailureObserver;
use crate::{
    AccessEvent, AccessHooks, CacheHints, Encryptor, HookFailure, HostTokenCache, KeyProvider, Protector, Result, SafeMode,
    SuggestedKey, TokenCacheStore, access_hook, telemetry,
};

/// Serializes writers of the same partition across processes.
///
/// The provider acquires the lock from the before-write hook and releases it at the end of the
/// after-access hook. Because the after-access hook also runs for reads, `unlock` may be called
/// for a key that is not held and must succeed in that case.
pub trait WriteLock: Send + Sync {
    /// Acquires the lock for `key`.
    fn lock<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Releases the lock for `key`, if held.
    fn unlock<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Loads a partition of the host's token collection before each access and persists it after.
///
/// The provider is stateless: all per-access data travels in the [`AccessEvent`]. Clones share
/// the same store and configuration.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use token_cache::{AccessEvent, AccessHooks, HostTokenCache, TokenCacheProvider, TokenCacheStore};
/// # use token_cache::{CacheHints, Result, TokenCacheSerializer};
/// # struct OneEntry;
/// # impl TokenCacheStore for OneEntry {
/// #     async fn read_bytes(&self, _: &str, _: &CacheHints) -> Result<Option<Vec<u8>>> { Ok(Some(vec![1, 2])) }
/// #     async fn write_bytes(&self, _: &str, _: Vec<u8>, _: &CacheHints) -> Result<()> { Ok(()) }
/// #     async fn remove_key(&self, _: &str, _: &CacheHints) -> Result<()> { Ok(()) }
/// # }
/// # #[derive(Default)]
/// # struct Tokens(Mutex<Vec<u8>>);
/// # impl TokenCacheSerializer for Tokens {
/// #     fn serialize(&self) -> Result<Vec<u8>> { Ok(self.0.lock().unwrap().clone()) }
/// #     fn deserialize(&self, bytes: &[u8], _: bool) -> Result<()> { *self.0.lock().unwrap() = bytes.to_vec(); Ok(()) }
/// # }
///
/// #[derive(Default)]
/// struct Host(Mutex<Option<AccessHooks>>);
///
/// impl HostTokenCache for Host {
///     fn wire(&self, hooks: AccessHooks) {
///         *self.0.lock().unwrap() = Some(hooks);
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let provider = TokenCacheProvider::builder(OneEntry).build();
/// let host = Host::default();
/// provider.initialize(&host);
///
/// let hooks = host.0.lock().unwrap().clone().unwrap();
/// let tokens = Arc::new(Tokens::default());
/// (hooks.before_access)(AccessEvent::new(tokens.clone(), "user")).await?;
/// assert_eq!(*tokens.0.lock().unwrap(), vec![1, 2]);
/// # Ok::<(), token_cache::Error>(())
/// # }).unwrap();
/// ```
pub struct TokenCacheProvider<S, K = SuggestedKey> {
    inner: Arc<Inner<S, K>>,
}

struct Inner<S, K> {
    store: S,
    key_provider: K,
    protector: Protector,
    write_lock: Option<Arc<dyn WriteLock>>,
    safe_mode: SafeMode,
}

impl<S, K> Clone for TokenCacheProvider<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug, K: fmt::Debug> fmt::Debug for TokenCacheProvider<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCacheProvider")
            .field("store", &self.inner.store)
            .field("key_provider", &self.inner.key_provider)
            .field("protector", &self.inner.protector)
            .field("write_lock", &self.inner.write_lock.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> TokenCacheProvider<S> {
    /// Starts building a provider over `store`.
    pub fn builder(store: S) -> TokenCacheProviderBuilder<S> {
        TokenCacheProviderBuilder {
            store,
            key_provider: SuggestedKey,
            encryptor: None,
            write_lock: None,
            observer: None,
        }
    }
}

impl<S, K> TokenCacheProvider<S, K>
where
    S: TokenCacheStore + 'static,
    K: KeyProvider,
{
    /// Registers the three hooks with `host`. Hook failures reach the host.
    pub fn initialize(&self, host: &impl HostTokenCache) {
        host.wire(self.hooks());
    }

    /// Registers the three hooks with `host`, wrapped so that failures are logged and
    /// swallowed instead of reaching the host.
    pub fn initialize_safe(&self, host: &impl HostTokenCache) {
        host.wire(self.inner.safe_mode.wrap_all(self.hooks()));
    }

    /// Returns the strict hooks without registering them.
    #[must_use]
    pub fn hooks(&self) -> AccessHooks {
        let before_access = self.clone();
        let after_access = self.clone();
        let before_write = self.clone();
        AccessHooks {
            before_access: access_hook(move |event| {
                let provider = before_access.clone();
                async move { provider.on_before_access(&event).await }
            }),
            after_access: access_hook(move |event| {
                let provider = after_access.clone();
                async move { provider.on_after_access(&event).await }
            }),
            before_write: access_hook(move |event| {
                let provider = before_write.clone();
                async move { provider.on_before_write(&event).await }
            }),
        }
    }

    /// Loads the event's partition from the store into the host's collection.
    ///
    /// A missing entry loads as empty input, so the host drops whatever it held before.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be computed, the store read fails, or the host
    /// rejects the bytes.
    pub async fn on_before_access(&self, event: &AccessEvent) -> Result<()> {
        let key = self.inner.key_provider.key(event)?;
        if key.is_empty() {
            return Ok(());
        }

        let hints = CacheHints::from_event(event);
        let bytes = self.inner.store.read_bytes(&key, &hints).await?.unwrap_or_default();
        let plaintext = self.inner.protector.unprotect(bytes);

        if let Err(error) = event.token_cache().deserialize(&plaintext, true) {
            telemetry::deserialize_failed(&key, self.inner.protector.is_enabled(), &error);
            return Err(error);
        }

        telemetry::partition_loaded(&key, plaintext.len(), event.is_app_cache());
        Ok(())
    }

    /// Persists the event's partition if the host changed it.
    ///
    /// A partition left without tokens is removed from the store. When the state is unchanged
    /// and no [`WriteLock`] is configured, nothing happens and the key is never computed. A
    /// configured lock is released at the end, whatever the outcome. An empty key skips both
    /// the write and the unlock.
    ///
    /// # Errors
    ///
    /// Returns the first error from computing the key, serializing, encrypting, writing,
    /// removing, or releasing the lock.
    pub async fn on_after_access(&self, event: &AccessEvent) -> Result<()> {
        if !event.has_state_changed() && self.inner.write_lock.is_none() {
            return Ok(());
        }

        let key = self.inner.key_provider.key(event)?;
        if key.is_empty() {
            return Ok(());
        }

        let persisted = self.persist(&key, event).await;
        let unlocked = match &self.inner.write_lock {
            Some(lock) => lock.unlock(&key).await,
            None => Ok(()),
        };
        persisted.and(unlocked)
    }

    /// Acquires the configured [`WriteLock`] for the event's partition. Without one this does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be computed or the lock cannot be acquired.
    pub async fn on_before_write(&self, event: &AccessEvent) -> Result<()> {
        let Some(lock) = &self.inner.write_lock else {
            return Ok(());
        };

        let key = self.inner.key_provider.key(event)?;
        if key.is_empty() {
            return Ok(());
        }
        lock.lock(&key).await
    }

    /// Removes the persisted partition of `account_id`.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn clear(&self, account_id: &str) -> Result<()> {
        self.inner.store.remove_key(account_id, &CacheHints::default()).await?;
        telemetry::partition_removed(account_id);
        Ok(())
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    async fn persist(&self, key: &str, event: &AccessEvent) -> Result<()> {
        if !event.has_state_changed() {
            return Ok(());
        }

        let hints = CacheHints::from_event(event);
        if event.has_tokens() {
            let plaintext = event.token_cache().serialize()?;
            let payload = self.inner.protector.protect(plaintext)?;
            let len = payload.len();
            self.inner.store.write_bytes(key, payload, &hints).await?;
            telemetry::partition_persisted(key, len, event.is_app_cache());
        } else {
            self.inner.store.remove_key(key, &hints).await?;
            telemetry::partition_removed(key);
        }
        Ok(())
    }
}

/// Builder for [`TokenCacheProvider`].
pub struct TokenCacheProviderBuilder<S, K = SuggestedKey> {
    store: S,
    key_provider: K,
    encryptor: Option<Arc<dyn Encryptor>>,
    write_lock: Option<Arc<dyn WriteLock>>,
    observer: Option<FailureObserver>,
}

impl<S, K> TokenCacheProviderBuilder<S, K> {
    /// Replaces the default [`SuggestedKey`] provider.
    pub fn key_provider<K2: KeyProvider>(self, key_provider: K2) -> TokenCacheProviderBuilder<S, K2> {
        TokenCacheProviderBuilder {
            store: self.store,
            key_provider,
            encryptor: self.encryptor,
            write_lock: self.write_lock,
            observer: self.observer,
        }
    }

    /// Encrypts persisted blobs with `encryptor`.
    #[must_use]
    pub fn encryptor(mut self, encryptor: impl Encryptor + 'static) -> Self {
        self.encryptor = Some(Arc::new(encryptor));
        self
    }

    /// Serializes writers of the same partition with `write_lock`.
    #[must_use]
    pub fn write_lock(mut self, write_lock: impl WriteLock + 'static) -> Self {
        self.write_lock = Some(Arc::new(write_lock));
        self
    }

    /// Calls `observer` for every failure swallowed by hooks registered with
    /// [`TokenCacheProvider::initialize_safe`].
    #[must_use]
    pub fn on_hook_failure(mut self, observer: impl Fn(&HookFailure) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Builds the provider.
    #[must_use]
    pub fn build(self) -> TokenCacheProvider<S, K> {
        TokenCacheProvider {
            inner: Arc::new(Inner {
                store: self.store,
                key_provider: self.key_provider,
                protector: Protector::new(self.encryptor),
                write_lock: self.write_lock,
                safe_mode: SafeMode::new().with_shared_observer(self.observer),
            }),
        }
    }
}

impl<S: fmt::Debug, K: fmt::Debug> fmt::Debug for TokenCacheProviderBuilder<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCacheProviderBuilder")
            .field("store", &self.store)
            .field("key_provider", &self.key_provider)
            .field("encryptor", &self.encryptor.is_some())
            .field("write_lock", &self.write_lock.is_some())
            .finish_non_exhaustive()
    }
}
