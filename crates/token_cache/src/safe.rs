// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fail-safe wrapping of lifecycle hooks.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::{AccessHook, AccessHooks, Error, HookKind, Operation, telemetry};

/// A hook failure that [`SafeMode`] kept from reaching the host.
#[derive(Debug)]
pub struct HookFailure {
    hook: HookKind,
    error: Error,
}

impl HookFailure {
    /// Returns the hook that failed.
    #[must_use]
    pub fn hook(&self) -> HookKind {
        self.hook
    }

    /// Returns the suppressed error.
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }
}

/// Receives every failure suppressed by [`SafeMode`].
pub type FailureObserver = Arc<dyn Fn(&HookFailure) + Send + Sync>;

/// Turns hooks into fail-safe hooks.
///
/// A wrapped hook always completes with `Ok(())`. Errors returned by the inner hook and panics
/// raised while it runs are logged at `warn` level and handed to the observer, if one is
/// configured. A panicking observer is contained as well. The host's own operation then
/// proceeds as if the cache were empty.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use token_cache::{AccessEvent, Error, HookKind, SafeMode, access_hook};
/// # use token_cache::{Result, TokenCacheSerializer};
/// # struct Empty;
/// # impl TokenCacheSerializer for Empty {
/// #     fn serialize(&self) -> Result<Vec<u8>> { Ok(Vec::new()) }
/// #     fn deserialize(&self, _: &[u8], _: bool) -> Result<()> { Ok(()) }
/// # }
///
/// let failing = access_hook(|_| async { Err(Error::read("store offline")) });
/// let safe = SafeMode::new().wrap(HookKind::BeforeAccess, failing);
///
/// let event = AccessEvent::new(Arc::new(Empty), "user");
/// assert!(futures::executor::block_on(safe(event)).is_ok());
/// ```
#[derive(Clone, Default)]
pub struct SafeMode {
    observer: Option<FailureObserver>,
}

impl SafeMode {
    /// Creates a safe mode that only logs suppressed failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes suppressed failures to `observer` in addition to the log.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Fn(&HookFailure) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub(crate) fn with_shared_observer(mut self, observer: Option<FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Wraps a single hook.
    #[must_use]
    pub fn wrap(&self, kind: HookKind, hook: AccessHook) -> AccessHook {
        let observer = self.observer.clone();
        Arc::new(move |event| {
            let hook = Arc::clone(&hook);
            let observer = observer.clone();
            async move {
                let outcome = AssertUnwindSafe(async move { hook(event).await }).catch_unwind().await;
                let error = match outcome {
                    Ok(Ok(())) => return Ok(()),
                    Ok(Err(error)) => error,
                    Err(panic) => Error::caused_by(Operation::Hook, panic_message(panic.as_ref())),
                };

                telemetry::failure_suppressed(kind, &error);
                if let Some(observer) = observer {
                    let failure = HookFailure { hook: kind, error };
                    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| observer(&failure))) {
                        telemetry::observer_panicked(kind, &panic_message(panic.as_ref()));
                    }
                }
                Ok(())
            }
            .boxed()
        })
    }

    /// Wraps all three hooks.
    #[must_use]
    pub fn wrap_all(&self, hooks: AccessHooks) -> AccessHooks {
        AccessHooks {
            before_access: self.wrap(HookKind::BeforeAccess, hooks.before_access),
            after_access: self.wrap(HookKind::AfterAccess, hooks.after_access),
            before_write: self.wrap(HookKind::BeforeWrite, hooks.before_write),
        }
    }
}

impl fmt::Debug for SafeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeMode")
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("hook panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("hook panicked: {message}")
    } else {
        "hook panicked".to_owned()
    }
}
