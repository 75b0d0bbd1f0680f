// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The seam between the provider and the host's token collection.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::{AccessEvent, Result};

/// A lifecycle hook the host invokes around an access to its token collection.
pub type AccessHook = Arc<dyn Fn(AccessEvent) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Converts an async closure into an [`AccessHook`].
pub fn access_hook<F, Fut>(hook: F) -> AccessHook
where
    F: Fn(AccessEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| hook(event).boxed())
}

/// Identifies one of the three lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs before the host reads or mutates its collection.
    BeforeAccess,
    /// Runs after the host is done with its collection.
    AfterAccess,
    /// Runs before the host mutates its collection.
    BeforeWrite,
}

impl HookKind {
    /// Returns a short, stable name for the hook.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAccess => "before_access",
            Self::AfterAccess => "after_access",
            Self::BeforeWrite => "before_write",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three hooks registered with a host in a single call.
#[derive(Clone)]
pub struct AccessHooks {
    /// Invoked before the host reads or mutates its collection.
    pub before_access: AccessHook,
    /// Invoked after the host is done with its collection.
    pub after_access: AccessHook,
    /// Invoked before the host mutates its collection.
    pub before_write: AccessHook,
}

impl AccessHooks {
    /// Returns the hook of the given kind.
    #[must_use]
    pub fn get(&self, kind: HookKind) -> &AccessHook {
        match kind {
            HookKind::BeforeAccess => &self.before_access,
            HookKind::AfterAccess => &self.after_access,
            HookKind::BeforeWrite => &self.before_write,
        }
    }

    /// Invokes the hook of the given kind.
    ///
    /// # Errors
    ///
    /// Returns whatever the hook returns.
    pub async fn invoke(&self, kind: HookKind, event: AccessEvent) -> Result<()> {
        (self.get(kind))(event).await
    }
}

impl fmt::Debug for AccessHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessHooks").finish_non_exhaustive()
    }
}

/// A host that exposes its token collection to a cache provider.
///
/// The host keeps the hooks and calls them around every access. Wiring replaces any hooks
/// registered earlier.
pub trait HostTokenCache {
    /// Registers the three lifecycle hooks.
    fn wire(&self, hooks: AccessHooks);
}
