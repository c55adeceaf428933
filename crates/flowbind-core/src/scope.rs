//! Lifetime boundaries for bindings.
//!
//! A binding lives until its owning [`Scope`] is cancelled. The adapter only
//! needs two capabilities from a scope: a liveness query and a way to run a
//! cleanup when the scope ends. [`LifecycleScope`] is the bundled
//! implementation; widgets also use one as their attachment scope, so a
//! detached widget tears down every binding made against it.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Work to run once when a scope ends.
pub type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// Key identifying a registered cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupKey(u64);

/// The lifecycle capability consumed by the adapter.
pub trait Scope: Send + Sync {
    /// Whether the scope is still running.
    fn is_active(&self) -> bool;

    /// Register a cleanup to run when the scope is cancelled.
    ///
    /// Returns `None` when the scope is already cancelled; the cleanup has
    /// then already run on the calling thread.
    fn on_cancel(&self, cleanup: Cleanup) -> Option<CleanupKey>;

    /// Forget a cleanup that no longer needs to run.
    fn remove_cleanup(&self, key: CleanupKey);
}

/// Cancellable scope with synchronous cleanup propagation.
///
/// Cloning yields another handle to the same scope. Dropping handles never
/// cancels; only [`LifecycleScope::cancel`] does.
#[derive(Clone)]
pub struct LifecycleScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    name: String,
    cancelled: AtomicBool,
    cleanups: Mutex<Vec<(u64, Cleanup)>>,
    next_key: AtomicU64,
    token: CancellationToken,
    parent: Mutex<Option<(Weak<ScopeInner>, CleanupKey)>>,
}

impl LifecycleScope {
    /// Create a new active scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_token(name.into(), CancellationToken::new())
    }

    fn with_token(name: String, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name,
                cancelled: AtomicBool::new(false),
                cleanups: Mutex::new(Vec::new()),
                next_key: AtomicU64::new(0),
                token,
                parent: Mutex::new(None),
            }),
        }
    }

    /// Scope name used in log output.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Create a scope that ends no later than this one.
    ///
    /// Cancelling the child leaves the parent running.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let child = Self::with_token(name.into(), self.inner.token.child_token());
        let weak_child = Arc::downgrade(&child.inner);
        let key = self.on_cancel(Box::new(move || {
            if let Some(inner) = weak_child.upgrade() {
                LifecycleScope { inner }.cancel();
            }
        }));
        if let Some(key) = key {
            *child.inner.parent.lock() = Some((Arc::downgrade(&self.inner), key));
        }
        child
    }

    /// Cancel the scope, running every registered cleanup in registration
    /// order. Subsequent calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        debug!(
            scope = %self.inner.name,
            cleanups = cleanups.len(),
            "Cancelling scope"
        );
        for (_, cleanup) in cleanups {
            cleanup();
        }

        if let Some((parent, key)) = self.inner.parent.lock().take() {
            if let Some(parent) = parent.upgrade() {
                LifecycleScope { inner: parent }.remove_cleanup(key);
            }
        }

        self.inner.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called on this scope or an
    /// ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Token mirroring this scope, for `select!`-style async code.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Number of cleanups still waiting for cancellation.
    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.lock().len()
    }
}

impl Scope for LifecycleScope {
    fn is_active(&self) -> bool {
        !self.is_cancelled()
    }

    fn on_cancel(&self, cleanup: Cleanup) -> Option<CleanupKey> {
        {
            let mut cleanups = self.inner.cleanups.lock();
            if !self.inner.cancelled.load(Ordering::Acquire) {
                let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
                cleanups.push((key, cleanup));
                return Some(CleanupKey(key));
            }
        }
        cleanup();
        None
    }

    fn remove_cleanup(&self, key: CleanupKey) {
        self.inner.cleanups.lock().retain(|(k, _)| *k != key.0);
    }
}

impl fmt::Debug for LifecycleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleScope")
            .field("name", &self.inner.name)
            .field("cancelled", &self.is_cancelled())
            .field("pending_cleanups", &self.pending_cleanups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Cleanup) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> Cleanup {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_cleanups_run_in_registration_order() {
        let scope = LifecycleScope::new("test");
        let (log, make) = recorder();

        scope.on_cancel(make("first"));
        scope.on_cancel(make("second"));
        assert_eq!(scope.pending_cleanups(), 2);

        scope.cancel();
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(!scope.is_active());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let scope = LifecycleScope::new("test");
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        scope.on_cancel(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        scope.cancel();
        scope.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup_after_cancel_runs_immediately() {
        let scope = LifecycleScope::new("test");
        scope.cancel();

        let (log, make) = recorder();
        assert!(scope.on_cancel(make("late")).is_none());
        assert_eq!(*log.lock(), vec!["late"]);
    }

    #[test]
    fn test_removed_cleanup_does_not_run() {
        let scope = LifecycleScope::new("test");
        let (log, make) = recorder();

        let key = scope.on_cancel(make("removed")).unwrap();
        scope.on_cancel(make("kept"));
        scope.remove_cleanup(key);

        scope.cancel();
        assert_eq!(*log.lock(), vec!["kept"]);
    }

    #[test]
    fn test_child_cancelled_with_parent() {
        let parent = LifecycleScope::new("parent");
        let child = parent.child("child");
        let (log, make) = recorder();
        child.on_cancel(make("child cleanup"));

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(child.token().is_cancelled());
        assert_eq!(*log.lock(), vec!["child cleanup"]);
    }

    #[test]
    fn test_child_cancel_leaves_parent_running() {
        let parent = LifecycleScope::new("parent");
        let child = parent.child("child");
        assert_eq!(parent.pending_cleanups(), 1);

        child.cancel();
        assert!(parent.is_active());
        assert_eq!(parent.pending_cleanups(), 0);
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = LifecycleScope::new("parent");
        parent.cancel();

        let child = parent.child("child");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let scope = LifecycleScope::new("test");
        let waiter = scope.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        scope.cancel();
        task.await.unwrap();
    }
}
