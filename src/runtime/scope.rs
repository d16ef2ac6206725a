use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type MountCallback = Box<dyn FnOnce() + Send>;

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(0);

// Thread-local stack of scopes entered with `Scope::run`
thread_local! {
    static SCOPE_STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeState {
    mounted: bool,
    pending: Vec<MountCallback>,
}

struct ScopeInner {
    id: usize,
    state: Mutex<ScopeState>,
    alive: Arc<AtomicBool>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        tracing::trace!(scope = self.id, "scope dropped");
    }
}

/// Owner of a UI mount lifecycle.
///
/// Stores created while a scope is current defer their hydration until the
/// scope is mounted, and discard hydration results that arrive after it is
/// disposed.
///
/// # Examples
///
/// ```
/// use larder::runtime::Scope;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let scope = Scope::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = ran.clone();
///
/// scope.on_mount(move || flag.store(true, Ordering::SeqCst));
/// assert!(!ran.load(Ordering::SeqCst));
///
/// scope.mount();
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(ScopeState {
                    mounted: false,
                    pending: Vec::new(),
                }),
                alive: Arc::new(AtomicBool::new(true)),
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// The innermost scope entered on this thread, if any.
    pub fn current() -> Option<Scope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Run a function with this scope as the current one.
    ///
    /// This pushes the scope onto the thread-local stack for the duration
    /// of the function execution.
    pub fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().push(self.clone());
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Schedule `f` to run once after mount.
    ///
    /// Runs immediately if the scope is already mounted, and is dropped
    /// without running if the scope has been disposed.
    pub fn on_mount<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_alive() {
            tracing::trace!(scope = self.id(), "on_mount ignored on disposed scope");
            return;
        }

        {
            let mut state = self.lock();
            if !state.mounted {
                state.pending.push(Box::new(f));
                return;
            }
        }
        f();
    }

    /// Run every pending mount callback, in registration order.
    ///
    /// Only the first call does anything.
    pub fn mount(&self) {
        let pending = {
            let mut state = self.lock();
            if state.mounted || !self.is_alive() {
                return;
            }
            state.mounted = true;
            std::mem::take(&mut state.pending)
        };

        tracing::trace!(scope = self.id(), callbacks = pending.len(), "scope mounted");
        for callback in pending {
            callback();
        }
    }

    /// Tear the scope down. Pending mount callbacks are dropped.
    pub fn dispose(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        let dropped = std::mem::take(&mut self.lock().pending);
        tracing::trace!(scope = self.id(), dropped = dropped.len(), "scope disposed");
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Token that outlives the scope handle and reports whether it was torn down.
    pub fn lifetime(&self) -> Lifetime {
        Lifetime {
            alive: Arc::clone(&self.inner.alive),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScopeState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Liveness flag of the scope that owns a store.
#[derive(Debug, Clone)]
pub struct Lifetime {
    alive: Arc<AtomicBool>,
}

impl Lifetime {
    /// A lifetime with no owning scope; it never ends.
    pub fn detached() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> MountCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let make = move || -> MountCallback {
            let c = Arc::clone(&c);
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, make)
    }

    #[test]
    fn callbacks_wait_for_mount() {
        let scope = Scope::new();
        let (count, make) = counter();

        scope.on_mount(make());
        scope.on_mount(make());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scope.mount();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scope.mount();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runs_immediately_once_mounted() {
        let scope = Scope::new();
        scope.mount();
        let (count, make) = counter();

        scope.on_mount(make());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_drops_pending() {
        let scope = Scope::new();
        let (count, make) = counter();
        let lifetime = scope.lifetime();

        scope.on_mount(make());
        scope.dispose();
        scope.mount();
        scope.on_mount(make());

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!lifetime.is_alive());
        assert!(!scope.is_mounted());
    }

    #[test]
    fn dropping_last_handle_ends_lifetime() {
        let scope = Scope::new();
        let lifetime = scope.lifetime();
        assert!(lifetime.is_alive());
        drop(scope);
        assert!(!lifetime.is_alive());
    }

    #[test]
    fn run_sets_current() {
        assert!(Scope::current().is_none());
        let outer = Scope::new();
        let inner = Scope::new();

        outer.run(|| {
            assert_eq!(Scope::current().map(|s| s.id()), Some(outer.id()));
            inner.run(|| {
                assert_eq!(Scope::current().map(|s| s.id()), Some(inner.id()));
            });
            assert_eq!(Scope::current().map(|s| s.id()), Some(outer.id()));
        });

        assert!(Scope::current().is_none());
    }

    #[test]
    fn mount_callback_may_register_more() {
        let scope = Scope::new();
        let (count, make) = counter();
        let again = scope.clone();
        let late = make();

        scope.on_mount(move || again.on_mount(late));
        scope.mount();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
