//! Plugin Event Listeners
//!
//! Registry and lifecycle events are fanned out synchronously to registered
//! listeners. Each listener is isolated: an error or panic in one is logged
//! and the remaining listeners are still notified.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use log::{error, warn};
use parking_lot::RwLock;

use super::base::panic_message;
use super::error::{PluginError, PluginResult};
use super::state::PluginState;
use super::traits::PluginDescriptor;

/// Observer for registry changes
pub trait RegistryListener: Send + Sync {
    fn on_registered(&self, _plugin_type: &str, _descriptor: &PluginDescriptor) -> PluginResult<()> {
        Ok(())
    }

    fn on_unregistered(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_enabled(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_disabled(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_error(&self, _plugin_type: &str, _error: &PluginError) -> PluginResult<()> {
        Ok(())
    }
}

/// Observer for lifecycle transitions
pub trait LifecycleListener: Send + Sync {
    fn on_state_changed(&self, _plugin_type: &str, _old: PluginState, _new: PluginState) -> PluginResult<()> {
        Ok(())
    }

    fn on_initialized(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_started(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_stopped(&self, _plugin_type: &str) -> PluginResult<()> {
        Ok(())
    }

    fn on_error(&self, _plugin_type: &str, _error: &PluginError) -> PluginResult<()> {
        Ok(())
    }
}

/// Registered listeners of one kind
pub struct ListenerSet<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self { listeners: RwLock::new(Vec::new()) }
    }
}

impl<L: ?Sized + Send + Sync> ListenerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<L>) {
        self.listeners.write().push(listener);
    }

    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke `f` on every listener, logging failures without propagating them
    pub fn notify<F>(&self, event: &str, f: F)
    where
        F: Fn(&L) -> PluginResult<()>,
    {
        // Snapshot so listeners may add or remove listeners while being notified
        let snapshot: Vec<Arc<L>> = self.listeners.read().clone();
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Listener failed handling {}: {}", event, e),
                Err(panic) => error!("Listener panicked handling {}: {}", event, panic_message(panic.as_ref())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl LifecycleListener for Counting {
        fn on_started(&self, _plugin_type: &str) -> PluginResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl LifecycleListener for Failing {
        fn on_started(&self, _plugin_type: &str) -> PluginResult<()> {
            Err(PluginError::other("listener failure"))
        }
    }

    struct Panicking;

    impl LifecycleListener for Panicking {
        fn on_started(&self, _plugin_type: &str) -> PluginResult<()> {
            panic!("listener panic");
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let set: ListenerSet<dyn LifecycleListener> = ListenerSet::new();
        let first = Arc::new(Counting(AtomicUsize::new(0)));
        let last = Arc::new(Counting(AtomicUsize::new(0)));
        set.add(first.clone());
        set.add(Arc::new(Failing));
        set.add(Arc::new(Panicking));
        set.add(last.clone());

        set.notify("started", |l| l.on_started("snmp"));

        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(last.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let set: ListenerSet<dyn LifecycleListener> = ListenerSet::new();
        let listener: Arc<dyn LifecycleListener> = Arc::new(Failing);
        set.add(listener.clone());
        assert_eq!(set.len(), 1);
        assert!(set.remove(&listener));
        assert!(set.is_empty());
        assert!(!set.remove(&listener));
    }
}
