//! Class-loaded notifications.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::member::ContainerMember;

/// Emitted the first time a container creates a member for a class from registry data.
#[derive(Debug, Clone)]
pub struct ClassLoaded {
    pub class_name: String,
    pub member: Arc<ContainerMember>,
}

/// Listener for [`ClassLoaded`] events.
pub type ClassLoadedListener = Arc<dyn Fn(&ClassLoaded) + Send + Sync>;

/// Handle returned by [`Container::on_class_loaded`](crate::Container::on_class_loaded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct ClassLoadedListeners {
    next: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, ClassLoadedListener)>>,
}

impl ClassLoadedListeners {
    pub(crate) fn subscribe(&self, listener: ClassLoadedListener) -> SubscriptionId {
        let id = SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Calls every listener in subscription order. Listeners may subscribe or
    /// unsubscribe re-entrantly; changes apply from the next emit.
    pub(crate) fn emit(&self, event: &ClassLoaded) {
        let listeners: Vec<ClassLoadedListener> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl fmt::Debug for ClassLoadedListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoadedListeners")
            .field("listeners", &self.len())
            .finish()
    }
}
