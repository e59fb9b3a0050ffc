//! Best-effort fan-out of lifecycle events.

use crate::instance::ports::{LifecycleEvent, LifecycleListener};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Delivers lifecycle events to registered listeners.
///
/// A listener that returns an error or panics is logged and skipped; the
/// operation that raised the event never sees the failure.
#[derive(Default)]
pub struct LifecycleNotifier {
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl LifecycleNotifier {
    /// Creates a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every subsequent event.
    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        match self.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Delivers `event` to every listener.
    pub fn notify(&self, event: &LifecycleEvent) {
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(bot_id = %event.bot_id(), event = event.name(), error = %err, "lifecycle listener failed");
                }
                Err(_) => {
                    warn!(bot_id = %event.bot_id(), event = event.name(), "lifecycle listener panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for LifecycleNotifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LifecycleNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
