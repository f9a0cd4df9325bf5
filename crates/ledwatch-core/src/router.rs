// ── Push event routing ──
//
// Maps each closed `EventKind` to the handlers registered for it. The set
// of handlers is built once when the console is assembled and never
// changes afterwards, so no inbound event can fall into a resubscription
// gap. Handlers read live state through whatever shared cells they
// captured.

use std::collections::HashMap;

use ledwatch_api::{EventKind, RelayEvent};
use strum::IntoEnumIterator;

type EventHandler = Box<dyn Fn(&RelayEvent) + Send + Sync>;
type DisconnectHandler = Box<dyn Fn() + Send + Sync>;

/// Dispatch table from event kind to handlers.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
    disconnect: Vec<DisconnectHandler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every inbound event of `kind`.
    ///
    /// Handlers of the same kind run in registration order.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&RelayEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Register `handler` to run when the transport reports loss of the
    /// connection.
    pub fn on_disconnect<F>(&mut self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.disconnect.push(Box::new(handler));
    }

    /// Run every handler for `event`'s kind, to completion, in order.
    /// Returns how many ran.
    pub fn dispatch(&self, event: &RelayEvent) -> usize {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            tracing::debug!(?kind, "no handler registered");
            return 0;
        };
        for handler in handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn notify_disconnect(&self) {
        for handler in &self.disconnect {
            handler();
        }
    }

    /// Event kinds nothing is listening to.
    pub fn unhandled_kinds(&self) -> Vec<EventKind> {
        EventKind::iter()
            .filter(|kind| self.handlers.get(kind).is_none_or(Vec::is_empty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut router = EventRouter::new();

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            router.subscribe(EventKind::AlarmStopAll, move |_| {
                order.lock().expect("order lock poisoned").push(tag);
            });
        }

        assert_eq!(router.dispatch(&RelayEvent::AlarmStopAll), 2);
        assert_eq!(*order.lock().expect("order lock poisoned"), ["first", "second"]);
    }

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = EventRouter::new();
        {
            let hits = Arc::clone(&hits);
            router.subscribe(EventKind::FleetSnapshot, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(router.dispatch(&RelayEvent::AlarmStopAll), 0);
        assert_eq!(router.dispatch(&RelayEvent::FleetSnapshot(Vec::new())), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_handlers_fire() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = EventRouter::new();
        {
            let hits = Arc::clone(&hits);
            router.on_disconnect(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        router.notify_disconnect();
        router.notify_disconnect();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unhandled_kinds_lists_gaps() {
        let mut router = EventRouter::new();
        assert_eq!(router.unhandled_kinds().len(), 7);

        router.subscribe(EventKind::LogAppend, |_| {});
        let gaps = router.unhandled_kinds();
        assert_eq!(gaps.len(), 6);
        assert!(!gaps.contains(&EventKind::LogAppend));
    }
}
