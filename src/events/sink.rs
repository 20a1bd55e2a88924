//! Best-effort event delivery to the host

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;

use super::events::SessionEvent;

/// Delivery channel to at most one host listener
///
/// Events emitted while nobody listens are dropped, not kept for a later
/// listener. Clones share the same listener slot.
#[derive(Clone, Default)]
pub struct EventSink {
    listener: Arc<Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a listener, replacing the current one
    pub fn listen(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.lock().replace(tx).is_some() {
            debug!("EventSink: previous listener replaced");
        }
        rx
    }

    /// Remove the listener
    pub fn cancel(&self) {
        self.lock().take();
    }

    pub fn has_listener(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver an event. Returns false if it was dropped.
    pub fn emit(&self, event: SessionEvent) -> bool {
        let mut listener = self.lock();
        let delivered = match listener.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        };
        if !delivered {
            // a listener whose receiver is gone counts as absent
            listener.take();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Events dropped because no listener was installed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<SessionEvent>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Emission gate for one running session
///
/// Everything a session emits goes through its scope. Once `close` returns,
/// nothing emitted through this scope reaches the sink anymore, even from
/// callbacks that were already in flight.
pub struct SessionScope {
    sink: EventSink,
    live: RwLock<bool>,
}

impl SessionScope {
    pub fn new(sink: EventSink) -> Arc<Self> {
        Arc::new(Self {
            sink,
            live: RwLock::new(true),
        })
    }

    pub fn emit(&self, event: SessionEvent) -> bool {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        if !*live {
            debug!("SessionScope: discarding {} from a stopped session", event.name());
            return false;
        }
        self.sink.emit(event)
    }

    pub fn close(&self) {
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_live(&self) -> bool {
        *self.live.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TorchState;

    fn torch(state: TorchState) -> SessionEvent {
        SessionEvent::TorchChanged { state }
    }

    #[test]
    fn test_no_listener_drops_silently() {
        let sink = EventSink::new();
        assert!(!sink.emit(torch(TorchState::On)));
        assert_eq!(sink.dropped(), 1);

        // nothing is replayed to a late listener
        let mut rx = sink.listen();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_new_listener_replaces_old() {
        let sink = EventSink::new();
        let mut first = sink.listen();
        let mut second = sink.listen();

        assert!(sink.emit(torch(TorchState::On)));
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), torch(TorchState::On));
    }

    #[test]
    fn test_cancel_and_dropped_receiver() {
        let sink = EventSink::new();
        let rx = sink.listen();
        assert!(sink.has_listener());

        drop(rx);
        assert!(!sink.has_listener());
        assert!(!sink.emit(torch(TorchState::Off)));

        let _rx = sink.listen();
        sink.cancel();
        assert!(!sink.has_listener());
        assert!(!sink.emit(torch(TorchState::Off)));
        assert_eq!(sink.dropped(), 2);
    }

    #[test]
    fn test_closed_scope_emits_nothing() {
        let sink = EventSink::new();
        let mut rx = sink.listen();
        let scope = SessionScope::new(sink.clone());

        assert!(scope.emit(torch(TorchState::On)));
        scope.close();
        assert!(!scope.is_live());
        assert!(!scope.emit(torch(TorchState::Off)));

        assert_eq!(rx.try_recv().unwrap(), torch(TorchState::On));
        assert!(rx.try_recv().is_err());
    }
}
