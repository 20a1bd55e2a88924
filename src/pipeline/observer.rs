//! Torch mode subscription

use log::{debug, info};
use std::sync::Arc;

use super::health::SessionHealth;
use crate::capture::{CameraDevice, DeviceError, ObserverToken, TorchState};
use crate::events::{SessionEvent, SessionScope};

/// Republishes device torch changes as `torchState` events for as long as
/// it holds its token.
pub struct TorchObserver {
    device: Arc<dyn CameraDevice>,
    token: Option<ObserverToken>,
}

impl TorchObserver {
    pub fn subscribe(
        device: Arc<dyn CameraDevice>,
        scope: Arc<SessionScope>,
        health: Arc<SessionHealth>,
    ) -> Result<Self, DeviceError> {
        let callback = Arc::new(move |state: TorchState| {
            if !scope.emit(SessionEvent::TorchChanged { state }) {
                health.record_event_dropped();
            }
        });
        let token = device.observe_torch(callback)?;
        debug!("TorchObserver: subscribed to {} ({})", device.id(), token.id());
        Ok(Self {
            device,
            token: Some(token),
        })
    }

    /// Remove the subscription. Only the first call has an effect.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(token) = self.token.take() else {
            return false;
        };
        if !self.device.remove_torch_observer(token) {
            info!("TorchObserver: {} had already dropped the observer", self.device.id());
        }
        true
    }

    pub fn is_subscribed(&self) -> bool {
        self.token.is_some()
    }
}

impl Drop for TorchObserver {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraPosition, ConfigurationLock, SyntheticCamera};
    use crate::events::EventSink;

    fn setup() -> (SyntheticCamera, EventSink, Arc<SessionScope>, Arc<SessionHealth>) {
        let camera = SyntheticCamera::new(CameraPosition::Back);
        let sink = EventSink::new();
        let scope = SessionScope::new(sink.clone());
        (camera, sink, scope, Arc::new(SessionHealth::new()))
    }

    #[test]
    fn test_torch_changes_become_events() {
        let (camera, sink, scope, health) = setup();
        let mut rx = sink.listen();
        let _observer =
            TorchObserver::subscribe(Arc::new(camera.clone()), scope, health).unwrap();

        {
            let _lock = ConfigurationLock::acquire(&camera).unwrap();
            camera.set_torch_state(TorchState::On).unwrap();
        }
        camera.simulate_torch_change(TorchState::Auto);

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TorchChanged {
                state: TorchState::On
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TorchChanged {
                state: TorchState::Auto
            }
        );
    }

    #[test]
    fn test_unsubscribe_exactly_once() {
        let (camera, _sink, scope, health) = setup();
        let mut observer =
            TorchObserver::subscribe(Arc::new(camera.clone()), scope, health).unwrap();
        assert_eq!(camera.observer_count(), 1);

        assert!(observer.unsubscribe());
        assert!(!observer.unsubscribe());
        assert!(!observer.is_subscribed());
        assert_eq!(camera.observer_count(), 0);

        drop(observer);
        assert_eq!(camera.observer_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (camera, _sink, scope, health) = setup();
        let observer = TorchObserver::subscribe(Arc::new(camera.clone()), scope, health).unwrap();
        drop(observer);
        assert_eq!(camera.observer_count(), 0);
    }

    #[test]
    fn test_subscription_failure() {
        let (camera, _sink, scope, health) = setup();
        camera.set_fail_observe(true);
        let result = TorchObserver::subscribe(Arc::new(camera.clone()), scope, health);
        assert!(matches!(result, Err(DeviceError::ObserverFailed(_))));
    }

    #[test]
    fn test_dropped_events_are_counted() {
        let (camera, _sink, scope, health) = setup();
        let _observer =
            TorchObserver::subscribe(Arc::new(camera.clone()), scope, health.clone()).unwrap();
        camera.simulate_torch_change(TorchState::On);
        assert_eq!(health.events_dropped(), 1);
    }
}
