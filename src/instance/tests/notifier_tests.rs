//! Lifecycle notifier fan-out.

use crate::instance::{
    domain::BotId,
    ports::{LifecycleEvent, LifecycleListener, ListenerError},
    services::LifecycleNotifier,
};
use rstest::rstest;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<&'static str>>,
}

impl LifecycleListener for Recorder {
    fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        self.seen.lock().expect("recorder lock").push(event.name());
        Ok(())
    }
}

struct Failing;

impl LifecycleListener for Failing {
    fn on_event(&self, _event: &LifecycleEvent) -> Result<(), ListenerError> {
        Err(ListenerError::new(std::io::Error::other("listener down")))
    }
}

struct Panicking;

impl LifecycleListener for Panicking {
    fn on_event(&self, _event: &LifecycleEvent) -> Result<(), ListenerError> {
        panic!("listener bug");
    }
}

fn started() -> LifecycleEvent {
    LifecycleEvent::InstanceStarted {
        bot_id: BotId::new("helper").expect("valid id"),
        commands_loaded: 2,
    }
}

#[rstest]
fn failing_listeners_do_not_stop_delivery() {
    let notifier = LifecycleNotifier::new();
    let recorder = Arc::new(Recorder::default());
    notifier.subscribe(Arc::new(Failing));
    notifier.subscribe(Arc::new(Panicking));
    notifier.subscribe(recorder.clone());

    notifier.notify(&started());
    notifier.notify(&started());

    assert_eq!(notifier.listener_count(), 3);
    assert_eq!(
        *recorder.seen.lock().expect("recorder lock"),
        vec!["instance_started", "instance_started"]
    );
}

#[rstest]
fn events_serialise_with_tag() {
    let value = serde_json::to_value(started()).expect("event should serialise");

    assert_eq!(
        value,
        serde_json::json!({
            "event": "instance_started",
            "bot_id": "helper",
            "commands_loaded": 2,
        })
    );
}
