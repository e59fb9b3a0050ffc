//! Connection failures, drops and listener faults.

use super::helpers::{Harness, WAIT, bot_id, config, harness, texts, wait_for_state};
use botvisor::command::domain::CommandDefinition;
use botvisor::instance::{
    domain::{BotToken, ConnectionPhase},
    ports::{LifecycleEvent, LifecycleListener, ListenerError},
    services::SupervisorError,
};
use rstest::rstest;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct EventLog {
    names: Mutex<Vec<&'static str>>,
}

impl EventLog {
    fn names(&self) -> Vec<&'static str> {
        self.names.lock().expect("event log lock").clone()
    }
}

impl LifecycleListener for EventLog {
    fn on_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        self.names.lock().expect("event log lock").push(event.name());
        Ok(())
    }
}

struct Panicking;

impl LifecycleListener for Panicking {
    fn on_event(&self, _event: &LifecycleEvent) -> Result<(), ListenerError> {
        panic!("listener bug");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_token_leaves_a_failed_instance(harness: Harness) {
    let bot = config("refused");
    harness
        .gateway
        .reject_token(bot.token.expose())
        .expect("gateway writable");
    harness.seed(&bot, &[]);

    harness.supervisor.start(bot).await.expect("start accepted");
    let outcome = harness
        .supervisor
        .wait_until_ready(&bot_id("refused"), WAIT)
        .await;

    assert!(matches!(outcome, Err(SupervisorError::ConnectFailed(_))));
    let state = harness
        .supervisor
        .status(&bot_id("refused"))
        .expect("failed instance stays visible");
    assert_eq!(state.phase(), ConnectionPhase::Failed);
    assert!(state.last_error().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn short_token_keeps_the_failed_instance_visible(harness: Harness) {
    let bot = config("kept");
    harness
        .gateway
        .reject_token(bot.token.expose())
        .expect("gateway writable");
    harness.seed(&bot, &[]);
    harness.supervisor.start(bot.clone()).await.expect("start accepted");
    let first = harness
        .supervisor
        .wait_until_ready(&bot_id("kept"), WAIT)
        .await;

    let mut short = bot;
    short.token = BotToken::new("short");
    let outcome = harness.supervisor.start(short).await;

    assert!(matches!(first, Err(SupervisorError::ConnectFailed(_))));
    assert!(matches!(outcome, Err(SupervisorError::InvalidCredential(id)) if id == bot_id("kept")));
    let state = harness
        .supervisor
        .status(&bot_id("kept"))
        .expect("failed instance stays visible");
    assert_eq!(state.phase(), ConnectionPhase::Failed);
    assert!(state.last_error().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_instance_can_be_started_again(harness: Harness) {
    harness
        .gateway
        .fail_connections(Some("platform offline".to_owned()))
        .expect("gateway writable");
    let bot = config("retry");
    harness.seed(&bot, &[]);
    harness
        .supervisor
        .start(bot.clone())
        .await
        .expect("start accepted");
    let first = harness
        .supervisor
        .wait_until_ready(&bot_id("retry"), WAIT)
        .await;
    harness
        .gateway
        .fail_connections(None)
        .expect("gateway writable");

    harness.supervisor.start(bot).await.expect("restart of failed bot");
    let second = harness
        .supervisor
        .wait_until_ready(&bot_id("retry"), WAIT)
        .await;

    assert!(matches!(first, Err(SupervisorError::ConnectFailed(detail)) if detail.contains("platform offline")));
    assert!(second.is_ok());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dropped_connection_is_resumed(harness: Harness) {
    harness
        .start_ready("flaky", &[CommandDefinition::simple("ping", "pong")])
        .await;

    harness
        .gateway
        .drop_connection(&bot_id("flaky"), "network blip")
        .expect("drop delivered");
    let resumed = wait_for_state(&harness, "flaky", |state| {
        state.resumes() == 1 && state.phase() == ConnectionPhase::Ready
    })
    .await;
    let replies = harness.say("flaky", "hana", "!ping", 1).await;

    assert!(resumed.is_some_and(|state| state.resumes() == 1 && state.is_ready()));
    assert_eq!(texts(&replies), vec!["pong".to_owned()]);
    assert_eq!(
        harness
            .gateway
            .connection_count(&bot_id("flaky"))
            .expect("gateway readable"),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconnect_keeps_retrying_until_the_platform_returns(harness: Harness) {
    harness.start_ready("patient", &[]).await;
    harness
        .gateway
        .fail_connections(Some("still down".to_owned()))
        .expect("gateway writable");
    harness
        .gateway
        .drop_connection(&bot_id("patient"), "outage")
        .expect("drop delivered");

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let during = harness
        .supervisor
        .status(&bot_id("patient"))
        .expect("instance supervised");
    harness
        .gateway
        .fail_connections(None)
        .expect("gateway writable");
    let after = wait_for_state(&harness, "patient", |state| state.resumes() == 1).await;

    assert_ne!(during.phase(), ConnectionPhase::Ready);
    assert!(during.last_error().is_some_and(|error| error.contains("still down")));
    assert!(during.error_count() >= 1);
    assert!(after.is_some_and(|state| state.is_ready()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_listener_does_not_disturb_supervision(harness: Harness) {
    let log = Arc::new(EventLog::default());
    harness.supervisor.subscribe(Arc::new(Panicking));
    harness.supervisor.subscribe(log.clone());

    harness
        .start_ready("observed", &[CommandDefinition::simple("ping", "pong")])
        .await;
    let replies = harness.say("observed", "ivan", "!ping", 1).await;
    harness
        .supervisor
        .stop(&bot_id("observed"))
        .await
        .expect("stop accepted");

    assert_eq!(texts(&replies), vec!["pong".to_owned()]);
    assert_eq!(
        log.names(),
        vec!["instance_started", "command_invoked", "instance_stopped"]
    );
}
