//! Start, stop, restart and status bookkeeping.

use super::helpers::{Harness, WAIT, bot_id, config, harness};
use botvisor::command::domain::CommandDefinition;
use botvisor::instance::{
    domain::{BotConfig, BotToken, ConnectionPhase, DeclaredStatus},
    ports::{BotStore, BotStoreError},
    services::{StopOutcome, SupervisorError},
};
use rstest::rstest;
use std::time::Duration;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_counts_enabled_valid_definitions(harness: Harness) {
    let bot = config("counter");
    harness.seed(
        &bot,
        &[
            CommandDefinition::simple("ping", "pong"),
            CommandDefinition::simple("hello", "hi $username"),
            CommandDefinition::simple("off", "never").with_enabled(false),
            CommandDefinition::simple("bad trigger", "rejected"),
        ],
    );

    let outcome = harness.supervisor.start(bot).await.expect("start accepted");
    let state = harness
        .supervisor
        .wait_until_ready(&bot_id("counter"), WAIT)
        .await
        .expect("instance ready");

    assert_eq!(outcome.commands_loaded, 2);
    assert_eq!(state.prefix_commands(), 2);
    assert_eq!(state.failed_definitions(), ["bad trigger".to_owned()]);
    assert_eq!(
        state.bot_user().map(|user| user.name.as_str()),
        Some("counter")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_start_for_a_running_bot_is_rejected(harness: Harness) {
    harness.start_ready("twice", &[]).await;

    let outcome = harness.supervisor.start(config("twice")).await;

    assert!(matches!(outcome, Err(SupervisorError::AlreadyRunning(id)) if id == bot_id("twice")));
    assert_eq!(harness.supervisor.status_all().len(), 1);
    assert_eq!(
        harness
            .gateway
            .connection_count(&bot_id("twice"))
            .expect("gateway readable"),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn short_token_is_rejected_before_launch(harness: Harness) {
    let bot = BotConfig::new(bot_id("weak"), BotToken::new("short"));

    let outcome = harness.supervisor.start(bot).await;

    assert!(matches!(outcome, Err(SupervisorError::InvalidCredential(_))));
    assert!(harness.supervisor.status(&bot_id("weak")).is_none());
    assert_eq!(
        harness
            .gateway
            .connection_count(&bot_id("weak"))
            .expect("gateway readable"),
        0
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_and_stop_record_declared_status(harness: Harness) {
    harness.start_ready("declared", &[]).await;
    let running = harness
        .store
        .get_bot_config(&bot_id("declared"))
        .expect("store readable")
        .expect("bot stored");

    let outcome = harness
        .supervisor
        .stop(&bot_id("declared"))
        .await
        .expect("stop accepted");
    let stopped = harness
        .store
        .get_bot_config(&bot_id("declared"))
        .expect("store readable")
        .expect("bot stored");

    assert_eq!(running.declared_status, DeclaredStatus::Running);
    assert_eq!(outcome, StopOutcome::Graceful);
    assert_eq!(stopped.declared_status, DeclaredStatus::Stopped);
    assert!(harness.supervisor.status_all().is_empty());
    assert!(
        !harness
            .gateway
            .is_connected(&bot_id("declared"))
            .expect("gateway readable")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unresponsive_instance_is_stopped_by_force(harness: Harness) {
    harness.start_ready("stuck", &[]).await;
    harness
        .gateway
        .set_close_delay(Some(Duration::from_secs(2)))
        .expect("gateway writable");

    let outcome = harness
        .supervisor
        .stop(&bot_id("stuck"))
        .await
        .expect("stop accepted");

    assert_eq!(outcome, StopOutcome::Forced);
    assert!(!harness.supervisor.status_all().contains_key(&bot_id("stuck")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stopping_an_unknown_bot_is_an_error(harness: Harness) {
    let outcome = harness.supervisor.stop(&bot_id("ghost")).await;

    assert!(matches!(outcome, Err(SupervisorError::NotRunning(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_reconnects_with_a_fresh_instance(harness: Harness) {
    harness.start_ready("phoenix", &[]).await;

    let outcome = harness
        .supervisor
        .restart(&bot_id("phoenix"))
        .await
        .expect("restart accepted");
    let state = harness
        .supervisor
        .wait_until_ready(&bot_id("phoenix"), WAIT)
        .await
        .expect("instance ready again");

    assert_eq!(outcome.stopped, Some(StopOutcome::Graceful));
    assert_eq!(state.phase(), ConnectionPhase::Ready);
    assert_eq!(
        harness
            .gateway
            .connection_count(&bot_id("phoenix"))
            .expect("gateway readable"),
        2
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_of_a_stopped_bot_reads_the_last_configuration(harness: Harness) {
    harness.start_ready("again", &[]).await;
    harness
        .supervisor
        .stop(&bot_id("again"))
        .await
        .expect("stop accepted");

    let outcome = harness
        .supervisor
        .restart(&bot_id("again"))
        .await
        .expect("restart accepted");

    assert_eq!(outcome.stopped, None);
    assert_eq!(outcome.started.bot_id, bot_id("again"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_by_id_requires_a_stored_configuration(harness: Harness) {
    let outcome = harness.supervisor.start_by_id(&bot_id("unknown")).await;

    assert!(matches!(
        outcome,
        Err(SupervisorError::Store(BotStoreError::NotFound(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_by_id_launches_the_stored_bot(harness: Harness) {
    harness.seed(&config("stored"), &[CommandDefinition::simple("ping", "pong")]);

    let outcome = harness
        .supervisor
        .start_by_id(&bot_id("stored"))
        .await
        .expect("start accepted");

    assert_eq!(outcome.commands_loaded, 1);
    assert!(
        harness
            .supervisor
            .wait_until_ready(&bot_id("stored"), WAIT)
            .await
            .is_ok()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_all_removes_every_instance(harness: Harness) {
    harness.start_ready("one", &[]).await;
    harness.start_ready("two", &[]).await;

    let stopped = harness.supervisor.stop_all().await;

    assert_eq!(stopped.len(), 2);
    assert!(harness.supervisor.status_all().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn instances_connect_independently(harness: Harness) {
    harness.start_ready("left", &[]).await;
    harness.start_ready("right", &[]).await;

    harness
        .supervisor
        .stop(&bot_id("left"))
        .await
        .expect("stop accepted");

    let remaining = harness.supervisor.status_all();
    assert_eq!(remaining.len(), 1);
    assert!(
        remaining
            .get(&bot_id("right"))
            .is_some_and(|state| state.phase() == ConnectionPhase::Ready)
    );
}
