//! Hot reload of command sets.

use super::helpers::{Harness, WAIT, bot_id, config, fast_settings, harness, texts};
use botvisor::command::domain::CommandDefinition;
use botvisor::command::validation::{CommandValidator, ValidatorConfig};
use botvisor::instance::{
    adapters::InMemoryBotGateway,
    domain::{BotConfig, BotConfigUpdate, BotId, ConnectionPhase},
    ports::{BotStore, BotStoreResult},
    services::{InstanceSupervisor, ReloadOutcome, SupervisorError},
};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

mockall::mock! {
    Store {}

    impl BotStore for Store {
        fn get_bot_config(&self, bot_id: &BotId) -> BotStoreResult<Option<BotConfig>>;
        fn get_command_definitions(&self, bot_id: &BotId) -> BotStoreResult<Vec<CommandDefinition>>;
        fn update_bot_config(&self, bot_id: &BotId, update: &BotConfigUpdate) -> BotStoreResult<()>;
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_swaps_handlers_without_reconnecting(harness: Harness) {
    harness
        .start_ready(
            "swapper",
            &[
                CommandDefinition::simple("ping", "pong"),
                CommandDefinition::simple("old", "legacy"),
            ],
        )
        .await;
    harness.say("swapper", "alice", "!ping", 1).await;
    harness
        .store
        .upsert_command(&bot_id("swapper"), CommandDefinition::simple("ping", "pong v2"))
        .expect("definition stored");
    harness
        .store
        .remove_command(&bot_id("swapper"), "old")
        .expect("definition removed");

    let outcome = harness
        .supervisor
        .reload_commands(&bot_id("swapper"))
        .await
        .expect("reload applied");
    harness.say("swapper", "alice", "!old", 1).await;
    let replies = harness.say("swapper", "alice", "!ping", 2).await;

    let ReloadOutcome::Applied(report) = outcome else {
        panic!("expected an acknowledged reload");
    };
    assert_eq!(report.installed, vec!["ping".to_owned()]);
    assert_eq!(
        texts(&replies),
        vec!["pong".to_owned(), "pong v2".to_owned()]
    );
    assert_eq!(
        harness
            .gateway
            .connection_count(&bot_id("swapper"))
            .expect("gateway readable"),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partial_reload_reports_failures_and_keeps_successes(harness: Harness) {
    harness.start_ready("partial", &[]).await;
    harness
        .store
        .upsert_command(&bot_id("partial"), CommandDefinition::simple("good", "fine"))
        .expect("definition stored");
    harness
        .store
        .upsert_command(&bot_id("partial"), CommandDefinition::simple("bad one", "broken"))
        .expect("definition stored");

    let outcome = harness.supervisor.reload_commands(&bot_id("partial")).await;
    let replies = harness.say("partial", "bob", "!good", 1).await;

    let Err(SupervisorError::RegistryPartialFailure {
        failed_triggers,
        installed,
    }) = outcome
    else {
        panic!("expected a partial failure");
    };
    assert_eq!(failed_triggers, vec!["bad one".to_owned()]);
    assert_eq!(installed, vec!["good".to_owned()]);
    assert_eq!(texts(&replies), vec!["fine".to_owned()]);
    let state = harness
        .supervisor
        .status(&bot_id("partial"))
        .expect("instance supervised");
    assert_eq!(state.failed_definitions(), ["bad one".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_of_a_stopped_bot_does_not_touch_the_store() {
    let validator =
        CommandValidator::new(ValidatorConfig::default()).expect("default validator config");
    let supervisor = InstanceSupervisor::new(
        Arc::new(MockStore::new()),
        Arc::new(InMemoryBotGateway::new()),
        Arc::new(DefaultClock),
        fast_settings(),
        Arc::new(validator),
    );

    let outcome = supervisor.reload_commands(&bot_id("absent")).await;

    assert!(matches!(outcome, Err(SupervisorError::NotRunning(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_while_connecting_is_refused(harness: Harness) {
    harness
        .gateway
        .set_connect_delay(Some(Duration::from_millis(500)))
        .expect("gateway writable");
    let bot = config("slowpoke");
    harness.seed(&bot, &[CommandDefinition::simple("ping", "pong")]);
    harness.supervisor.start(bot).await.expect("start accepted");

    let outcome = harness.supervisor.reload_commands(&bot_id("slowpoke")).await;

    assert!(matches!(
        outcome,
        Err(SupervisorError::InstanceNotReady {
            phase: ConnectionPhase::Connecting,
            ..
        })
    ));
    assert!(
        harness
            .supervisor
            .wait_until_ready(&bot_id("slowpoke"), WAIT)
            .await
            .is_ok()
    );
}
