//! Shared harness for in-memory supervision tests.

use botvisor::command::domain::{ChannelRef, CommandDefinition, GroupRef, UserRef};
use botvisor::command::validation::{CommandValidator, ValidatorConfig};
use botvisor::instance::{
    adapters::{InMemoryBotGateway, SentReply, memory::InMemoryBotStore},
    domain::{BotConfig, BotId, BotToken, RuntimeInstanceState},
    ports::InboundMessage,
    services::{InstanceSupervisor, SupervisorConfig},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;

/// Supervisor wired to the in-memory adapters.
pub type TestSupervisor = InstanceSupervisor<InMemoryBotStore, InMemoryBotGateway, DefaultClock>;

/// How long tests wait for asynchronous effects.
pub const WAIT: Duration = Duration::from_secs(5);

/// A token long enough to pass the credential check.
pub const VALID_TOKEN: &str = "token-0123456789";

/// Store, gateway and supervisor sharing state.
pub struct Harness {
    /// Persistence collaborator seen by the supervisor.
    pub store: InMemoryBotStore,
    /// Platform double used to inject events and read replies.
    pub gateway: InMemoryBotGateway,
    /// Supervisor under test.
    pub supervisor: Arc<TestSupervisor>,
}

/// Settings with short timeouts so failure paths finish quickly.
#[must_use]
pub fn fast_settings() -> SupervisorConfig {
    SupervisorConfig {
        stop_timeout: Duration::from_millis(300),
        control_ack_timeout: Duration::from_secs(2),
        graceful_close_timeout: Duration::from_secs(2),
        reconnect_initial: Duration::from_millis(20),
        reconnect_max: Duration::from_millis(100),
        ..SupervisorConfig::default()
    }
}

/// Builds a harness with `settings`.
#[must_use]
pub fn harness_with(settings: SupervisorConfig) -> Harness {
    let store = InMemoryBotStore::new();
    let gateway = InMemoryBotGateway::new();
    let validator =
        CommandValidator::new(ValidatorConfig::default()).expect("default validator config");
    let supervisor = InstanceSupervisor::new(
        Arc::new(store.clone()),
        Arc::new(gateway.clone()),
        Arc::new(DefaultClock),
        settings,
        Arc::new(validator),
    );
    Harness {
        store,
        gateway,
        supervisor: Arc::new(supervisor),
    }
}

/// Provides a harness with fast settings.
#[fixture]
pub fn harness() -> Harness {
    harness_with(fast_settings())
}

/// Parses a bot identifier.
#[must_use]
pub fn bot_id(raw: &str) -> BotId {
    BotId::new(raw).expect("valid bot id")
}

/// Builds a configuration with a valid token.
#[must_use]
pub fn config(raw: &str) -> BotConfig {
    BotConfig::new(bot_id(raw), BotToken::new(VALID_TOKEN))
}

/// Builds a message posted in a guild channel.
#[must_use]
pub fn message(user: &str, content: &str) -> InboundMessage {
    InboundMessage {
        author: UserRef::new(format!("id-{user}"), user),
        group: Some(GroupRef::new("g1", "Test Guild", 3)),
        channel: ChannelRef::named("c1", "general"),
        content: content.to_owned(),
    }
}

impl Harness {
    /// Stores `config` and `definitions`.
    pub fn seed(&self, bot: &BotConfig, definitions: &[CommandDefinition]) {
        self.store.insert_bot(bot.clone()).expect("bot stored");
        for definition in definitions {
            self.store
                .upsert_command(&bot.id, definition.clone())
                .expect("definition stored");
        }
    }

    /// Seeds, starts and waits for the bot to become ready.
    pub async fn start_ready(
        &self,
        raw: &str,
        definitions: &[CommandDefinition],
    ) -> RuntimeInstanceState {
        let bot = config(raw);
        self.seed(&bot, definitions);
        self.supervisor.start(bot).await.expect("start accepted");
        self.supervisor
            .wait_until_ready(&bot_id(raw), WAIT)
            .await
            .expect("instance ready")
    }

    /// Delivers `content` from `user` and waits for the `expected`-th reply
    /// overall.
    pub async fn say(
        &self,
        raw: &str,
        user: &str,
        content: &str,
        expected: usize,
    ) -> Vec<SentReply> {
        self.gateway
            .deliver_message(&bot_id(raw), message(user, content))
            .expect("message delivered");
        self.gateway
            .wait_for_replies(expected, WAIT)
            .await
            .expect("replies readable")
    }
}

/// Returns reply texts in order.
#[must_use]
pub fn texts(replies: &[SentReply]) -> Vec<String> {
    replies.iter().map(|reply| reply.content.clone()).collect()
}

/// Polls until the state of `raw` satisfies `accept` or [`WAIT`] elapses;
/// returns the last observed state.
pub async fn wait_for_state(
    harness: &Harness,
    raw: &str,
    accept: impl Fn(&RuntimeInstanceState) -> bool,
) -> Option<RuntimeInstanceState> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let state = harness.supervisor.status(&bot_id(raw));
        let reached = state.as_ref().is_some_and(&accept);
        if reached || tokio::time::Instant::now() >= deadline {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
