//! Scriptable in-memory bot platform.

use crate::command::domain::{BotIdentity, ChannelRef, GroupRef};
use crate::command::ports::{ReplyError, ReplyResult, ReplySink};
use crate::instance::{
    domain::BotId,
    ports::{
        BotGateway, ConnectRequest, GatewayError, GatewayEvent, GatewayResult, GatewaySession,
        InboundMessage, SlashInvocation,
    },
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Reply recorded by [`InMemoryBotGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    /// Bot that sent the reply.
    pub bot_id: BotId,
    /// Target channel identifier.
    pub channel_id: String,
    /// Reply text.
    pub content: String,
}

/// In-memory gateway adapter.
///
/// Models the platform without any network: connecting succeeds unless the
/// token was rejected or failures were injected, events are pushed by the
/// test through [`Self::deliver_message`] and friends, and replies are
/// recorded for inspection. A close delay simulates a teardown that hangs.
#[derive(Debug, Clone)]
pub struct InMemoryBotGateway {
    shared: Arc<GatewayShared>,
}

#[derive(Debug)]
struct GatewayShared {
    state: RwLock<GatewayState>,
    reply_count: watch::Sender<usize>,
}

#[derive(Debug, Default)]
struct GatewayState {
    rejected_tokens: HashSet<String>,
    connect_failure: Option<String>,
    connect_delay: Option<Duration>,
    close_delay: Option<Duration>,
    groups: Vec<GroupRef>,
    sessions: HashMap<BotId, mpsc::UnboundedSender<GatewayEvent>>,
    connections: HashMap<BotId, usize>,
    replies: Vec<SentReply>,
    synced: HashMap<BotId, Vec<String>>,
}

fn lock_error(err: impl ToString) -> GatewayError {
    GatewayError::runtime(std::io::Error::other(err.to_string()))
}

impl Default for InMemoryBotGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBotGateway {
    /// Creates a gateway that accepts every token.
    #[must_use]
    pub fn new() -> Self {
        let (reply_count, _) = watch::channel(0);
        Self {
            shared: Arc::new(GatewayShared {
                state: RwLock::new(GatewayState::default()),
                reply_count,
            }),
        }
    }

    fn write<T>(&self, apply: impl FnOnce(&mut GatewayState) -> T) -> GatewayResult<T> {
        let mut state = self.shared.state.write().map_err(lock_error)?;
        Ok(apply(&mut state))
    }

    fn read<T>(&self, inspect: impl FnOnce(&GatewayState) -> T) -> GatewayResult<T> {
        let state = self.shared.state.read().map_err(lock_error)?;
        Ok(inspect(&state))
    }

    /// Makes the platform refuse `token`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn reject_token(&self, token: impl Into<String>) -> GatewayResult<()> {
        let rejected = token.into();
        self.write(|state| {
            state.rejected_tokens.insert(rejected);
        })
    }

    /// Makes every connection attempt fail with `detail`, or clears the
    /// failure when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn fail_connections(&self, detail: Option<String>) -> GatewayResult<()> {
        self.write(|state| state.connect_failure = detail)
    }

    /// Delays every handshake by `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn set_connect_delay(&self, delay: Option<Duration>) -> GatewayResult<()> {
        self.write(|state| state.connect_delay = delay)
    }

    /// Delays every `close` by `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn set_close_delay(&self, delay: Option<Duration>) -> GatewayResult<()> {
        self.write(|state| state.close_delay = delay)
    }

    /// Sets the groups reported in `Ready` events.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn set_groups(&self, groups: Vec<GroupRef>) -> GatewayResult<()> {
        self.write(|state| state.groups = groups)
    }

    fn push(&self, bot_id: &BotId, event: GatewayEvent) -> GatewayResult<()> {
        let sender = self
            .read(|state| state.sessions.get(bot_id).cloned())?
            .ok_or_else(|| GatewayError::NotConnected(bot_id.clone()))?;
        sender
            .send(event)
            .map_err(|_| GatewayError::NotConnected(bot_id.clone()))
    }

    /// Delivers a message to the bot's live connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] when the bot has no open
    /// connection.
    pub fn deliver_message(&self, bot_id: &BotId, message: InboundMessage) -> GatewayResult<()> {
        self.push(bot_id, GatewayEvent::Message(message))
    }

    /// Delivers a slash-command interaction to the bot's live connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] when the bot has no open
    /// connection.
    pub fn deliver_slash(&self, bot_id: &BotId, invocation: SlashInvocation) -> GatewayResult<()> {
        self.push(bot_id, GatewayEvent::SlashCommand(invocation))
    }

    /// Simulates a network drop on the bot's connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] when the bot has no open
    /// connection.
    pub fn drop_connection(&self, bot_id: &BotId, reason: impl Into<String>) -> GatewayResult<()> {
        self.push(
            bot_id,
            GatewayEvent::Disconnected {
                reason: reason.into(),
            },
        )
    }

    /// Returns whether the bot has an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn is_connected(&self, bot_id: &BotId) -> GatewayResult<bool> {
        self.read(|state| state.sessions.contains_key(bot_id))
    }

    /// Returns how many times the bot connected.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn connection_count(&self, bot_id: &BotId) -> GatewayResult<usize> {
        self.read(|state| state.connections.get(bot_id).copied().unwrap_or_default())
    }

    /// Returns the slash-command names last synced by the bot.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn synced_slash_commands(&self, bot_id: &BotId) -> GatewayResult<Vec<String>> {
        self.read(|state| state.synced.get(bot_id).cloned().unwrap_or_default())
    }

    /// Returns every reply recorded so far.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub fn replies(&self) -> GatewayResult<Vec<SentReply>> {
        self.read(|state| state.replies.clone())
    }

    /// Waits until at least `count` replies were recorded or `timeout`
    /// elapses, then returns the recorded replies.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Runtime`] when lock acquisition fails.
    pub async fn wait_for_replies(
        &self,
        count: usize,
        timeout: Duration,
    ) -> GatewayResult<Vec<SentReply>> {
        let mut observed = self.shared.reply_count.subscribe();
        let reached = tokio::time::timeout(timeout, observed.wait_for(|seen| *seen >= count)).await;
        drop(reached);
        self.replies()
    }
}

#[async_trait]
impl BotGateway for InMemoryBotGateway {
    async fn connect(&self, request: &ConnectRequest) -> GatewayResult<Box<dyn GatewaySession>> {
        if let Some(delay) = self.read(|state| state.connect_delay)? {
            tokio::time::sleep(delay).await;
        }

        let (sender, events) = mpsc::unbounded_channel();
        let token = request.token.expose().to_owned();
        let bot_id = request.bot_id.clone();
        let groups = self.write(|state| {
            if state.rejected_tokens.contains(&token) {
                return Err(GatewayError::AuthenticationRejected);
            }
            if let Some(detail) = &state.connect_failure {
                return Err(GatewayError::Connect(detail.clone()));
            }
            state.sessions.insert(bot_id.clone(), sender.clone());
            let connections = state.connections.entry(bot_id.clone()).or_default();
            *connections = connections.saturating_add(1);
            Ok(state.groups.clone())
        })??;

        let bot = BotIdentity::new(format!("{bot_id}-user"), bot_id.as_str());
        sender
            .send(GatewayEvent::Ready { bot, groups })
            .map_err(|_| GatewayError::NotConnected(bot_id.clone()))?;

        Ok(Box::new(InMemoryGatewaySession {
            bot_id,
            events,
            sender,
            gateway: self.clone(),
        }))
    }
}

struct InMemoryGatewaySession {
    bot_id: BotId,
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    sender: mpsc::UnboundedSender<GatewayEvent>,
    gateway: InMemoryBotGateway,
}

#[async_trait]
impl GatewaySession for InMemoryGatewaySession {
    async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }

    async fn reconnect(&mut self) -> GatewayResult<()> {
        if let Some(detail) = self.gateway.read(|state| state.connect_failure.clone())? {
            return Err(GatewayError::Connect(detail));
        }
        self.sender
            .send(GatewayEvent::Resumed)
            .map_err(|_| GatewayError::NotConnected(self.bot_id.clone()))
    }

    async fn close(&mut self) -> GatewayResult<()> {
        if let Some(delay) = self.gateway.read(|state| state.close_delay)? {
            tokio::time::sleep(delay).await;
        }
        let bot_id = self.bot_id.clone();
        let own_sender = self.sender.clone();
        self.gateway.write(|state| {
            if state
                .sessions
                .get(&bot_id)
                .is_some_and(|current| current.same_channel(&own_sender))
            {
                state.sessions.remove(&bot_id);
            }
        })
    }

    async fn sync_slash_commands(&mut self, names: &[String]) -> GatewayResult<()> {
        let bot_id = self.bot_id.clone();
        let synced = names.to_vec();
        self.gateway.write(|state| {
            state.synced.insert(bot_id, synced);
        })
    }

    fn reply_sink(&self) -> Arc<dyn ReplySink> {
        Arc::new(InMemoryReplySink {
            bot_id: self.bot_id.clone(),
            sender: self.sender.clone(),
            gateway: self.gateway.clone(),
        })
    }
}

impl Drop for InMemoryGatewaySession {
    fn drop(&mut self) {
        let bot_id = self.bot_id.clone();
        let own_sender = self.sender.clone();
        let _cleared = self.gateway.write(|state| {
            if state
                .sessions
                .get(&bot_id)
                .is_some_and(|current| current.same_channel(&own_sender))
            {
                state.sessions.remove(&bot_id);
            }
        });
    }
}

struct InMemoryReplySink {
    bot_id: BotId,
    sender: mpsc::UnboundedSender<GatewayEvent>,
    gateway: InMemoryBotGateway,
}

#[async_trait]
impl ReplySink for InMemoryReplySink {
    async fn send(&self, channel: &ChannelRef, content: &str) -> ReplyResult<()> {
        if self.sender.is_closed() {
            return Err(ReplyError::ConnectionClosed);
        }
        let reply = SentReply {
            bot_id: self.bot_id.clone(),
            channel_id: channel.id.clone(),
            content: content.to_owned(),
        };
        let recorded = self
            .gateway
            .write(|state| {
                state.replies.push(reply);
                state.replies.len()
            })
            .map_err(ReplyError::delivery)?;
        self.gateway.shared.reply_count.send_replace(recorded);
        Ok(())
    }
}
