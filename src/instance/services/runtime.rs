//! Per-instance event loop.
//!
//! Every instance runs on its own OS thread with a current-thread tokio
//! runtime and a `LocalSet`. The Lua VM, the live [`CommandRegistry`] and
//! the gateway session never leave that thread; the supervisor reaches the
//! loop only through the control channel and observes it only through the
//! published [`RuntimeInstanceState`].

use super::control::{ControlRequest, InstanceHandle, ReloadAck, ReloadRejection};
use super::{LifecycleNotifier, SupervisorConfig};
use crate::command::domain::{
    BotIdentity, CommandDefinition, ExecutionContext, GroupRef, HandlerScope, InvocationOrigin,
};
use crate::command::ports::ReplySink;
use crate::command::services::{
    BoundCommand, CommandRegistry, RebuildReport, VariableSubstitutionEngine,
};
use crate::command::validation::CommandValidator;
use crate::instance::{
    domain::{BotConfig, BotId, ConnectionPhase, RuntimeInstanceState},
    ports::{
        BotGateway, ConnectRequest, GatewayEvent, GatewayResult, GatewaySession, InboundMessage,
        LifecycleEvent, SlashInvocation,
    },
};
use mockable::Clock;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::LocalSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type Session = Box<dyn GatewaySession>;

/// Everything an instance thread needs to run.
pub(super) struct LaunchSpec<G, C> {
    pub(super) config: BotConfig,
    pub(super) definitions: Vec<CommandDefinition>,
    pub(super) gateway: Arc<G>,
    pub(super) clock: Arc<C>,
    pub(super) validator: Arc<CommandValidator>,
    pub(super) engine: Arc<VariableSubstitutionEngine>,
    pub(super) notifier: Arc<LifecycleNotifier>,
    pub(super) settings: SupervisorConfig,
}

/// Spawns the instance thread and returns the handle the supervisor keeps.
///
/// The handshake happens on the new thread; returning `Ok` means the launch
/// was accepted, not that the bot is connected.
pub(super) fn launch<G, C>(spec: LaunchSpec<G, C>) -> std::io::Result<InstanceHandle>
where
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    let bot_id = spec.config.id.clone();
    let (control_tx, control_rx) = mpsc::channel(spec.settings.control_buffer.max(1));
    let initial = RuntimeInstanceState::new(bot_id.clone(), spec.config.prefix.as_str(), &*spec.clock);
    let (state_tx, state_rx) = watch::channel(initial);
    let handle = InstanceHandle::new(spec.config.clone(), control_tx, state_rx);

    std::thread::Builder::new()
        .name(format!("bot-{bot_id}"))
        .spawn(move || run_thread(spec, state_tx, control_rx))?;
    Ok(handle)
}

fn run_thread<G, C>(
    spec: LaunchSpec<G, C>,
    state: watch::Sender<RuntimeInstanceState>,
    control: mpsc::Receiver<ControlRequest>,
) where
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            fail_before_loop(&state, &*spec.clock, &format!("event loop unavailable: {err}"));
            return;
        }
    };
    let registry = CommandRegistry::new(Arc::clone(&spec.validator), Arc::clone(&spec.engine));

    let instance = BotInstance::new(spec, state, registry);
    LocalSet::new().block_on(&runtime, instance.run(control));
}

fn fail_before_loop(
    state: &watch::Sender<RuntimeInstanceState>,
    clock: &impl Clock,
    reason: &str,
) {
    state.send_modify(|snapshot| {
        let failed = snapshot
            .transition_to(ConnectionPhase::Connecting, clock)
            .and_then(|()| snapshot.fail(reason, clock));
        if let Err(err) = failed {
            warn!(bot_id = %snapshot.bot_id(), error = %err, "could not record launch failure");
        }
    });
    error!(reason, "instance failed before its event loop started");
}

fn acknowledge<T>(ack: oneshot::Sender<T>, value: T) {
    if ack.send(value).is_err() {
        debug!("control requester stopped waiting for acknowledgement");
    }
}

/// Splits `content` into a trigger and arguments when it starts with
/// `prefix`.
fn parse_invocation(prefix: &str, content: &str) -> Option<(String, Vec<String>)> {
    let body = content.strip_prefix(prefix)?;
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    let mut words = body.split_whitespace();
    let trigger = words.next()?.to_owned();
    Some((trigger, words.map(str::to_owned).collect()))
}

struct Backoff {
    next_attempt: Option<Instant>,
    delay: Duration,
}

struct BotInstance<G, C> {
    config: BotConfig,
    definitions: Vec<CommandDefinition>,
    gateway: Arc<G>,
    clock: Arc<C>,
    notifier: Arc<LifecycleNotifier>,
    settings: SupervisorConfig,
    state: Rc<watch::Sender<RuntimeInstanceState>>,
    registry: CommandRegistry,
    bot: Option<BotIdentity>,
    backoff: Backoff,
}

impl<G, C> BotInstance<G, C>
where
    G: BotGateway + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn new(
        spec: LaunchSpec<G, C>,
        state: watch::Sender<RuntimeInstanceState>,
        registry: CommandRegistry,
    ) -> Self {
        let backoff = Backoff {
            next_attempt: None,
            delay: spec.settings.reconnect_initial,
        };
        Self {
            config: spec.config,
            definitions: spec.definitions,
            gateway: spec.gateway,
            clock: spec.clock,
            notifier: spec.notifier,
            settings: spec.settings,
            state: Rc::new(state),
            registry,
            bot: None,
            backoff,
        }
    }

    async fn run(mut self, mut control: mpsc::Receiver<ControlRequest>) {
        if !self.enter(ConnectionPhase::Connecting) {
            return;
        }
        let Some(mut session) = self.connect(&mut control).await else {
            return;
        };
        let sink = session.reply_sink();
        while self.step(&mut control, &mut session, &sink).await.is_continue() {}
    }

    async fn connect(&self, control: &mut mpsc::Receiver<ControlRequest>) -> Option<Session> {
        let connect_request = ConnectRequest {
            bot_id: self.config.id.clone(),
            token: self.config.token.clone(),
            presence: self.config.presence.clone(),
        };
        let gateway = Arc::clone(&self.gateway);
        let mut connecting = gateway.connect(&connect_request);

        loop {
            tokio::select! {
                result = &mut connecting => return self.connected(result),
                request = control.recv() => {
                    if self.control_while_connecting(request).await.is_break() {
                        return None;
                    }
                }
            }
        }
    }

    fn connected(&self, result: GatewayResult<Session>) -> Option<Session> {
        result
            .map_err(|err| self.fail(&format!("connect failed: {err}")))
            .ok()
    }

    async fn control_while_connecting(&self, request: Option<ControlRequest>) -> ControlFlow<()> {
        match request {
            Some(ControlRequest::Reload { ack, .. }) => {
                acknowledge(ack, Err(ReloadRejection::NotReady(self.phase())));
                ControlFlow::Continue(())
            }
            Some(ControlRequest::Stop { ack }) => {
                self.shutdown(None).await;
                acknowledge(ack, ());
                ControlFlow::Break(())
            }
            None => {
                self.shutdown(None).await;
                ControlFlow::Break(())
            }
        }
    }

    async fn step(
        &mut self,
        control: &mut mpsc::Receiver<ControlRequest>,
        session: &mut Session,
        sink: &Arc<dyn ReplySink>,
    ) -> ControlFlow<()> {
        let deadline = self.backoff.next_attempt;
        tokio::select! {
            request = control.recv() => self.on_control(request, session).await,
            next = session.next_event() => self.on_event(next, session, sink).await,
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.attempt_reconnect(session).await;
                ControlFlow::Continue(())
            }
        }
    }

    async fn on_control(
        &mut self,
        request: Option<ControlRequest>,
        session: &mut Session,
    ) -> ControlFlow<()> {
        match request {
            Some(ControlRequest::Stop { ack }) => {
                self.shutdown(Some(session)).await;
                acknowledge(ack, ());
                ControlFlow::Break(())
            }
            Some(ControlRequest::Reload { definitions, ack }) => {
                let outcome = self.reload(session, &definitions).await;
                acknowledge(ack, outcome);
                ControlFlow::Continue(())
            }
            None => {
                warn!(bot_id = %self.config.id, "control channel closed, stopping");
                self.shutdown(Some(session)).await;
                ControlFlow::Break(())
            }
        }
    }

    async fn on_event(
        &mut self,
        next: Option<GatewayEvent>,
        session: &mut Session,
        sink: &Arc<dyn ReplySink>,
    ) -> ControlFlow<()> {
        let Some(event) = next else {
            self.on_stream_end();
            return ControlFlow::Break(());
        };
        match event {
            GatewayEvent::Ready { bot, groups } => self.on_ready(bot, groups, session).await,
            GatewayEvent::Message(message) => self.dispatch_message(message, sink),
            GatewayEvent::SlashCommand(invocation) => self.dispatch_slash(invocation, sink),
            GatewayEvent::Disconnected { reason } => self.on_disconnected(&reason),
            GatewayEvent::Resumed => self.on_resumed(),
        }
        ControlFlow::Continue(())
    }

    async fn on_ready(&mut self, bot: BotIdentity, groups: Vec<GroupRef>, session: &mut Session) {
        let previous = self.phase();
        let already_ready = previous == ConnectionPhase::Ready;
        if !already_ready && !previous.can_transition_to(ConnectionPhase::Ready) {
            debug!(bot_id = %self.config.id, phase = %previous, "ignoring ready event");
            return;
        }
        self.backoff.next_attempt = None;
        self.backoff.delay = self.settings.reconnect_initial;
        self.bot = Some(bot.clone());
        let group_count = groups.len();
        self.publish(|state| state.capture_connection(bot, groups));

        // Handlers are bound before the phase is published as ready.
        if previous == ConnectionPhase::Connecting {
            let definitions = std::mem::take(&mut self.definitions);
            self.install(session, &definitions).await;
        }
        if !already_ready && !self.enter(ConnectionPhase::Ready) {
            return;
        }
        info!(bot_id = %self.config.id, groups = group_count, "instance ready");
    }

    async fn reload(&mut self, session: &mut Session, definitions: &[CommandDefinition]) -> ReloadAck {
        let phase = self.phase();
        if !phase.accepts_reload() {
            return Err(ReloadRejection::NotReady(phase));
        }
        let report = self.install(session, definitions).await;
        info!(
            bot_id = %self.config.id,
            installed = report.installed.len(),
            failed = report.failed.len(),
            "commands reloaded"
        );
        Ok(report)
    }

    async fn install(
        &mut self,
        session: &mut Session,
        definitions: &[CommandDefinition],
    ) -> RebuildReport {
        let report = self.registry.rebuild(definitions);
        let prefix_count = self.registry.prefix_count();
        let slash_count = self.registry.slash_count();
        let failed = report.failed_labels();
        self.publish(|state| state.record_registry(prefix_count, slash_count, failed));

        let names = self.registry.slash_names();
        if let Err(err) = session.sync_slash_commands(&names).await {
            warn!(bot_id = %self.config.id, error = %err, "slash command sync failed");
            self.record_error(&format!("slash command sync failed: {err}"));
        }
        report
    }

    fn on_disconnected(&mut self, reason: &str) {
        if !matches!(
            self.phase(),
            ConnectionPhase::Ready | ConnectionPhase::Reconnecting
        ) {
            debug!(bot_id = %self.config.id, reason, "ignoring disconnect outside an open connection");
            return;
        }
        if self.enter(ConnectionPhase::Disconnected) {
            warn!(bot_id = %self.config.id, reason, "connection dropped");
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        self.backoff.next_attempt = Some(Instant::now() + self.backoff.delay);
    }

    async fn attempt_reconnect(&mut self, session: &mut Session) {
        self.backoff.next_attempt = None;
        if !self.enter(ConnectionPhase::Reconnecting) {
            return;
        }
        if let Err(err) = session.reconnect().await {
            warn!(bot_id = %self.config.id, error = %err, "reconnect attempt failed");
            self.record_error(&format!("reconnect failed: {err}"));
            self.backoff.delay = self.settings.next_backoff(self.backoff.delay);
            if self.enter(ConnectionPhase::Disconnected) {
                self.schedule_reconnect();
            }
        }
    }

    fn on_resumed(&mut self) {
        if self.phase() == ConnectionPhase::Disconnected {
            self.backoff.next_attempt = None;
            self.enter(ConnectionPhase::Reconnecting);
        }
        if self.phase() == ConnectionPhase::Reconnecting && self.enter(ConnectionPhase::Ready) {
            self.backoff.delay = self.settings.reconnect_initial;
            info!(bot_id = %self.config.id, "connection resumed");
        }
    }

    fn on_stream_end(&self) {
        let reason = "gateway event stream ended";
        if self.phase() == ConnectionPhase::Ready {
            self.fail(reason);
            return;
        }
        self.record_error(reason);
        self.enter(ConnectionPhase::Stopping);
        self.enter(ConnectionPhase::Stopped);
    }

    async fn shutdown(&self, session: Option<&mut Session>) {
        self.enter(ConnectionPhase::Stopping);
        if let Some(active) = session {
            match tokio::time::timeout(self.settings.graceful_close_timeout, active.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(bot_id = %self.config.id, error = %err, "connection close failed"),
                Err(_) => warn!(bot_id = %self.config.id, "connection close timed out"),
            }
        }
        self.enter(ConnectionPhase::Stopped);
        info!(bot_id = %self.config.id, "instance stopped");
    }

    fn dispatch_message(&self, message: InboundMessage, sink: &Arc<dyn ReplySink>) {
        if self.phase() != ConnectionPhase::Ready {
            return;
        }
        let Some((trigger, args)) = parse_invocation(self.config.prefix.as_str(), &message.content)
        else {
            return;
        };
        let origin = InvocationOrigin {
            user: message.author,
            group: message.group,
            channel: message.channel,
        };
        self.dispatch(HandlerScope::Prefix, &trigger, args, origin, sink);
    }

    fn dispatch_slash(&self, invocation: SlashInvocation, sink: &Arc<dyn ReplySink>) {
        if self.phase() != ConnectionPhase::Ready {
            return;
        }
        let origin = InvocationOrigin {
            user: invocation.author,
            group: invocation.group,
            channel: invocation.channel,
        };
        self.dispatch(HandlerScope::Slash, &invocation.name, invocation.options, origin, sink);
    }

    fn dispatch(
        &self,
        scope: HandlerScope,
        trigger: &str,
        args: Vec<String>,
        origin: InvocationOrigin,
        sink: &Arc<dyn ReplySink>,
    ) {
        let Some(command) = self.registry.get(scope, trigger) else {
            debug!(bot_id = %self.config.id, trigger, %scope, "no handler bound");
            return;
        };
        let bot = self
            .bot
            .clone()
            .unwrap_or_else(|| BotIdentity::new(self.config.id.as_str(), self.config.id.as_str()));
        let context = ExecutionContext::new(
            origin,
            bot,
            self.config.prefix.as_str(),
            trigger,
            args,
            &*self.clock,
        );
        self.publish(|state| state.record_invocation(trigger, &*self.clock));
        self.notifier.notify(&LifecycleEvent::CommandInvoked {
            bot_id: self.config.id.clone(),
            trigger: trigger.to_owned(),
            user_id: context.user.id.clone(),
            invocation_id: context.invocation_id,
        });
        debug!(bot_id = %self.config.id, trigger, invocation_id = %context.invocation_id, "dispatching command");

        let task = InvocationTask {
            bot_id: self.config.id.clone(),
            command,
            context,
            sink: Arc::clone(sink),
            state: Rc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            notifier: Arc::clone(&self.notifier),
        };
        drop(tokio::task::spawn_local(task.run()));
    }

    fn phase(&self) -> ConnectionPhase {
        self.state.borrow().phase()
    }

    fn publish(&self, apply: impl FnOnce(&mut RuntimeInstanceState)) {
        self.state.send_modify(apply);
    }

    fn enter(&self, target: ConnectionPhase) -> bool {
        let mut outcome = Ok(());
        self.publish(|state| outcome = state.transition_to(target, &*self.clock));
        match outcome {
            Ok(()) => {
                info!(bot_id = %self.config.id, phase = %target, "instance phase changed");
                true
            }
            Err(err) => {
                warn!(bot_id = %self.config.id, error = %err, "phase change refused");
                false
            }
        }
    }

    fn fail(&self, reason: &str) {
        let mut outcome = Ok(());
        self.publish(|state| outcome = state.fail(reason, &*self.clock));
        if let Err(err) = outcome {
            warn!(bot_id = %self.config.id, error = %err, "could not mark instance failed");
        }
        error!(bot_id = %self.config.id, reason, "instance failed");
        self.notifier.notify(&LifecycleEvent::InstanceError {
            bot_id: self.config.id.clone(),
            message: reason.to_owned(),
        });
    }

    fn record_error(&self, message: &str) {
        self.publish(|state| state.record_error(message, &*self.clock));
    }
}

/// One dispatched invocation, run as a local task.
struct InvocationTask<C> {
    bot_id: BotId,
    command: Rc<BoundCommand>,
    context: ExecutionContext,
    sink: Arc<dyn ReplySink>,
    state: Rc<watch::Sender<RuntimeInstanceState>>,
    clock: Arc<C>,
    notifier: Arc<LifecycleNotifier>,
}

impl<C: Clock> InvocationTask<C> {
    async fn run(self) {
        let Err(err) = self.command.execute(&self.context, &self.sink).await else {
            return;
        };
        let message = err.to_string();
        warn!(
            bot_id = %self.bot_id,
            trigger = %self.command.trigger(),
            invocation_id = %self.context.invocation_id,
            error = %message,
            "command handler failed"
        );
        let notice = format!("Error: {message}");
        if let Err(reply_err) = self.sink.send(&self.context.channel, &notice).await {
            debug!(bot_id = %self.bot_id, error = %reply_err, "could not report handler failure");
        }
        let trigger = self.command.trigger().as_str();
        self.state.send_modify(|state| {
            state.record_command_failure(trigger, message.as_str(), &*self.clock);
        });
        self.notifier.notify(&LifecycleEvent::InstanceError {
            bot_id: self.bot_id,
            message,
        });
    }
}
