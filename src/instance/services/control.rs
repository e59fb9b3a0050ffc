//! Control-plane side of an instance: requests, acknowledgements and the
//! published state.

use crate::command::domain::CommandDefinition;
use crate::command::services::RebuildReport;
use crate::instance::domain::{BotConfig, ConnectionPhase, RuntimeInstanceState};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Why an instance refused a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ReloadRejection {
    NotReady(ConnectionPhase),
}

pub(super) type ReloadAck = Result<RebuildReport, ReloadRejection>;

/// Unit of work submitted into an instance's event loop.
#[derive(Debug)]
pub(super) enum ControlRequest {
    Stop {
        ack: oneshot::Sender<()>,
    },
    Reload {
        definitions: Vec<CommandDefinition>,
        ack: oneshot::Sender<ReloadAck>,
    },
}

/// How a control request ended from the caller's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Delivery<T> {
    Acknowledged(T),
    TimedOut,
    /// The instance loop has exited.
    Gone,
}

/// Supervisor-held handle to a running instance.
#[derive(Debug, Clone)]
pub(super) struct InstanceHandle {
    config: BotConfig,
    control: mpsc::Sender<ControlRequest>,
    state: watch::Receiver<RuntimeInstanceState>,
}

impl InstanceHandle {
    pub(super) const fn new(
        config: BotConfig,
        control: mpsc::Sender<ControlRequest>,
        state: watch::Receiver<RuntimeInstanceState>,
    ) -> Self {
        Self {
            config,
            control,
            state,
        }
    }

    pub(super) const fn config(&self) -> &BotConfig {
        &self.config
    }

    pub(super) fn snapshot(&self) -> RuntimeInstanceState {
        self.state.borrow().clone()
    }

    /// Whether the instance still counts as running.
    pub(super) fn is_active(&self) -> bool {
        self.state.borrow().phase().is_active() && !self.control.is_closed()
    }

    pub(super) fn watch_state(&self) -> watch::Receiver<RuntimeInstanceState> {
        self.state.clone()
    }

    pub(super) async fn request_stop(&self, timeout: Duration) -> Delivery<()> {
        let (ack, reply) = oneshot::channel();
        self.submit(ControlRequest::Stop { ack }, reply, timeout)
            .await
    }

    pub(super) async fn request_reload(
        &self,
        definitions: Vec<CommandDefinition>,
        timeout: Duration,
    ) -> Delivery<ReloadAck> {
        let (ack, reply) = oneshot::channel();
        self.submit(ControlRequest::Reload { definitions, ack }, reply, timeout)
            .await
    }

    async fn submit<T>(
        &self,
        request: ControlRequest,
        reply: oneshot::Receiver<T>,
        timeout: Duration,
    ) -> Delivery<T> {
        let exchange = async {
            if self.control.send(request).await.is_err() {
                return None;
            }
            reply.await.ok()
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(Some(value)) => Delivery::Acknowledged(value),
            Ok(None) => Delivery::Gone,
            Err(_) => Delivery::TimedOut,
        }
    }
}
