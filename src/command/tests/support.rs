//! Shared fixtures for command tests.

use crate::command::domain::{
    BotIdentity, ChannelRef, ExecutionContext, GroupRef, InvocationOrigin, UserRef,
};
use crate::command::ports::{ReplyResult, ReplySink};
use async_trait::async_trait;
use mockable::DefaultClock;
use std::sync::Mutex;

/// Reply sink that records every message.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("sink lock")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, channel: &ChannelRef, content: &str) -> ReplyResult<()> {
        self.sent
            .lock()
            .expect("sink lock")
            .push((channel.id.clone(), content.to_owned()));
        Ok(())
    }
}

pub fn context_for(user: &str, trigger: &str, args: &[&str]) -> ExecutionContext {
    let origin = InvocationOrigin {
        user: UserRef::new("1001", user),
        group: Some(GroupRef::new("g1", "Test Guild", 3)),
        channel: ChannelRef::named("c1", "general"),
    };
    ExecutionContext::new(
        origin,
        BotIdentity::new("b1", "testbot"),
        "!",
        trigger,
        args.iter().map(|arg| (*arg).to_owned()).collect(),
        &DefaultClock,
    )
}
