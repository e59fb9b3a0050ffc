//! Invocation of registered script handlers.

use super::ScriptError;
use crate::command::domain::ExecutionContext;
use crate::command::ports::ReplySink;
use mlua::{Function, Lua, Table};
use std::sync::Arc;
use std::time::Duration;

/// A Lua handler together with the VM that owns it.
///
/// Holding the VM keeps it alive for in-flight invocations after a reload
/// has replaced the registry that produced the handler.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    lua: Lua,
    function: Function,
}

impl ScriptFunction {
    pub(super) const fn new(lua: Lua, function: Function) -> Self {
        Self { lua, function }
    }

    /// Runs the handler as a coroutine with a `ctx` table built from
    /// `context`.
    ///
    /// A string returned by the handler is passed back to the caller to be
    /// sent as a reply.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Runtime`] when the handler raises or the
    /// context table cannot be built.
    pub async fn invoke(
        &self,
        context: &ExecutionContext,
        sink: &Arc<dyn ReplySink>,
    ) -> Result<Option<String>, ScriptError> {
        let table =
            context_table(&self.lua, context, sink).map_err(|err| ScriptError::runtime(&err))?;
        self.function
            .call_async::<Option<String>>(table)
            .await
            .map_err(|err| ScriptError::runtime(&err))
    }
}

fn context_table(
    lua: &Lua,
    context: &ExecutionContext,
    sink: &Arc<dyn ReplySink>,
) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let user = lua.create_table()?;
    user.set("id", context.user.id.as_str())?;
    user.set("name", context.user.name.as_str())?;
    user.set("display_name", context.user.shown_name())?;
    user.set("mention", context.user.mention())?;
    table.set("user", user)?;

    if let Some(group) = &context.group {
        let group_table = lua.create_table()?;
        group_table.set("id", group.id.as_str())?;
        group_table.set("name", group.name.as_str())?;
        group_table.set("member_count", group.member_count)?;
        table.set("group", group_table)?;
    }

    let channel = lua.create_table()?;
    channel.set("id", context.channel.id.as_str())?;
    channel.set("name", context.channel.name.as_deref())?;
    table.set("channel", channel)?;

    let bot = lua.create_table()?;
    bot.set("id", context.bot.id.as_str())?;
    bot.set("name", context.bot.name.as_str())?;
    table.set("bot", bot)?;

    table.set(
        "args",
        lua.create_sequence_from(context.args.iter().map(String::as_str))?,
    )?;
    table.set("raw_args", context.raw_args())?;
    table.set("prefix", context.prefix.as_str())?;
    table.set("trigger", context.trigger.as_str())?;
    table.set("timestamp", context.timestamp.to_rfc3339())?;
    table.set("invocation_id", context.invocation_id.to_string())?;

    let reply = reply_function(lua, context, Arc::clone(sink))?;
    table.set("reply", reply.clone())?;
    table.set("send", reply)?;
    table.set(
        "sleep",
        lua.create_async_function(|_, (_ctx, millis): (Table, u64)| async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(())
        })?,
    )?;

    Ok(table)
}

fn reply_function(
    lua: &Lua,
    context: &ExecutionContext,
    sink: Arc<dyn ReplySink>,
) -> mlua::Result<Function> {
    let channel = context.channel.clone();
    lua.create_async_function(move |_, (_ctx, text): (Table, String)| {
        let target_sink = Arc::clone(&sink);
        let target_channel = channel.clone();
        async move {
            target_sink
                .send(&target_channel, &text)
                .await
                .map_err(mlua::Error::external)
        }
    })
}
