//! Lua VM owning the handlers registered by code-based definitions.

use super::{ScriptError, ScriptFunction, error::first_line};
use crate::command::domain::{CommandDefinition, HandlerScope, Trigger};
use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib};
use std::cell::RefCell;
use std::rc::Rc;

/// Instruction budget for running a definition's top-level chunk.
const LOAD_INSTRUCTION_LIMIT: u32 = 1_000_000;

/// Handler registered by a script through `bot.command` or
/// `bot.slash_command`.
#[derive(Debug, Clone)]
pub struct ScriptRegistration {
    /// Validated handler name.
    pub trigger: Trigger,
    /// Description passed to `bot.slash_command`.
    pub description: Option<String>,
    /// Surface the handler answers on.
    pub scope: HandlerScope,
    /// Callable handler.
    pub function: ScriptFunction,
}

#[derive(Debug)]
struct PendingRegistration {
    name: String,
    description: Option<String>,
    scope: HandlerScope,
    function: Function,
}

/// One Lua VM plus the `bot` registration table.
///
/// A host serves a single code-based definition; globals a script assigns
/// stay inside its own VM. The VM is not `Send`; a host lives on the thread
/// that created it.
#[derive(Debug)]
pub struct ScriptHost {
    lua: Lua,
    pending: Rc<RefCell<Vec<PendingRegistration>>>,
}

impl ScriptHost {
    /// Creates a VM with the table, string, math and utf8 libraries and
    /// installs the `bot` registration table.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Host`] when the VM or the registration table
    /// cannot be created.
    pub fn new() -> Result<Self, ScriptError> {
        let lua = new_vm().map_err(|err| ScriptError::Host(first_line(&err)))?;
        let pending = Rc::new(RefCell::new(Vec::new()));
        install_registration_table(&lua, &pending)
            .map_err(|err| ScriptError::Host(first_line(&err)))?;
        Ok(Self { lua, pending })
    }

    /// Runs a definition's chunk and returns the handlers it registered.
    ///
    /// The chunk runs under an instruction budget so a runaway top level
    /// cannot wedge the instance. Handler bodies run later, without one.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] when the chunk fails, registers nothing,
    /// registers an invalid name, or registers on the wrong surface.
    pub fn load(
        &self,
        definition: &CommandDefinition,
        max_trigger_length: usize,
    ) -> Result<Vec<ScriptRegistration>, ScriptError> {
        self.pending.borrow_mut().clear();
        let source = definition.source.as_deref().unwrap_or_default();
        let chunk = self
            .lua
            .load(source)
            .set_name(format!("=command:{}", definition.id));

        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(LOAD_INSTRUCTION_LIMIT),
            |_lua, _debug| {
                Err(mlua::Error::RuntimeError(format!(
                    "instruction limit exceeded ({LOAD_INSTRUCTION_LIMIT})"
                )))
            },
        );
        let outcome = chunk.exec();
        self.lua.remove_hook();

        outcome.map_err(|err| ScriptError::Load {
            definition: definition.id.clone(),
            message: first_line(&err),
        })?;

        let registered = std::mem::take(&mut *self.pending.borrow_mut());
        if registered.is_empty() {
            return Err(ScriptError::NoHandlers {
                definition: definition.id.clone(),
            });
        }

        let expected = definition.kind.scope();
        registered
            .into_iter()
            .map(|pending| self.resolve(definition, expected, pending, max_trigger_length))
            .collect()
    }

    fn resolve(
        &self,
        definition: &CommandDefinition,
        expected: HandlerScope,
        pending: PendingRegistration,
        max_trigger_length: usize,
    ) -> Result<ScriptRegistration, ScriptError> {
        if pending.scope != expected {
            return Err(ScriptError::ScopeMismatch {
                definition: definition.id.clone(),
                name: pending.name,
                expected,
                found: pending.scope,
            });
        }
        let trigger = Trigger::with_max_length(pending.name, max_trigger_length).map_err(
            |source| ScriptError::InvalidHandlerName {
                definition: definition.id.clone(),
                source,
            },
        )?;
        Ok(ScriptRegistration {
            trigger,
            description: pending.description,
            scope: pending.scope,
            function: ScriptFunction::new(self.lua.clone(), pending.function),
        })
    }
}

/// Parses `source` without running it.
///
/// # Errors
///
/// Returns [`ScriptError::Syntax`] with the parser message when the source
/// does not compile, or [`ScriptError::Host`] when no VM can be created.
pub fn check_syntax(source: &str) -> Result<(), ScriptError> {
    let lua = new_vm().map_err(|err| ScriptError::Host(first_line(&err)))?;
    lua.load(source)
        .set_name("=definition")
        .into_function()
        .map(drop)
        .map_err(|err| ScriptError::Syntax(first_line(&err)))
}

fn new_vm() -> mlua::Result<Lua> {
    Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
        LuaOptions::new(),
    )
}

fn install_registration_table(
    lua: &Lua,
    pending: &Rc<RefCell<Vec<PendingRegistration>>>,
) -> mlua::Result<()> {
    let bot = lua.create_table()?;

    let command_sink = Rc::clone(pending);
    bot.set(
        "command",
        lua.create_function(move |_, (name, function): (String, Function)| {
            command_sink.borrow_mut().push(PendingRegistration {
                name,
                description: None,
                scope: HandlerScope::Prefix,
                function,
            });
            Ok(())
        })?,
    )?;

    let slash_sink = Rc::clone(pending);
    bot.set(
        "slash_command",
        lua.create_function(
            move |_, (name, description, function): (String, String, Function)| {
                slash_sink.borrow_mut().push(PendingRegistration {
                    name,
                    description: Some(description),
                    scope: HandlerScope::Slash,
                    function,
                });
                Ok(())
            },
        )?,
    )?;

    lua.globals().set("bot", bot)
}
