//! Embedded Lua host for code-based command definitions.
//!
//! A code-based definition is a Lua chunk that registers handlers through
//! `bot.command(name, handler)` or
//! `bot.slash_command(name, description, handler)`. Handlers receive a
//! `ctx` table and may call the suspending host functions `ctx:reply`,
//! `ctx:send` and `ctx:sleep`.
//!
//! The host is not a sandbox. Scripts run in-process with a reduced
//! standard library; nothing limits the CPU or memory a handler uses once
//! it is running.

mod error;
mod function;
mod host;

pub use error::ScriptError;
pub use function::ScriptFunction;
pub use host::{ScriptHost, ScriptRegistration, check_syntax};
