//! DM command-language engine.
//!
//! Parses, serializes and resolves the textual command language an
//! editor session runs on:
//! - Command model: [`Cmd`] statement nodes with one payload variant per
//!   command grammar
//! - Parser: [`Parser`] with statement chaining, alias expansion and
//!   escape/quote handling
//! - Wire codec: [`wire::flatten`] / [`wire::inflate`] plus the shared
//!   key-binding store and its change-sync discipline in [`wire::store`]
//! - Prompt controller: [`PromptStack`] for commands that pause for user
//!   input and resume once every response is in

pub use cmd::{Cmd, CmdKind, Op};
pub use error::{
    LogReporter, ParseError, PromptError, Reporter, Severity, SilentReporter, WireError,
};
pub use keys::{Key, KeySpec, Mods};
pub use parse::{AliasSource, DEFAULT_ESCAPE, NoAliases, Parser};
pub use prompt::{Completion, PromptStack, Resolved};
pub use wire::{Decoded, flatten, inflate, size};

pub mod cmd;
pub mod error;
pub mod keys;
pub mod parse;
pub mod prompt;
pub mod wire;
