//! Error types and the error-reporting seam shared by the whole engine.
//!
//! Parse, wire and prompt failures are ordinary values; nothing in this
//! crate panics on bad input. User-visible diagnostics go through the
//! [`Reporter`] trait so the host (a status pad, a message window, a log
//! file) decides where they end up.

use std::fmt;

use thiserror::Error;

/// How loud a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Sink for user-visible diagnostics.
///
/// The engine both returns errors and reports them here, so interactive
/// hosts can surface a message the moment a statement fails while batch
/// callers still get a `Result` to match on.
pub trait Reporter {
    fn report(&self, severity: Severity, message: &str);
}

/// Routes diagnostics to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
    }
}

/// Discards diagnostics. Useful when the caller only wants the `Result`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&self, _severity: Severity, _message: &str) {}
}

/// A command line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A statement violated its command's grammar.
    #[error("{cmd}: {detail}: \"{text}\"")]
    Syntax {
        /// Name of the command whose grammar failed.
        cmd: &'static str,
        /// What was wrong.
        detail: String,
        /// The offending text.
        text: String,
        /// 1-based source line, when parsing a command file.
        line: Option<u32>,
    },

    /// A name that is neither a command nor an alias.
    #[error("unknown command \"{name}\"")]
    Unknown { name: String, line: Option<u32> },

    /// A key-definition body with no closing `ke`.
    #[error("{cmd} {key}: definition not terminated by ke")]
    UnterminatedDef {
        cmd: &'static str,
        key: String,
        line: Option<u32>,
    },
}

impl ParseError {
    /// Source line the error came from, if any.
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::Unknown { line, .. }
            | ParseError::UnterminatedDef { line, .. } => *line,
        }
    }

    /// The message handed to the [`Reporter`], with line context.
    pub fn report_text(&self) -> String {
        match self.line() {
            Some(n) => format!("line {n}: {self}"),
            None => self.to_string(),
        }
    }
}

/// A flattened buffer that could not be fully decoded, or a chain too
/// large to flatten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// A frame length of zero, or one reaching past the buffer.
    #[error("corrupt frame length {len} at byte {offset}")]
    BadLength { offset: usize, len: u16 },

    /// A command discriminant this build does not know.
    #[error("unknown command code {code} at byte {offset}")]
    BadKind { offset: usize, code: u8 },

    /// A frame whose declared fields run past its own length.
    #[error("truncated frame at byte {offset}")]
    Truncated { offset: usize },

    /// An encode-side value too large for its 16-bit wire field.
    #[error("value {size} does not fit a 16-bit wire field")]
    Oversize { size: usize },
}

/// Misuse or failure of the prompt stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// No prompt is awaiting a response.
    #[error("no prompt in progress")]
    Idle,

    /// Every prompt of the current entry already has a response.
    #[error("prompt already answered")]
    AlreadyAnswered,

    /// `process` called while responses are still missing.
    #[error("prompt still awaiting responses")]
    Incomplete,

    /// `issue` called with a chain that does not begin with a prompt.
    #[error("command chain does not begin with a prompt")]
    NotAPrompt,

    /// A prompt run whose final node carries no template.
    #[error("prompt chain has no substitution template")]
    NoTemplate,

    /// The substituted command line failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_report_text() {
        let err = ParseError::Unknown {
            name: "zz".into(),
            line: Some(12),
        };
        assert_eq!(err.report_text(), "line 12: unknown command \"zz\"");

        let err = ParseError::Unknown {
            name: "zz".into(),
            line: None,
        };
        assert_eq!(err.report_text(), "unknown command \"zz\"");
    }

    #[test]
    fn test_wire_error_display() {
        let err = WireError::BadLength { offset: 4, len: 0 };
        assert_eq!(err.to_string(), "corrupt frame length 0 at byte 4");

        let err = WireError::Oversize { size: 70_003 };
        assert_eq!(err.to_string(), "value 70003 does not fit a 16-bit wire field");
    }

    #[test]
    fn test_prompt_error_from_parse() {
        let parse = ParseError::Unknown {
            name: "qq".into(),
            line: None,
        };
        let prompt: PromptError = parse.clone().into();
        assert_eq!(prompt, PromptError::Parse(parse));
    }
}
