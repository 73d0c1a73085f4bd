//! # Error Types
//!
//! The engine's error surface mirrors its three phases. Parse-time errors
//! ([`ScriptError::Syntax`]) and init-time errors ([`UnrecognizedDirective`],
//! [`InvalidDirective`], [`InvalidOperation`], [`ScriptNotFound`]) are fatal
//! for the current execution and leave the compiled-script cache untouched.
//! Run-time failures raised by a processor are wrapped as
//! [`StatementExecution`] together with the final statement text and its
//! origin so a failing statement can be located in the source script.
//!
//! Collaborators (processors, handlers, resolvers, drivers) report failures
//! as `eyre::Report`; the core converts at the boundary and never retries or
//! swallows. The composite dispatcher is the only component that inspects
//! errors, and only to recognize the [`UnrecognizedDirective`] skip signal
//! while walking its handler chain.
//!
//! [`UnrecognizedDirective`]: ScriptError::UnrecognizedDirective
//! [`InvalidDirective`]: ScriptError::InvalidDirective
//! [`InvalidOperation`]: ScriptError::InvalidOperation
//! [`ScriptNotFound`]: ScriptError::ScriptNotFound
//! [`StatementExecution`]: ScriptError::StatementExecution

use crate::script::Origin;

pub type Result<T, E = ScriptError> = std::result::Result<T, E>;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A token appeared where the script grammar forbids it, or a literal
    /// was left unterminated.
    #[error("{file}:{line}:{column}: syntax error: {message}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// No handler produced an initialization for the directive.
    #[error("{file}:{line}: unrecognized directive '#{name}'")]
    UnrecognizedDirective {
        name: String,
        file: String,
        line: u32,
    },

    /// A handler recognized the directive but rejected its use.
    #[error("{file}:{line}: invalid directive '#{name}': {message}")]
    InvalidDirective {
        name: String,
        file: String,
        line: u32,
        message: String,
    },

    /// Directive initialization or setup failed inside a handler.
    #[error("{file}:{line}: directive '#{name}' failed")]
    DirectiveFailed {
        name: String,
        file: String,
        line: u32,
        #[source]
        cause: Cause,
    },

    /// No resolver produced a source for the requested script name.
    #[error("script '{name}' not found")]
    ScriptNotFound { name: String },

    /// A resolver failed while looking up a script name.
    #[error("resolving script '{name}' failed")]
    Resolve {
        name: String,
        #[source]
        cause: Cause,
    },

    /// The engine was driven outside its contract (a setup pass over a
    /// non-deferred marker, a null setup result, and the like).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A processor failed while executing a fully resolved statement.
    #[error("{file}:{line}: statement execution failed: {text}")]
    StatementExecution {
        text: String,
        file: String,
        line: u32,
        #[source]
        cause: Cause,
    },

    /// Invalid engine configuration, e.g. a statement terminator containing
    /// a significant character.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    pub(crate) fn unrecognized(name: &str, origin: &Origin) -> Self {
        ScriptError::UnrecognizedDirective {
            name: name.to_string(),
            file: origin.file.to_string(),
            line: origin.line,
        }
    }

    pub(crate) fn invalid_directive(
        name: &str,
        origin: &Origin,
        message: impl Into<String>,
    ) -> Self {
        ScriptError::InvalidDirective {
            name: name.to_string(),
            file: origin.file.to_string(),
            line: origin.line,
            message: message.into(),
        }
    }

    /// Converts a collaborator failure into the engine error surface. A
    /// `ScriptError` travelling inside the report (the dispatcher's skip
    /// signal, a handler's own invalid-directive verdict) is unwrapped
    /// rather than double-wrapped.
    pub(crate) fn from_directive_report(report: eyre::Report, name: &str, origin: &Origin) -> Self {
        match report.downcast::<ScriptError>() {
            Ok(err) => err,
            Err(report) => ScriptError::DirectiveFailed {
                name: name.to_string(),
                file: origin.file.to_string(),
                line: origin.line,
                cause: report.into(),
            },
        }
    }
}
