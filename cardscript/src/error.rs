// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scripting and parse errors.

use thiserror::Error;

/// Result alias for evaluation.
pub type ScriptResult<T, E = ScriptError> = Result<T, E>;

/// An error raised while evaluating a script.
///
/// Scripting errors are recoverable: the update scheduler captures them per
/// value and reports them, the batch itself continues.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ScriptError {
    /// A variable was read that is bound in no scope.
    #[error("variable not set: {0}")]
    UndefinedVariable(String),
    /// Member access on a value that has no such member.
    #[error("{type_name} has no member '{name}'")]
    NoMember {
        /// Type of the value the member was looked up on.
        type_name: String,
        /// The member name.
        name: String,
    },
    /// A value could not be converted to the requested type.
    #[error("can't convert {}from {from} to {to}", quoted(.text.as_deref()))]
    Conversion {
        /// Type of the value being converted.
        from: String,
        /// Name of the target type.
        to: &'static str,
        /// The offending text, for string sources.
        text: Option<String>,
    },
    /// A call on a value that is not a function.
    #[error("{0} is not a function")]
    NotCallable(String),
    /// Iteration over a value that is not a collection.
    #[error("{0} is not a collection")]
    NotIterable(String),
    /// A numeric member outside the bounds of a collection.
    #[error("index {index} out of range for a collection of {len} items")]
    IndexOutOfRange {
        /// The requested index.
        index: i64,
        /// Number of items in the collection.
        len: usize,
    },
    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The configured per-evaluation instruction budget ran out.
    #[error("script exceeded the limit of {limit} instructions")]
    InstructionLimit {
        /// The configured limit.
        limit: u64,
    },
    /// Function calls nested too deeply, usually runaway recursion.
    #[error("function calls nested deeper than {0}")]
    RecursionLimit(usize),
    /// An error raised by a built-in function.
    #[error("{0}")]
    Custom(String),
    /// A broken interpreter invariant. Indicates a bug, not a bad script.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScriptError {
    /// Shorthand for a conversion failure without offending text.
    pub fn conversion(from: impl Into<String>, to: &'static str) -> Self {
        Self::Conversion {
            from: from.into(),
            to,
            text: None,
        }
    }

    /// Shorthand for a conversion failure of a string.
    pub fn conversion_of(text: &str, to: &'static str) -> Self {
        Self::Conversion {
            from: "string".into(),
            to,
            text: Some(text.into()),
        }
    }

    /// Shorthand for an error raised by a built-in function.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

fn quoted(text: Option<&str>) -> String {
    text.map(|t| format!("\"{t}\" ")).unwrap_or_default()
}

/// A syntax error found while parsing a script.
///
/// Parse errors are never fatal: the affected script behaves as if it were
/// absent and the error is reported as a warning.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}line {line}: {message}", .filename.as_deref().map(|f| format!("{f}, ")).unwrap_or_default())]
pub struct ParseError {
    /// Byte offset of the offending token.
    pub position: usize,
    /// One-based line of the offending token.
    pub line: usize,
    /// Name of the file the script came from, if known.
    pub filename: Option<String>,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    /// Creates an error at `position` in `source`, computing the line.
    pub fn at(source: &str, position: usize, message: impl Into<String>) -> Self {
        let position = position.min(source.len());
        let line = 1 + source.as_bytes()[..position]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        Self {
            position,
            line,
            filename: None,
            message: message.into(),
        }
    }
}
