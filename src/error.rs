//! Centralised error hierarchy for the Lox interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This
//! enables a uniform `Result<T>` alias throughout the crate while still
//! preserving rich diagnostic detail.
//!
//! The module does not print diagnostics itself; the driver decides where
//! each error goes.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, anchored to the offending token.
    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        message: String,

        /// `at 'lexeme'`, or `at end` when the parser ran out of input.
        location: String,

        line: usize,
    },

    /// Static-analysis failure (resolver).
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Runtime evaluation error with no source anchor (arithmetic, arity,
    /// callability, undefined variables).
    #[error("{message}")]
    Runtime { message: String },

    /// Runtime evaluation error anchored to a token (property lookups).
    #[error("{message}\n[line {line}]")]
    RuntimeAt { message: String, line: usize },

    /// Wrapper around `std::io::Error`.  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.  The location renders as
    /// `at 'lexeme'`, or `at end` for the EOF sentinel.
    pub fn parse<S: Into<String>>(line: usize, lexeme: &str, msg: S) -> Self {
        let message: String = msg.into();

        let location: String = if lexeme.is_empty() {
            "at end".to_string()
        } else {
            format!("at '{}'", lexeme)
        };

        info!(
            "Creating Parse error: line={}, {}, msg={}",
            line, location, message
        );

        LoxError::Parse {
            message,
            location,
            line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve { message, line }
    }

    /// Helper constructor for the **interpreter**: token-less form.
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: msg={}", message);

        LoxError::Runtime { message }
    }

    /// Helper constructor for the **interpreter**: token-bearing form.
    pub fn runtime_at<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::RuntimeAt { message, line }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
