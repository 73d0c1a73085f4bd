//! # Configuration Module
//!
//! Centralizes the process-wide constants of the script engine. The lexer's
//! significant-character set, the default statement terminator, and the
//! placeholder shape are interdependent (a terminator must not contain a
//! significant character; the placeholder regex must match exactly what the
//! parser writes), so they live together here rather than scattered across
//! the modules that consume them.

pub mod constants;

pub use constants::*;
