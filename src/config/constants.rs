//! # Script Engine Constants
//!
//! Constants reserved by the lexer and the placeholder scheme. These values
//! are process-wide: changing any of them changes the surface syntax of
//! every script the engine accepts.
//!
//! ## Relationships
//!
//! ```text
//! SIGNIFICANT_CHARS
//!       │
//!       └─> Statement terminators are validated against this set at
//!           ScriptSource construction. A terminator containing one of
//!           these characters would be shadowed by comment/string lexing.
//!
//! PLACEHOLDER_PREFIX
//!       │
//!       └─> PLACEHOLDER_PATTERN must match exactly the keys the parser
//!           generates ("{<prefix><counter>}"). The prefix keeps the key
//!           out of the identifier space of ordinary SQL so a compiled
//!           statement can be rescanned for leftover markers reliably.
//! ```

/// Characters the lexer reserves for comment markers, directive headers,
/// string literals, and argument separators. Statement terminators must not
/// contain any of them.
pub const SIGNIFICANT_CHARS: &[char] = &[',', '#', '/', '*', '\'', '"', '-', ':'];

/// Terminator used when a resolver does not specify one.
pub const DEFAULT_TERMINATOR: &str = ";";

/// Prefix of every placeholder key generated by the parser.
pub const PLACEHOLDER_PREFIX: &str = "sdir-";

/// Regex text matching one placeholder marker, capturing the key.
pub const PLACEHOLDER_PATTERN: &str = r"\{(sdir-\d+)\}";
