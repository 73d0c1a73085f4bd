//! # Script Processing Module
//!
//! The compilation front end: tokenizing annotated SQL, splitting it into
//! statements, extracting comment-embedded directives, and the placeholder
//! machinery that stitches directive output back into statement text.
//!
//! ## Module Structure
//!
//! - `token`: token kinds and source origins
//! - `lexer`: byte-level tokenizer with configurable statement terminator
//! - `parser`: statement splitting and directive extraction
//! - `ast`: the immutable `Statement` / `Directive` value types
//! - `placeholder`: opaque marker keys and single-pass substitution
//!
//! ## Pipeline
//!
//! ```text
//! source text → Lexer → tokens → Parser → statements with {sdir-N}
//! markers → (runner) per-directive init → rewritten text
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod placeholder;
pub mod token;

pub use ast::{Directive, Statement};
pub use lexer::Lexer;
pub use parser::Parser;
pub use placeholder::{placeholder_regex, substitute};
pub use token::{Origin, Token, TokenKind};
