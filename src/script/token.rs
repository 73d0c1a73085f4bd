//! Token and origin definitions for the script lexer.
//!
//! Tokens borrow from the input buffer where they can: `raw` is always the
//! exact lexeme slice, while `value` is the logical value (for quoted
//! strings, the content with escapes applied) and only allocates when an
//! escape actually rewrote something.

use std::borrow::Cow;
use std::sync::Arc;

/// Position of a statement or directive in its source script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: Arc<str>,
    pub line: u32,
}

impl Origin {
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `--`
    LineCommentStart,
    /// `/*`
    BlockStart,
    /// `*/`
    BlockStop,
    /// `**`
    DoubleStar,
    Word,
    Comma,
    Colon,
    Hash,
    SingleQuoted,
    DoubleQuoted,
    /// Triple-quoted string, newlines permitted.
    MultilineQuoted,
    /// A run of spaces and tabs.
    Whitespace,
    StatementTerminator,
    EndOfLine,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Exact lexeme, including quotes for string tokens.
    pub raw: &'a str,
    /// Logical value: string content with escapes applied, otherwise the
    /// lexeme itself.
    pub value: Cow<'a, str>,
    pub line: u32,
    pub column: u32,
}

impl<'a> Token<'a> {
    pub fn is_quoted(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::SingleQuoted | TokenKind::DoubleQuoted | TokenKind::MultilineQuoted
        )
    }
}
