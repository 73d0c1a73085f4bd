//! # Script Lexer
//!
//! Byte-level tokenizer over an annotated-SQL source buffer. The lexer emits
//! a fixed alphabet of token kinds (see [`TokenKind`]) and tracks line and
//! column for every token so parse errors can point at the offending
//! character.
//!
//! ## Design
//!
//! The scanner borrows from the input wherever possible: word tokens and
//! escape-free string literals are slices of the source buffer, and only a
//! literal containing an escape allocates its value.
//!
//! Significant characters are `, # / * ' " - :` plus the first character of
//! the configured statement terminator; everything else that is not
//! whitespace accretes into [`TokenKind::Word`] tokens. Two-character
//! lexemes (`--`, `/*`, `*/`, `**`) degrade to a one-character word when the
//! follower does not match.
//!
//! ## Statement terminator
//!
//! The terminator is a caller-configured string (default `;`) containing no
//! significant characters. A contiguous match of the whole terminator emits
//! [`TokenKind::StatementTerminator`]; a partial match emits the matched
//! prefix as a word and scanning rejoins at the mismatch.
//!
//! ## String literals
//!
//! Single- and double-quoted strings are single-line; three consecutive
//! quote characters open a triple-quoted string that may span lines and is
//! closed by the same triple. A backslash copies the next character into the
//! value verbatim, and a doubled quote inside a triple-quoted string
//! contributes one quote character. An unterminated string (end of input, or
//! a bare newline outside triple mode) is a syntax error located at the
//! opening quote.
//!
//! ## Filtering mode
//!
//! While the parser is inside a directive header it calls
//! [`Lexer::set_filter_whitespace`] so that whitespace runs are skipped
//! transparently; end-of-line tokens are still delivered because the line
//! directive grammar is terminated by them.

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Result, ScriptError};

use super::token::{Token, TokenKind};

const SIGNIFICANT: &[u8] = &[b',', b'#', b'/', b'*', b'\'', b'"', b'-', b':'];

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    file: Arc<str>,
    terminator: &'a str,
    filter_whitespace: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file: impl Into<Arc<str>>, terminator: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.into(),
            terminator,
            filter_whitespace: false,
        }
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Whitespace filtering is toggled by the parser across `next_token`
    /// calls while it is inside a directive header.
    pub fn set_filter_whitespace(&mut self, filter: bool) {
        self.filter_whitespace = filter;
    }

    pub fn next_token(&mut self) -> Result<Token<'a>> {
        if self.filter_whitespace {
            while !self.is_eof() && is_blank(self.current()) {
                self.advance();
            }
        }

        let start = self.pos;
        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(self.token(TokenKind::Eof, start, line, column));
        }

        let ch = self.current();

        if ch == b'\n' || ch == b'\r' {
            return Ok(self.scan_newline(start, line, column));
        }

        if is_blank(ch) {
            while !self.is_eof() && is_blank(self.current()) {
                self.advance();
            }
            return Ok(self.token(TokenKind::Whitespace, start, line, column));
        }

        if self.terminator.as_bytes().first() == Some(&ch) {
            return Ok(self.scan_terminator(start, line, column));
        }

        match ch {
            b'-' => {
                self.advance();
                if !self.is_eof() && self.current() == b'-' {
                    self.advance();
                    Ok(self.token(TokenKind::LineCommentStart, start, line, column))
                } else {
                    Ok(self.token(TokenKind::Word, start, line, column))
                }
            }
            b'/' => {
                self.advance();
                if !self.is_eof() && self.current() == b'*' {
                    self.advance();
                    Ok(self.token(TokenKind::BlockStart, start, line, column))
                } else {
                    Ok(self.token(TokenKind::Word, start, line, column))
                }
            }
            b'*' => {
                self.advance();
                if !self.is_eof() && self.current() == b'/' {
                    self.advance();
                    Ok(self.token(TokenKind::BlockStop, start, line, column))
                } else if !self.is_eof() && self.current() == b'*' {
                    self.advance();
                    Ok(self.token(TokenKind::DoubleStar, start, line, column))
                } else {
                    Ok(self.token(TokenKind::Word, start, line, column))
                }
            }
            b',' => {
                self.advance();
                Ok(self.token(TokenKind::Comma, start, line, column))
            }
            b':' => {
                self.advance();
                Ok(self.token(TokenKind::Colon, start, line, column))
            }
            b'#' => {
                self.advance();
                Ok(self.token(TokenKind::Hash, start, line, column))
            }
            b'\'' | b'"' => self.scan_string(ch, start, line, column),
            _ => {
                while !self.is_eof() && !self.is_word_boundary(self.current()) {
                    self.advance();
                }
                Ok(self.token(TokenKind::Word, start, line, column))
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, line: u32, column: u32) -> Token<'a> {
        let raw = &self.input[start..self.pos];
        Token {
            kind,
            raw,
            value: Cow::Borrowed(raw),
            line,
            column,
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.current() == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn is_word_boundary(&self, ch: u8) -> bool {
        ch == b'\n'
            || ch == b'\r'
            || is_blank(ch)
            || SIGNIFICANT.contains(&ch)
            || self.terminator.as_bytes().first() == Some(&ch)
    }

    fn scan_newline(&mut self, start: usize, line: u32, column: u32) -> Token<'a> {
        if self.current() == b'\r' {
            self.advance();
            if !self.is_eof() && self.current() == b'\n' {
                self.advance();
            } else {
                // Lone \r counts as a line break too.
                self.line += 1;
                self.column = 1;
            }
        } else {
            self.advance();
        }
        self.token(TokenKind::EndOfLine, start, line, column)
    }

    fn scan_terminator(&mut self, start: usize, line: u32, column: u32) -> Token<'a> {
        let term = self.terminator.as_bytes();
        let mut matched = 0;
        while matched < term.len() && !self.is_eof() && self.current() == term[matched] {
            self.advance();
            matched += 1;
        }
        if matched == term.len() {
            self.token(TokenKind::StatementTerminator, start, line, column)
        } else {
            // Partial match degrades to a word; scanning rejoins at the
            // mismatch character.
            self.token(TokenKind::Word, start, line, column)
        }
    }

    fn scan_string(&mut self, quote: u8, start: usize, line: u32, column: u32) -> Result<Token<'a>> {
        self.advance();

        if !self.is_eof() && self.current() == quote && self.peek_at(1) == Some(quote) {
            self.advance();
            self.advance();
            return self.scan_triple(quote, start, line, column);
        }

        let value_start = self.pos;
        let mut owned: Option<String> = None;
        let mut seg_start = self.pos;

        loop {
            if self.is_eof() {
                return Err(self.unterminated(line, column));
            }
            let ch = self.current();
            if ch == quote {
                let end = self.pos;
                self.advance();
                let value = match owned {
                    Some(mut s) => {
                        s.push_str(&self.input[seg_start..end]);
                        Cow::Owned(s)
                    }
                    None => Cow::Borrowed(&self.input[value_start..end]),
                };
                let kind = if quote == b'\'' {
                    TokenKind::SingleQuoted
                } else {
                    TokenKind::DoubleQuoted
                };
                return Ok(Token {
                    kind,
                    raw: &self.input[start..self.pos],
                    value,
                    line,
                    column,
                });
            }
            if ch == b'\n' || ch == b'\r' {
                return Err(self.unterminated(line, column));
            }
            if ch == b'\\' {
                let buf = owned.get_or_insert_with(String::new);
                buf.push_str(&self.input[seg_start..self.pos]);
                self.advance();
                if self.is_eof() {
                    return Err(self.unterminated(line, column));
                }
                self.copy_escaped_char(buf);
                seg_start = self.pos;
                continue;
            }
            self.advance();
        }
    }

    fn scan_triple(&mut self, quote: u8, start: usize, line: u32, column: u32) -> Result<Token<'a>> {
        let mut value = String::new();
        let mut seg_start = self.pos;

        loop {
            if self.is_eof() {
                return Err(self.unterminated(line, column));
            }
            let ch = self.current();
            if ch == quote {
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    value.push_str(&self.input[seg_start..self.pos]);
                    self.advance();
                    self.advance();
                    self.advance();
                    return Ok(Token {
                        kind: TokenKind::MultilineQuoted,
                        raw: &self.input[start..self.pos],
                        value: Cow::Owned(value),
                        line,
                        column,
                    });
                }
                if self.peek_at(1) == Some(quote) {
                    // Doubled quote contributes one quote character.
                    value.push_str(&self.input[seg_start..self.pos]);
                    value.push(quote as char);
                    self.advance();
                    self.advance();
                    seg_start = self.pos;
                    continue;
                }
                self.advance();
                continue;
            }
            if ch == b'\\' {
                value.push_str(&self.input[seg_start..self.pos]);
                self.advance();
                if self.is_eof() {
                    return Err(self.unterminated(line, column));
                }
                self.copy_escaped_char(&mut value);
                seg_start = self.pos;
                continue;
            }
            self.advance();
        }
    }

    /// Copies the (possibly multi-byte) character at the cursor into `buf`
    /// verbatim and advances past it.
    fn copy_escaped_char(&mut self, buf: &mut String) {
        let len = utf8_len(self.current());
        let end = (self.pos + len).min(self.bytes.len());
        buf.push_str(&self.input[self.pos..end]);
        for _ in self.pos..end {
            self.advance();
        }
    }

    fn unterminated(&self, line: u32, column: u32) -> ScriptError {
        ScriptError::Syntax {
            file: self.file.to_string(),
            line,
            column,
            message: "unterminated string".to_string(),
        }
    }
}

fn is_blank(ch: u8) -> bool {
    ch == b' ' || ch == b'\t'
}

fn utf8_len(leading: u8) -> usize {
    if leading < 0x80 {
        1
    } else if leading >> 5 == 0b110 {
        2
    } else if leading >> 4 == 0b1110 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input, "test.sql", ";");
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex_all(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn significant_set_matches_config() {
        let from_config: Vec<u8> = crate::config::SIGNIFICANT_CHARS
            .iter()
            .map(|&c| c as u8)
            .collect();
        assert_eq!(from_config.as_slice(), SIGNIFICANT);
    }

    #[test]
    fn lex_words_and_whitespace() {
        assert_eq!(
            kinds("SELECT 1"),
            vec![TokenKind::Word, TokenKind::Whitespace, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_whitespace_run_is_single_token() {
        let tokens = lex_all("a  \t  b");
        assert_eq!(tokens[1].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].raw, "  \t  ");
        assert_eq!(tokens[2].raw, "b");
    }

    #[test]
    fn lex_newline_variants() {
        assert_eq!(
            kinds("a\nb\r\nc\rd"),
            vec![
                TokenKind::Word,
                TokenKind::EndOfLine,
                TokenKind::Word,
                TokenKind::EndOfLine,
                TokenKind::Word,
                TokenKind::EndOfLine,
                TokenKind::Word,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_line_counter_across_newlines() {
        let mut lexer = Lexer::new("a\nb\r\nc", "test.sql", ";");
        let a = lexer.next_token().unwrap();
        assert_eq!((a.line, a.column), (1, 1));
        lexer.next_token().unwrap();
        let b = lexer.next_token().unwrap();
        assert_eq!((b.line, b.column), (2, 1));
        lexer.next_token().unwrap();
        let c = lexer.next_token().unwrap();
        assert_eq!((c.line, c.column), (3, 1));
    }

    #[test]
    fn lex_comment_markers() {
        assert_eq!(
            kinds("--/***/**"),
            vec![
                TokenKind::LineCommentStart,
                TokenKind::BlockStart,
                TokenKind::BlockStop,
                TokenKind::DoubleStar,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_lone_marker_chars_degrade_to_words() {
        let tokens = lex_all("- / *");
        assert_eq!(tokens[0].kind, TokenKind::Word);
        assert_eq!(tokens[0].raw, "-");
        assert_eq!(tokens[2].kind, TokenKind::Word);
        assert_eq!(tokens[2].raw, "/");
        assert_eq!(tokens[4].kind, TokenKind::Word);
        assert_eq!(tokens[4].raw, "*");
    }

    #[test]
    fn lex_punctuation() {
        assert_eq!(
            kinds(",:#"),
            vec![TokenKind::Comma, TokenKind::Colon, TokenKind::Hash, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_default_terminator() {
        assert_eq!(
            kinds("a;b"),
            vec![
                TokenKind::Word,
                TokenKind::StatementTerminator,
                TokenKind::Word,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_multichar_terminator_full_match() {
        let mut lexer = Lexer::new("a\nGO\nb", "test.sql", "GO");
        let mut found = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t.kind == TokenKind::Eof {
                break;
            }
            found.push(t.kind);
        }
        assert!(found.contains(&TokenKind::StatementTerminator));
    }

    #[test]
    fn lex_multichar_terminator_partial_match_is_word() {
        let mut lexer = Lexer::new("GRANT", "test.sql", "GO");
        let t = lexer.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::Word);
        assert_eq!(t.raw, "G");
        let t = lexer.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::Word);
        assert_eq!(t.raw, "RANT");
    }

    #[test]
    fn lex_single_quoted_string() {
        let tokens = lex_all("'hello'");
        assert_eq!(tokens[0].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[0].value, "hello");
        assert_eq!(tokens[0].raw, "'hello'");
    }

    #[test]
    fn lex_double_quoted_string() {
        let tokens = lex_all("\"col name\"");
        assert_eq!(tokens[0].kind, TokenKind::DoubleQuoted);
        assert_eq!(tokens[0].value, "col name");
    }

    #[test]
    fn lex_empty_string() {
        let tokens = lex_all("''");
        assert_eq!(tokens[0].kind, TokenKind::SingleQuoted);
        assert_eq!(tokens[0].value, "");
    }

    #[test]
    fn lex_backslash_escape_copies_verbatim() {
        let tokens = lex_all(r"'a\'b'");
        assert_eq!(tokens[0].value, "a'b");
        let tokens = lex_all(r"'a\nb'");
        // No interpretation: \n is the letter n.
        assert_eq!(tokens[0].value, "anb");
    }

    #[test]
    fn lex_triple_quoted_multiline() {
        let tokens = lex_all("'''line1\nline2'''");
        assert_eq!(tokens[0].kind, TokenKind::MultilineQuoted);
        assert_eq!(tokens[0].value, "line1\nline2");
    }

    #[test]
    fn lex_triple_quoted_doubled_quote_escape() {
        let tokens = lex_all("'''it''s'''");
        assert_eq!(tokens[0].value, "it's");
    }

    #[test]
    fn lex_triple_quoted_lone_quote_is_literal() {
        let tokens = lex_all("\"\"\"a\"b\"\"\"");
        assert_eq!(tokens[0].value, "a\"b");
    }

    #[test]
    fn lex_unterminated_string_at_eof() {
        let mut lexer = Lexer::new("SELECT 'abc", "test.sql", ";");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        match err {
            ScriptError::Syntax { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 8);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn lex_unterminated_string_at_newline() {
        let mut lexer = Lexer::new("'abc\ndef'", "test.sql", ";");
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, column: 1, .. }));
    }

    #[test]
    fn lex_filter_mode_skips_whitespace_but_not_newlines() {
        let mut lexer = Lexer::new("  a  \n  b", "test.sql", ";");
        lexer.set_filter_whitespace(true);
        assert_eq!(lexer.next_token().unwrap().raw, "a");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfLine);
        assert_eq!(lexer.next_token().unwrap().raw, "b");
    }

    #[test]
    fn lex_word_stops_at_significant_chars() {
        let tokens = lex_all("a,b");
        assert_eq!(tokens[0].raw, "a");
        assert_eq!(tokens[1].kind, TokenKind::Comma);
        assert_eq!(tokens[2].raw, "b");
    }

    #[test]
    fn lex_multibyte_content_in_strings() {
        let tokens = lex_all("'héllo'");
        assert_eq!(tokens[0].value, "héllo");
        let tokens = lex_all("'a\\éb'");
        assert_eq!(tokens[0].value, "aéb");
    }
}
