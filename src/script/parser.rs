//! # Script Parser
//!
//! Splits a token stream into an ordered list of [`Statement`] values and
//! extracts the directives embedded in comments.
//!
//! ## Statement assembly
//!
//! Tokens accumulate into a text buffer until a statement terminator or the
//! end of input. Runs of whitespace and line breaks collapse into a single
//! space, and only once the statement has begun: leading whitespace is
//! discarded, and no trailing space is emitted (the separator is held
//! pending and flushed when the next piece of content arrives). A
//! statement's recorded line is the line of its first ordinary token.
//!
//! ## Directive forms
//!
//! Line form, terminated by the end of the line:
//!
//! ```sql
//! -- #If: flag, "WHERE a=1"
//! ```
//!
//! Block form, terminated by `*/`:
//!
//! ```sql
//! /* ** #LoadTable: MyTbl, true, "a, Int32" */
//! ```
//!
//! Inside a directive header the lexer skips whitespace (filtering mode).
//! A comment that does not match a directive form is consumed and replaced
//! by a single space. Once a directive's argument list has opened (the
//! colon), grammar violations are syntax errors rather than comment
//! demotions.
//!
//! For every directive the parser generates a fresh `{sdir-N}` key, writes
//! the marker into the statement text as if it were a word token, and
//! records the directive in the statement's placeholder map. Every marker
//! in the emitted text has exactly one map entry and vice versa.

use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{Result, ScriptError};

use super::ast::{Directive, Statement};
use super::lexer::Lexer;
use super::placeholder::KeyGenerator;
use super::token::{Origin, Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    keys: KeyGenerator,
}

/// Outcome of a comment trigger: either a parsed directive or a plain
/// comment that was consumed.
enum CommentOutcome {
    Directive(Directive),
    Comment,
}

#[derive(Default)]
struct StatementBuilder {
    text: String,
    placeholders: HashMap<String, Directive>,
    pending_space: bool,
    first_line: Option<u32>,
    directive_line: Option<u32>,
}

impl StatementBuilder {
    fn begun(&self) -> bool {
        !self.text.is_empty()
    }

    fn push_content(&mut self, content: &str, line: u32) {
        if self.begun() && self.pending_space {
            self.text.push(' ');
        }
        self.pending_space = false;
        self.text.push_str(content);
        if self.first_line.is_none() {
            self.first_line = Some(line);
        }
    }

    fn push_directive(&mut self, key: String, directive: Directive) {
        if self.begun() && self.pending_space {
            self.text.push(' ');
        }
        self.text.push('{');
        self.text.push_str(&key);
        self.text.push('}');
        // The marker separates from following content like a word would.
        self.pending_space = true;
        if self.directive_line.is_none() {
            self.directive_line = Some(directive.origin.line);
        }
        self.placeholders.insert(key, directive);
    }

    fn take(&mut self, file: &Arc<str>) -> Option<Statement> {
        if self.text.is_empty() {
            *self = StatementBuilder::default();
            return None;
        }
        let line = self.first_line.or(self.directive_line).unwrap_or(1);
        let statement = Statement {
            text: std::mem::take(&mut self.text),
            origin: Origin {
                file: file.clone(),
                line,
            },
            placeholders: std::mem::take(&mut self.placeholders),
        };
        *self = StatementBuilder::default();
        Some(statement)
    }
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, file: impl Into<Arc<str>>, terminator: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input, file, terminator),
            keys: KeyGenerator::new(),
        }
    }

    /// Parses the whole input into statements, in source order.
    pub fn parse(mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        let mut builder = StatementBuilder::default();

        loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Eof => {
                    if let Some(stmt) = builder.take(self.lexer.file()) {
                        statements.push(stmt);
                    }
                    break;
                }
                TokenKind::StatementTerminator => {
                    if let Some(stmt) = builder.take(self.lexer.file()) {
                        statements.push(stmt);
                    }
                }
                TokenKind::Whitespace | TokenKind::EndOfLine => {
                    if builder.begun() {
                        builder.pending_space = true;
                    }
                }
                TokenKind::LineCommentStart => {
                    match self.line_comment(token.line)? {
                        CommentOutcome::Directive(directive) => {
                            builder.push_directive(self.keys.next_key(), directive);
                        }
                        CommentOutcome::Comment => {
                            if builder.begun() {
                                builder.pending_space = true;
                            }
                        }
                    }
                }
                TokenKind::BlockStart => {
                    match self.block_comment(token.line)? {
                        CommentOutcome::Directive(directive) => {
                            builder.push_directive(self.keys.next_key(), directive);
                        }
                        CommentOutcome::Comment => {
                            if builder.begun() {
                                builder.pending_space = true;
                            }
                        }
                    }
                }
                _ => builder.push_content(token.raw, token.line),
            }
        }

        Ok(statements)
    }

    /// Handles a `--` trigger: a directive header or a plain comment
    /// consumed through the end of the line.
    fn line_comment(&mut self, trigger_line: u32) -> Result<CommentOutcome> {
        self.lexer.set_filter_whitespace(true);
        let outcome = self.line_comment_inner(trigger_line);
        self.lexer.set_filter_whitespace(false);
        outcome
    }

    fn line_comment_inner(&mut self, trigger_line: u32) -> Result<CommentOutcome> {
        let mut token = self.lexer.next_token()?;
        // A doubled comment marker before the hash is tolerated.
        if token.kind == TokenKind::LineCommentStart {
            token = self.lexer.next_token()?;
        }
        if token.kind != TokenKind::Hash {
            return self.consume_line_comment(token);
        }
        let name = match self.lexer.next_token()? {
            t if t.kind == TokenKind::Word => t.raw.to_string(),
            t => return self.consume_line_comment(t),
        };

        let mut args = SmallVec::new();
        let token = self.lexer.next_token()?;
        match token.kind {
            TokenKind::EndOfLine | TokenKind::Eof => {}
            TokenKind::Colon => self.parse_line_args(&mut args)?,
            _ => return self.consume_line_comment(token),
        }

        Ok(CommentOutcome::Directive(Directive {
            name,
            args,
            origin: Origin {
                file: self.lexer.file().clone(),
                line: trigger_line,
            },
        }))
    }

    /// Argument grammar of the line form: `arg (',' arg)*` up to the end of
    /// the line, where an argument is a word or a single-line quoted string.
    fn parse_line_args(&mut self, args: &mut SmallVec<[String; 4]>) -> Result<()> {
        loop {
            let token = self.lexer.next_token()?;
            match token.kind {
                TokenKind::Word | TokenKind::SingleQuoted | TokenKind::DoubleQuoted => {
                    args.push(token.value.into_owned());
                }
                _ => return Err(self.unexpected(&token, "directive argument")),
            }

            let sep = self.lexer.next_token()?;
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::EndOfLine | TokenKind::Eof => return Ok(()),
                _ => return Err(self.unexpected(&sep, "',' or end of line")),
            }
        }
    }

    fn consume_line_comment(&mut self, first: Token<'a>) -> Result<CommentOutcome> {
        let mut token = first;
        while !matches!(token.kind, TokenKind::EndOfLine | TokenKind::Eof) {
            token = self.lexer.next_token()?;
        }
        Ok(CommentOutcome::Comment)
    }

    /// Handles a `/*` trigger: a block directive header or a plain block
    /// comment consumed through `*/`.
    fn block_comment(&mut self, trigger_line: u32) -> Result<CommentOutcome> {
        self.lexer.set_filter_whitespace(true);
        let outcome = self.block_comment_inner(trigger_line);
        self.lexer.set_filter_whitespace(false);
        outcome
    }

    fn block_comment_inner(&mut self, trigger_line: u32) -> Result<CommentOutcome> {
        let token = self.next_skipping_newlines()?;
        if token.kind != TokenKind::DoubleStar {
            return self.consume_block_comment(token);
        }
        let token = self.next_skipping_newlines()?;
        if token.kind != TokenKind::Hash {
            return self.consume_block_comment(token);
        }
        let name = match self.lexer.next_token()? {
            t if t.kind == TokenKind::Word => t.raw.to_string(),
            t => return self.consume_block_comment(t),
        };

        let mut args = SmallVec::new();
        let token = self.lexer.next_token()?;
        match token.kind {
            TokenKind::BlockStop => {}
            TokenKind::Colon => self.parse_block_args(&mut args)?,
            _ => return self.consume_block_comment(token),
        }

        Ok(CommentOutcome::Directive(Directive {
            name,
            args,
            origin: Origin {
                file: self.lexer.file().clone(),
                line: trigger_line,
            },
        }))
    }

    /// Argument grammar of the block form: `arg (',' arg)*` up to `*/`.
    /// Arguments may additionally be triple-quoted (multiline) strings, and
    /// a bare `#` prefixes the next value.
    fn parse_block_args(&mut self, args: &mut SmallVec<[String; 4]>) -> Result<()> {
        loop {
            let token = self.lexer.next_token()?;
            let value = match token.kind {
                TokenKind::Word
                | TokenKind::SingleQuoted
                | TokenKind::DoubleQuoted
                | TokenKind::MultilineQuoted => token.value.into_owned(),
                TokenKind::Hash => {
                    let next = self.lexer.next_token()?;
                    match next.kind {
                        TokenKind::Word
                        | TokenKind::SingleQuoted
                        | TokenKind::DoubleQuoted
                        | TokenKind::MultilineQuoted => format!("#{}", next.value),
                        _ => return Err(self.unexpected(&next, "directive argument after '#'")),
                    }
                }
                _ => return Err(self.unexpected(&token, "directive argument")),
            };
            args.push(value);

            let sep = self.lexer.next_token()?;
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::BlockStop => return Ok(()),
                _ => return Err(self.unexpected(&sep, "',' or '*/'")),
            }
        }
    }

    fn consume_block_comment(&mut self, first: Token<'a>) -> Result<CommentOutcome> {
        let mut token = first;
        loop {
            match token.kind {
                TokenKind::BlockStop => return Ok(CommentOutcome::Comment),
                TokenKind::Eof => {
                    return Err(ScriptError::Syntax {
                        file: self.lexer.file().to_string(),
                        line: self.lexer.line(),
                        column: self.lexer.column(),
                        message: "unterminated block comment".to_string(),
                    });
                }
                _ => token = self.lexer.next_token()?,
            }
        }
    }

    fn next_skipping_newlines(&mut self) -> Result<Token<'a>> {
        loop {
            let token = self.lexer.next_token()?;
            if token.kind != TokenKind::EndOfLine {
                return Ok(token);
            }
        }
    }

    fn unexpected(&self, token: &Token<'_>, expected: &str) -> ScriptError {
        ScriptError::Syntax {
            file: self.lexer.file().to_string(),
            line: token.line,
            column: token.column,
            message: format!("expected {expected}, found '{}'", token.raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<Statement> {
        Parser::new(input, "test.sql", ";").parse().unwrap()
    }

    fn parse_err(input: &str) -> ScriptError {
        Parser::new(input, "test.sql", ";").parse().unwrap_err()
    }

    fn single_directive(stmt: &Statement) -> &Directive {
        assert_eq!(stmt.placeholders.len(), 1);
        stmt.placeholders.values().next().unwrap()
    }

    #[test]
    fn parse_splits_statements_on_terminator() {
        let stmts = parse("SELECT 1; SELECT 2");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "SELECT 1");
        assert_eq!(stmts[1].text, "SELECT 2");
    }

    #[test]
    fn parse_collapses_whitespace_runs() {
        let stmts = parse("SELECT   a,\n\t b  FROM t");
        assert_eq!(stmts[0].text, "SELECT a, b FROM t");
    }

    #[test]
    fn parse_discards_leading_and_trailing_whitespace() {
        let stmts = parse("\n\n   SELECT 1   \n");
        assert_eq!(stmts[0].text, "SELECT 1");
    }

    #[test]
    fn parse_skips_empty_statements() {
        let stmts = parse(";;SELECT 1;;");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "SELECT 1");
    }

    #[test]
    fn parse_records_line_of_first_ordinary_token() {
        let stmts = parse("\n\nSELECT 1;\nSELECT 2");
        assert_eq!(stmts[0].origin.line, 3);
        assert_eq!(stmts[1].origin.line, 4);
    }

    #[test]
    fn parse_line_directive_without_args() {
        let stmts = parse("SELECT 1 -- #Trace");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "Trace");
        assert!(directive.args.is_empty());
    }

    #[test]
    fn parse_line_directive_with_args() {
        let stmts = parse("SELECT * FROM T -- #If: flag, \"WHERE a=1\"");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "If");
        assert_eq!(directive.args.as_slice(), ["flag", "WHERE a=1"]);
    }

    #[test]
    fn parse_line_directive_embeds_marker() {
        let stmts = parse("SELECT * FROM T -- #If: flag, \"WHERE a=1\"");
        let key = stmts[0].placeholders.keys().next().unwrap().clone();
        assert_eq!(stmts[0].text, format!("SELECT * FROM T {{{key}}}"));
    }

    #[test]
    fn parse_line_directive_with_doubled_marker() {
        let stmts = parse("SELECT 1 -- -- #If: flag, 'x'");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "If");
    }

    #[test]
    fn parse_line_directive_single_quoted_arg() {
        let stmts = parse("-- #Run: 'a b', c");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.args.as_slice(), ["a b", "c"]);
    }

    #[test]
    fn parse_plain_line_comment_collapses_to_space() {
        let stmts = parse("SELECT a -- just a comment\nFROM t");
        assert_eq!(stmts[0].text, "SELECT a FROM t");
    }

    #[test]
    fn parse_leading_line_comment_is_dropped() {
        let stmts = parse("-- header comment\nSELECT 1");
        assert_eq!(stmts[0].text, "SELECT 1");
        assert!(stmts[0].placeholders.is_empty());
    }

    #[test]
    fn parse_hash_without_name_is_comment() {
        let stmts = parse("SELECT 1 -- # not a directive\nFROM t");
        assert_eq!(stmts[0].text, "SELECT 1 FROM t");
        assert!(stmts[0].placeholders.is_empty());
    }

    #[test]
    fn parse_line_directive_arg_syntax_error() {
        let err = parse_err("-- #If: ,");
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn parse_line_directive_missing_comma_is_error() {
        let err = parse_err("-- #If: a b");
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn parse_block_directive_args() {
        let stmts = parse("/* ** #LoadTable: MyTbl, true, \"a, Int32\", \"b, String, 64\" */");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "LoadTable");
        assert_eq!(
            directive.args.as_slice(),
            ["MyTbl", "true", "a, Int32", "b, String, 64"]
        );
    }

    #[test]
    fn parse_block_directive_across_lines() {
        let stmts = parse("/*\n**\n#Check: x */ SELECT 1");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "Check");
        assert_eq!(directive.args.as_slice(), ["x"]);
    }

    #[test]
    fn parse_block_directive_without_args() {
        let stmts = parse("/* ** #Reset */ SELECT 1");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "Reset");
        assert!(directive.args.is_empty());
    }

    #[test]
    fn parse_block_directive_hash_prefixed_arg() {
        let stmts = parse("/* ** #LoadTable: #Tmp, true */");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.args.as_slice(), ["#Tmp", "true"]);
    }

    #[test]
    fn parse_block_directive_multiline_arg() {
        let stmts = parse("/* ** #Callback: \"\"\"line1\nline2\"\"\" */");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.name, "Callback");
        assert_eq!(directive.args.as_slice(), ["line1\nline2"]);
    }

    #[test]
    fn parse_plain_block_comment_collapses_to_space() {
        let stmts = parse("SELECT a /* note */ FROM t");
        assert_eq!(stmts[0].text, "SELECT a FROM t");
    }

    #[test]
    fn parse_unterminated_block_comment_is_error() {
        let err = parse_err("SELECT 1 /* no end");
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn parse_block_args_reject_newline_between_args() {
        let err = parse_err("/* ** #X: a,\nb */");
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn parse_markers_and_map_agree() {
        let stmts = parse("SELECT 1 -- #A: x\n; SELECT 2 /* ** #B: y */ WHERE c = 1");
        for stmt in &stmts {
            for key in stmt.placeholders.keys() {
                assert!(stmt.text.contains(&format!("{{{key}}}")));
            }
            let re = crate::script::placeholder::placeholder_regex();
            for caps in re.captures_iter(&stmt.text) {
                assert!(stmt.placeholders.contains_key(&caps[1]));
            }
        }
    }

    #[test]
    fn parse_directive_keys_are_unique_across_statements() {
        let stmts = parse("SELECT 1 -- #A\n; SELECT 2 -- #B");
        let k0 = stmts[0].placeholders.keys().next().unwrap();
        let k1 = stmts[1].placeholders.keys().next().unwrap();
        assert_ne!(k0, k1);
    }

    #[test]
    fn parse_directive_only_statement_uses_trigger_line() {
        let stmts = parse("\n-- #Init: x");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].origin.line, 2);
        let key = stmts[0].placeholders.keys().next().unwrap().clone();
        assert_eq!(stmts[0].text, format!("{{{key}}}"));
    }

    #[test]
    fn parse_directive_origin_points_at_trigger() {
        let stmts = parse("SELECT 1\n-- #If: a, 'x'");
        let directive = single_directive(&stmts[0]);
        assert_eq!(directive.origin.line, 2);
        assert_eq!(&*directive.origin.file, "test.sql");
    }

    #[test]
    fn parse_custom_terminator() {
        let stmts = Parser::new("SELECT 1\nGO\nSELECT 2", "test.sql", "GO")
            .parse()
            .unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "SELECT 1");
        assert_eq!(stmts[1].text, "SELECT 2");
    }

    #[test]
    fn parse_preserves_punctuation_without_spacing() {
        let stmts = parse("INSERT INTO t (a,b) VALUES (1,'x')");
        assert_eq!(stmts[0].text, "INSERT INTO t (a,b) VALUES (1,'x')");
    }

    #[test]
    fn parse_multiple_directives_in_one_statement() {
        let stmts = parse("SELECT * FROM T -- #A: 1\n-- #B: 2\nWHERE x = 0");
        assert_eq!(stmts[0].placeholders.len(), 2);
        let names: Vec<_> = {
            let re = crate::script::placeholder::placeholder_regex();
            re.captures_iter(&stmts[0].text)
                .map(|c| stmts[0].placeholders[&c[1]].name.clone())
                .collect()
        };
        // Marker order in the text follows source order.
        assert_eq!(names, ["A", "B"]);
    }
}
