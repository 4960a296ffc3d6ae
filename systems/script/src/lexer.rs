use maze_lab_core::SyntaxTag;

use crate::error::SyntaxError;

const INDENTED_OPERATORS: &[&str] = &[
    "//=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "//", "(", ")", "[", "]", "{",
    "}", ",", ":", ".", "=", "<", ">", "+", "-", "*", "/", "%",
];

const PRIMITIVE_OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=", "(", ")",
    "[", "]", "{", "}", ",", ";", ":", ".", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

const TAB_WIDTH: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name(String),
    Int(i64),
    Str(String),
    Op(&'static str),
    /// Full-line comment text after the marker.
    Comment(String),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

pub(crate) fn tokenize(source: &str, syntax: SyntaxTag) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    match syntax {
        SyntaxTag::Indented => lexer.run_indented()?,
        SyntaxTag::PrimitiveCall => lexer.run_primitive()?,
    }
    Ok(lexer.tokens)
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line, self.column, message)
    }

    fn push(&mut self, kind: TokenKind, line: u32, column: u32) {
        self.tokens.push(Token { kind, line, column });
    }

    fn last_is_layout(&self) -> bool {
        matches!(
            self.tokens.last().map(|token| &token.kind),
            None | Some(TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
                | Some(TokenKind::Comment(_))
        )
    }

    fn run_indented(&mut self) -> Result<(), SyntaxError> {
        let mut indents = vec![0_usize];
        let mut depth = 0_usize;
        let mut at_line_start = true;

        loop {
            if at_line_start && depth == 0 {
                let mut width = 0;
                while let Some(ch) = self.peek() {
                    match ch {
                        ' ' => width += 1,
                        '\t' => width += TAB_WIDTH,
                        '\r' => {}
                        _ => break,
                    }
                    let _ = self.bump();
                }

                match self.peek() {
                    None => break,
                    Some('\n') => {
                        let _ = self.bump();
                        continue;
                    }
                    Some('#') => {
                        let (line, column) = (self.line, self.column);
                        let _ = self.bump();
                        let text = self.read_to_line_end();
                        self.push(TokenKind::Comment(text), line, column);
                        let _ = self.bump();
                        continue;
                    }
                    Some(_) => {}
                }

                let current = indents.last().copied().unwrap_or(0);
                if width > current {
                    indents.push(width);
                    self.push(TokenKind::Indent, self.line, self.column);
                } else if width < current {
                    while indents.last().is_some_and(|&level| width < level) {
                        let _ = indents.pop();
                        self.push(TokenKind::Dedent, self.line, self.column);
                    }
                    if indents.last().copied() != Some(width) {
                        return Err(
                            self.error("unindent does not match any outer indentation level")
                        );
                    }
                }
                at_line_start = false;
            }

            let Some(ch) = self.peek() else {
                break;
            };
            let (line, column) = (self.line, self.column);

            match ch {
                ' ' | '\t' | '\r' => {
                    let _ = self.bump();
                }
                '\n' => {
                    let _ = self.bump();
                    if depth == 0 {
                        if !self.last_is_layout() {
                            self.push(TokenKind::Newline, line, column);
                        }
                        at_line_start = true;
                    }
                }
                '#' => {
                    let _ = self.read_to_line_end();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    let _ = self.bump();
                    let _ = self.bump();
                }
                _ => {
                    let kind = self.read_token(INDENTED_OPERATORS)?;
                    match kind {
                        TokenKind::Op("(" | "[" | "{") => depth += 1,
                        TokenKind::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    self.push(kind, line, column);
                }
            }
        }

        if !self.last_is_layout() {
            self.push(TokenKind::Newline, self.line, self.column);
        }
        while indents.len() > 1 {
            let _ = indents.pop();
            self.push(TokenKind::Dedent, self.line, self.column);
        }
        self.push(TokenKind::Eof, self.line, self.column);
        Ok(())
    }

    fn run_primitive(&mut self) -> Result<(), SyntaxError> {
        while let Some(ch) = self.peek() {
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    let _ = self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    let _ = self.bump();
                    let _ = self.bump();
                    let _ = self.read_to_line_end();
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let _ = self.bump();
                    let _ = self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                let _ = self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(SyntaxError::new(
                                    line,
                                    column,
                                    "unterminated block comment",
                                ))
                            }
                        }
                    }
                }
                _ => {
                    let kind = self.read_token(PRIMITIVE_OPERATORS)?;
                    self.push(kind, line, column);
                }
            }
        }
        self.push(TokenKind::Eof, self.line, self.column);
        Ok(())
    }

    fn read_to_line_end(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            let _ = self.bump();
            if ch != '\r' {
                text.push(ch);
            }
        }
        text
    }

    fn read_token(&mut self, operators: &[&'static str]) -> Result<TokenKind, SyntaxError> {
        let Some(ch) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };

        if ch.is_ascii_digit() {
            return self.read_int();
        }
        if ch == '"' || ch == '\'' {
            return self.read_string(ch);
        }
        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let mut name = String::new();
            while let Some(ch) = self.peek() {
                if !(ch.is_alphanumeric() || ch == '_' || ch == '$') {
                    break;
                }
                name.push(ch);
                let _ = self.bump();
            }
            return Ok(TokenKind::Name(name));
        }

        for &op in operators {
            let matches = op
                .chars()
                .enumerate()
                .all(|(offset, expected)| self.peek_at(offset) == Some(expected));
            if matches {
                for _ in 0..op.chars().count() {
                    let _ = self.bump();
                }
                return Ok(TokenKind::Op(op));
            }
        }

        Err(self.error(format!("unexpected character '{ch}'")))
    }

    fn read_int(&mut self) -> Result<TokenKind, SyntaxError> {
        let (line, column) = (self.line, self.column);
        let mut value: i64 = 0;
        while let Some(ch) = self.peek() {
            if ch == '_' {
                let _ = self.bump();
                continue;
            }
            let Some(digit) = ch.to_digit(10) else {
                break;
            };
            value = value
                .checked_mul(10)
                .and_then(|value| value.checked_add(i64::from(digit)))
                .ok_or_else(|| SyntaxError::new(line, column, "integer literal too large"))?;
            let _ = self.bump();
        }
        let fractional =
            self.peek() == Some('.') && self.peek_at(1).is_some_and(|next| next.is_ascii_digit());
        if fractional || self.peek().is_some_and(char::is_alphabetic) {
            return Err(SyntaxError::new(
                line,
                column,
                "only integer literals are supported",
            ));
        }
        Ok(TokenKind::Int(value))
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        let (line, column) = (self.line, self.column);
        let _ = self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new(line, column, "unterminated string literal"))
                }
                Some(ch) if ch == quote => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other @ ('\\' | '\'' | '"')) => other,
                        Some(other) => {
                            return Err(self.error(format!("unknown escape sequence '\\{other}'")))
                        }
                        None => {
                            return Err(SyntaxError::new(
                                line,
                                column,
                                "unterminated string literal",
                            ))
                        }
                    };
                    text.push(escaped);
                }
                Some(ch) => text.push(ch),
            }
        }
        Ok(TokenKind::Str(text))
    }
}

/// Deepest syntactic nesting either parser accepts.
///
/// Counts bracketed and block nesting as well as the length of left-leaning
/// operator and postfix chains, so it also bounds the depth of the tree.
pub(crate) const MAX_NESTING: usize = 100;

/// Cursor over a token list with the lookahead helpers both parsers share.
pub(crate) struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl TokenStream {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Current nesting depth, to hand back to [`TokenStream::restore`].
    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }

    /// Enters one more level of nesting.
    pub(crate) fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here("nesting too deep"));
        }
        Ok(())
    }

    pub(crate) fn restore(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_second(&self) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.position + 1).min(last)].kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check_op(&self, op: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Op(found) if *found == op)
    }

    pub(crate) fn eat_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            let _ = self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_op(&mut self, op: &str) -> Result<(), SyntaxError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{op}' but found {}", self.describe())))
        }
    }

    pub(crate) fn check_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Name(found) if found == word)
    }

    pub(crate) fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            let _ = self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_word(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{word}' but found {}", self.describe())))
        }
    }

    /// Consumes an identifier that is not one of `keywords`.
    pub(crate) fn expect_identifier(&mut self, keywords: &[&str]) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            TokenKind::Name(name) if !keywords.contains(&name.as_str()) => {
                let name = name.clone();
                let _ = self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(format!("expected a name but found {}", self.describe()))),
        }
    }

    /// Line and column of the next token.
    pub(crate) fn position(&self) -> (u32, u32) {
        let token = self.peek();
        (token.line, token.column)
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let token = self.peek();
        SyntaxError::new(token.line, token.column, message)
    }

    pub(crate) fn describe(&self) -> String {
        match self.peek_kind() {
            TokenKind::Name(name) => format!("'{name}'"),
            TokenKind::Int(value) => format!("'{value}'"),
            TokenKind::Str(_) => "a string".to_owned(),
            TokenKind::Op(op) => format!("'{op}'"),
            TokenKind::Comment(_) => "a comment".to_owned(),
            TokenKind::Newline => "end of line".to_owned(),
            TokenKind::Indent => "an indent".to_owned(),
            TokenKind::Dedent => "a dedent".to_owned(),
            TokenKind::Eof => "end of input".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, syntax: SyntaxTag) -> Vec<TokenKind> {
        tokenize(source, syntax)
            .expect("source tokenizes")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn indentation_emits_balanced_indent_and_dedent() {
        let tokens = kinds("if x:\n    y\n        \nz\n", SyntaxTag::Indented);
        let indents = tokens.iter().filter(|kind| **kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|kind| **kind == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn remaining_levels_are_closed_at_end_of_input() {
        let tokens = kinds("def f():\n  while x:\n    y", SyntaxTag::Indented);
        let tail: Vec<_> = tokens.iter().rev().take(4).cloned().collect();
        assert_eq!(
            tail,
            vec![
                TokenKind::Eof,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::Newline
            ]
        );
    }

    #[test]
    fn brackets_join_lines() {
        let tokens = kinds("x = [1,\n     2]\n", SyntaxTag::Indented);
        assert!(!tokens.contains(&TokenKind::Indent));
        assert_eq!(
            tokens.iter().filter(|kind| **kind == TokenKind::Newline).count(),
            1
        );
    }

    #[test]
    fn inconsistent_dedent_is_rejected() {
        let error = tokenize("if x:\n    y\n  z\n", SyntaxTag::Indented)
            .expect_err("dedent to an unknown level");
        assert_eq!(error.line(), 3);
        assert!(error.message().contains("unindent"));
    }

    #[test]
    fn tabs_count_as_four_columns() {
        let tokens = kinds("if x:\n\ty\n    z\n", SyntaxTag::Indented);
        assert_eq!(
            tokens.iter().filter(|kind| **kind == TokenKind::Indent).count(),
            1
        );
    }

    #[test]
    fn full_line_comments_are_kept_and_trailing_ones_dropped() {
        let tokens = kinds("# hello\nx = 1  # trailing\n", SyntaxTag::Indented);
        assert_eq!(tokens[0], TokenKind::Comment(" hello".to_owned()));
        assert!(!tokens
            .iter()
            .any(|kind| matches!(kind, TokenKind::Comment(text) if text.contains("trailing"))));
    }

    #[test]
    fn primitive_comments_are_skipped_and_longest_operator_wins() {
        let tokens = kinds(
            "/* block */ a !== b; // done\nc === d;",
            SyntaxTag::PrimitiveCall,
        );
        assert!(tokens.contains(&TokenKind::Op("!==")));
        assert!(tokens.contains(&TokenKind::Op("===")));
        assert!(!tokens.iter().any(|kind| matches!(kind, TokenKind::Comment(_))));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = kinds(r#"s = "a\"b\n""#, SyntaxTag::Indented);
        assert!(tokens.contains(&TokenKind::Str("a\"b\n".to_owned())));
    }

    #[test]
    fn unterminated_string_reports_its_start() {
        let error = tokenize("x = 1;\ny = 'abc", SyntaxTag::PrimitiveCall)
            .expect_err("unterminated");
        assert_eq!((error.line(), error.column()), (2, 5));
    }
}
