//! PHP tokenizer.
//!
//! Produces only the tokens name resolution needs: names, variables,
//! punctuation that shapes declarations and types, and opaque literals.
//! Comments, whitespace, and inline HTML are dropped. Every byte is either
//! consumed into a token or skipped, so malformed input surfaces as an
//! unterminated literal or, later, as unbalanced brackets.

use std::fmt;

/// The kind of token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or (fully) qualified name, keywords included
    Name,
    /// `$name`
    Variable,
    /// String, heredoc, or nowdoc literal
    Literal,
    /// Numeric literal
    Number,
    /// `#[`
    AttributeOpen,
    /// `?>`
    CloseTag,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    DoubleColon,
    /// `->` or `?->`
    Arrow,
    /// `=>`
    DoubleArrow,
    Ellipsis,
    Question,
    Pipe,
    Amp,
    /// A lone `\`, as in a group use `Prefix\{`
    Backslash,
    /// Any other operator
    Other,
}

/// A token with its kind, source text, and line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
}

impl Token<'_> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Whether this is a name equal to `keyword`, ignoring ASCII case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.text.eq_ignore_ascii_case(keyword)
    }
}

/// A lexer error with its starting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

/// Tokenize a PHP source file.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        loop {
            self.skip_inline_html();
            if self.at_end() {
                break;
            }
            self.lex_code()?;
        }
        Ok(self.tokens)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn starts_with_ignore_case(&self, s: &str) -> bool {
        self.bytes
            .get(self.pos..self.pos + s.len())
            .is_some_and(|b| b.eq_ignore_ascii_case(s.as_bytes()))
    }

    /// Move forward `n` bytes, counting newlines.
    fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.bytes.len());
        self.line += self.bytes[self.pos..end]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.pos = end;
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            line,
        });
    }

    fn error(&self, message: impl Into<String>, line: usize) -> LexError {
        LexError {
            message: message.into(),
            line,
        }
    }

    /// Skip text outside `<?php` / `<?=` tags, including the open tag.
    fn skip_inline_html(&mut self) {
        while !self.at_end() {
            if self.starts_with_ignore_case("<?php")
                && self
                    .peek(5)
                    .map_or(true, |c| c.is_ascii_whitespace())
            {
                self.advance(5);
                return;
            }
            if self.starts_with("<?=") {
                self.advance(3);
                return;
            }
            self.advance(1);
        }
    }

    /// Lex until a `?>` close tag or end of input.
    fn lex_code(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            let start = self.pos;
            let line = self.line;

            match c {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => self.advance(1),

                b'?' if self.peek(1) == Some(b'>') => {
                    self.advance(2);
                    self.push(TokenKind::CloseTag, start, line);
                    return Ok(());
                }

                b'#' if self.peek(1) == Some(b'[') => {
                    self.advance(2);
                    self.push(TokenKind::AttributeOpen, start, line);
                }
                b'#' => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,

                b'\'' => {
                    self.lex_quoted(b'\'')?;
                    self.push(TokenKind::Literal, start, line);
                }
                b'"' | b'`' => {
                    self.lex_quoted(c)?;
                    self.push(TokenKind::Literal, start, line);
                }
                b'<' if self.starts_with("<<<") => {
                    self.lex_heredoc()?;
                    self.push(TokenKind::Literal, start, line);
                }

                b'$' if self.peek(1).is_some_and(is_name_start) => {
                    self.advance(1);
                    self.eat_identifier();
                    self.push(TokenKind::Variable, start, line);
                }

                b'\\' if self.peek(1).is_some_and(is_name_start) => {
                    self.lex_name();
                    self.push(TokenKind::Name, start, line);
                }
                b'\\' => {
                    self.advance(1);
                    self.push(TokenKind::Backslash, start, line);
                }
                c if is_name_start(c) => {
                    self.lex_name();
                    // Everything after `__halt_compiler` is raw data
                    if self.src[start..self.pos].eq_ignore_ascii_case("__halt_compiler") {
                        self.pos = self.bytes.len();
                        return Ok(());
                    }
                    self.push(TokenKind::Name, start, line);
                }

                c if c.is_ascii_digit() => {
                    self.lex_number();
                    self.push(TokenKind::Number, start, line);
                }
                b'.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => {
                    self.lex_number();
                    self.push(TokenKind::Number, start, line);
                }

                _ => {
                    let (kind, len) = self.punctuation();
                    self.advance(len);
                    self.push(kind, start, line);
                }
            }
        }
        Ok(())
    }

    fn punctuation(&self) -> (TokenKind, usize) {
        let next = self.peek(1);
        match self.peek(0).unwrap_or(b' ') {
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b'{' => (TokenKind::LBrace, 1),
            b'}' => (TokenKind::RBrace, 1),
            b'[' => (TokenKind::LBracket, 1),
            b']' => (TokenKind::RBracket, 1),
            b';' => (TokenKind::Semicolon, 1),
            b',' => (TokenKind::Comma, 1),
            b':' if next == Some(b':') => (TokenKind::DoubleColon, 2),
            b':' => (TokenKind::Colon, 1),
            b'-' if next == Some(b'>') => (TokenKind::Arrow, 2),
            b'=' if next == Some(b'>') => (TokenKind::DoubleArrow, 2),
            b'.' if self.starts_with("...") => (TokenKind::Ellipsis, 3),
            b'?' if self.starts_with("?->") => (TokenKind::Arrow, 3),
            b'?' if next == Some(b'?') || next == Some(b':') => (TokenKind::Other, 2),
            b'?' => (TokenKind::Question, 1),
            b'|' if next == Some(b'|') || next == Some(b'=') => (TokenKind::Other, 2),
            b'|' => (TokenKind::Pipe, 1),
            b'&' if next == Some(b'&') || next == Some(b'=') => (TokenKind::Other, 2),
            b'&' => (TokenKind::Amp, 1),
            _ => (TokenKind::Other, 1),
        }
    }

    fn eat_identifier(&mut self) {
        while self.peek(0).is_some_and(is_name_char) {
            self.pos += 1;
        }
    }

    /// `Foo`, `Foo\Bar`, `\Foo\Bar`, `namespace\Foo`.
    fn lex_name(&mut self) {
        if self.peek(0) == Some(b'\\') {
            self.pos += 1;
        }
        self.eat_identifier();
        while self.peek(0) == Some(b'\\') && self.peek(1).is_some_and(is_name_start) {
            self.pos += 1;
            self.eat_identifier();
        }
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let hex = self.starts_with_ignore_case("0x");
        while let Some(c) = self.peek(0) {
            let exponent_sign = (c == b'+' || c == b'-')
                && !hex
                && self.pos > start
                && matches!(self.bytes[self.pos - 1], b'e' | b'E');
            let continues = c.is_ascii_alphanumeric()
                || c == b'_'
                || (c == b'.' && self.peek(1) != Some(b'.'))
                || exponent_sign;
            if !continues {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'\n' || (c == b'?' && self.peek(1) == Some(b'>')) {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let line = self.line;
        match self.src[self.pos + 2..].find("*/") {
            Some(end) => {
                self.advance(end + 4);
                Ok(())
            }
            None => Err(self.error("unterminated comment", line)),
        }
    }

    fn lex_quoted(&mut self, quote: u8) -> Result<(), LexError> {
        let line = self.line;
        let interpolates = quote != b'\'';
        self.advance(1);
        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => self.advance(2),
                c if c == quote => {
                    self.advance(1);
                    return Ok(());
                }
                b'{' if interpolates && self.peek(1) == Some(b'$') => self.skip_interpolation(line)?,
                b'$' if interpolates && self.peek(1) == Some(b'{') => {
                    self.advance(1);
                    self.skip_interpolation(line)?;
                }
                _ => self.advance(1),
            }
        }
        Err(self.error("unterminated string literal", line))
    }

    /// Skip a `{$...}` or `${...}` expression inside a string, from its
    /// opening brace through the matching close brace. Nested strings may
    /// contain either brace or quote.
    fn skip_interpolation(&mut self, line: usize) -> Result<(), LexError> {
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                b'{' => {
                    depth += 1;
                    self.advance(1);
                }
                b'}' => {
                    self.advance(1);
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'\'' | b'"' | b'`' => self.lex_quoted(c)?,
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                _ => self.advance(1),
            }
        }
        Err(self.error("unterminated string interpolation", line))
    }

    /// `<<<ID`, `<<<"ID"`, `<<<'ID'`, closed by `ID` at the start of a line
    /// (after optional indentation) not followed by a name character.
    fn lex_heredoc(&mut self) -> Result<(), LexError> {
        let line = self.line;
        self.advance(3);
        while matches!(self.peek(0), Some(b' ' | b'\t')) {
            self.advance(1);
        }

        let quote = match self.peek(0) {
            Some(q @ (b'\'' | b'"')) => {
                self.advance(1);
                Some(q)
            }
            _ => None,
        };

        let label_start = self.pos;
        self.eat_identifier();
        let label = &self.src[label_start..self.pos];
        if label.is_empty() {
            return Err(self.error("missing heredoc label", line));
        }

        if let Some(q) = quote {
            if self.peek(0) != Some(q) {
                return Err(self.error("malformed heredoc label", line));
            }
            self.advance(1);
        }

        let mut rest = self.pos;
        loop {
            let Some(newline) = self.src[rest..].find('\n') else {
                return Err(self.error(format!("unterminated heredoc `{}`", label), line));
            };
            let line_start = rest + newline + 1;
            let trimmed = self.src[line_start..].trim_start_matches([' ', '\t']);
            let label_pos = self.src.len() - trimmed.len();

            if trimmed.starts_with(label)
                && !trimmed.as_bytes().get(label.len()).is_some_and(|&c| is_name_char(c))
            {
                self.advance(label_pos + label.len() - self.pos);
                return Ok(());
            }
            rest = line_start;
        }
    }
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}
