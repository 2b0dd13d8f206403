//! Module `scanner` implements a one‑pass, streaming lexer for Stepscript.
//!
//! It transforms a `&str` into a sequence of [`Token`]s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as
//! a `FusedIterator`, it can be chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input text.
//!
//! - `Scanner::with_origin(src, position)`
//!   Lex a fragment that sits at `position` inside a larger file (used for
//!   the embedded expressions of f‑strings).
//!
//! - `Scanner::next_token()`
//!   Returns the next token; once the input is exhausted it keeps returning
//!   `EOF`.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields every token including a single trailing `EOF`, then `None`.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `( ) { } [ ] , ; : . + - * / % ! < > =`.
//! - Two‑character operators: `== != <= >= && || += -= *= /=`.
//! - String literals with escapes, f‑strings `f"a {b} c"`.
//! - Numbers: `42`, `3.14`, `.5`, `5.`, `1e6`, `1.23e-4`.
//! - Identifiers/keywords, resolved via the perfect‑hash keyword table.
//! - Anything else becomes an `ILLEGAL` token carrying a diagnostic, so the
//!   parser can report it with position context.
//!
//! Comments (`//` to end of line) are skipped in bulk with `memchr`.

use crate::token::{lookup_ident, FStringSegment, Position, Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use std::iter::FusedIterator;

/// Drive a scanner over `source` to exhaustion, including the final `EOF`.
pub fn tokenize(source: &str) -> Vec<Token> {
    Scanner::new(source).collect()
}

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    start: usize,      // index of the *first* byte of the current lexeme
    curr: usize,       // index *one past* the last byte examined
    line: usize,       // 1‑based line counter (\n increments)
    line_start: usize, // byte index where the current line begins
    origin: Position,  // position of byte 0 inside the enclosing file
    emitted_eof: bool,
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        Self::with_origin(src, Position::new(1, 1))
    }

    /// Create a lexer whose first byte is reported at `origin`.
    pub fn with_origin(src: &'a str, origin: Position) -> Self {
        info!("Scanner created over {} bytes at {}", src.len(), origin);

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            curr: 0,
            line: origin.line,
            line_start: 0,
            origin,
            emitted_eof: false,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.bytes.len()
    }

    /// Advance one byte and return it. Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it. Returns `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.bytes.get(self.curr).copied().unwrap_or(0)
    }

    /// Peek one byte beyond [`peek`]. Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.bytes.get(self.curr + 1).copied().unwrap_or(0)
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    /// Record that the byte just consumed was a newline.
    #[inline(always)]
    fn newline(&mut self) {
        self.line += 1;
        self.line_start = self.curr;
    }

    /// Position of byte `index`, which must lie on the current line.
    fn position_at(&self, index: usize) -> Position {
        let column = index - self.line_start + 1;

        if self.line == self.origin.line {
            Position::new(self.line, column + self.origin.column - 1)
        } else {
            Position::new(self.line, column)
        }
    }

    fn lexeme(&self) -> &'a str {
        &self.src[self.start..self.curr]
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Skip whitespace and `//` comments.
    fn skip_trivia(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\r' | b'\t' => self.curr += 1,

                b'\n' => {
                    self.curr += 1;
                    self.newline();
                }

                b'/' if self.peek_next() == b'/' => {
                    // Fast‑forward to the next newline; the loop consumes it.
                    match memchr(b'\n', &self.bytes[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.bytes.len(),
                    }
                }

                _ => return,
            }
        }
    }

    /// Return the next token, or `EOF` once the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        self.start = self.curr;
        let position = self.position_at(self.start);

        if self.is_at_end() {
            return Token::eof(position);
        }

        let b = self.advance();

        let token_type = match b {
            // ── single‑character punctuators ──────────────────────────────
            b'(' => TokenType::LPAREN,
            b')' => TokenType::RPAREN,
            b'{' => TokenType::LBRACE,
            b'}' => TokenType::RBRACE,
            b'[' => TokenType::LBRACKET,
            b']' => TokenType::RBRACKET,
            b',' => TokenType::COMMA,
            b';' => TokenType::SEMICOLON,
            b':' => TokenType::COLON,
            b'%' => TokenType::PERCENT,

            b'.' => {
                if self.peek().is_ascii_digit() {
                    return self.scan_number(position, true);
                }

                TokenType::DOT
            }

            // ── operators with an optional '=' suffix ────────────────────
            b'+' => self.either(b'=', TokenType::PLUS_ASSIGN, TokenType::PLUS),
            b'-' => self.either(b'=', TokenType::MINUS_ASSIGN, TokenType::MINUS),
            b'*' => self.either(b'=', TokenType::ASTERISK_ASSIGN, TokenType::ASTERISK),
            b'/' => self.either(b'=', TokenType::SLASH_ASSIGN, TokenType::SLASH),
            b'!' => self.either(b'=', TokenType::NOT_EQ, TokenType::BANG),
            b'=' => self.either(b'=', TokenType::EQ, TokenType::ASSIGN),
            b'<' => self.either(b'=', TokenType::LT_EQ, TokenType::LT),
            b'>' => self.either(b'=', TokenType::GT_EQ, TokenType::GT),

            // ── doubled operators ────────────────────────────────────────
            b'&' => {
                if !self.match_byte(b'&') {
                    return Token::new(TokenType::ILLEGAL, "unexpected character '&'", position);
                }

                TokenType::AND
            }

            b'|' => {
                if !self.match_byte(b'|') {
                    return Token::new(TokenType::ILLEGAL, "unexpected character '|'", position);
                }

                TokenType::OR
            }

            b'"' => return self.scan_string(position),

            b'f' if self.peek() == b'"' => {
                self.curr += 1; // opening quote
                return self.scan_fstring(position);
            }

            b'0'..=b'9' => return self.scan_number(position, false),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while {
                    let c = self.peek();
                    c.is_ascii_alphanumeric() || c == b'_'
                } {
                    self.curr += 1;
                }

                lookup_ident(self.lexeme())
            }

            // ── unexpected character ─────────────────────────────────────
            _ => {
                let ch = self.src[self.start..].chars().next().unwrap_or('\u{fffd}');
                self.curr = self.start + ch.len_utf8();

                debug!("Unexpected character {:?} at {}", ch, position);

                return Token::new(
                    TokenType::ILLEGAL,
                    format!("unexpected character '{}'", ch),
                    position,
                );
            }
        };

        Token::new(token_type, self.lexeme(), position)
    }

    #[inline(always)]
    fn either(&mut self, next: u8, matched: TokenType, single: TokenType) -> TokenType {
        if self.match_byte(next) {
            matched
        } else {
            single
        }
    }

    fn consume_digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.curr += 1;
        }
    }

    /// Scan a numeric literal. `leading_dot` means the lexeme began with `.`,
    /// which has already been consumed.
    fn scan_number(&mut self, position: Position, leading_dot: bool) -> Token {
        let mut is_float = leading_dot;
        self.consume_digits();

        // Fractional part; `5.` is a float unless the dot starts a member access.
        if !leading_dot && self.peek() == b'.' {
            let after = self.peek_next();

            if !(after.is_ascii_alphabetic() || after == b'_' || after == b'.') {
                is_float = true;
                self.curr += 1;
                self.consume_digits();
            }
        }

        // Exponent: e6, E+3, e-4
        if matches!(self.peek(), b'e' | b'E') {
            let next = self.peek_next();
            let signed = matches!(next, b'+' | b'-')
                && self.bytes.get(self.curr + 2).is_some_and(u8::is_ascii_digit);

            if next.is_ascii_digit() || signed {
                is_float = true;
                self.curr += if signed { 2 } else { 1 };
                self.consume_digits();
            }
        }

        let token_type = if is_float {
            TokenType::FLOAT
        } else {
            TokenType::INT
        };

        Token::new(token_type, self.lexeme(), position)
    }

    /// Decode the escape sequence following a backslash.
    fn escape(&mut self, out: &mut String) {
        if self.is_at_end() {
            return;
        }

        let ch = self.src[self.curr..].chars().next().unwrap_or('\\');
        self.curr += ch.len_utf8();

        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\n' => {
                self.newline();
                out.push('\n');
            }
            other => out.push(other),
        }
    }

    /// Push the (possibly multi‑byte) character at `curr` and consume it.
    fn push_char(&mut self, out: &mut String) {
        let ch = self.src[self.curr..].chars().next().unwrap_or('\u{fffd}');
        self.curr += ch.len_utf8();
        out.push(ch);

        if ch == '\n' {
            self.newline();
        }
    }

    /// Parse a double‑quoted string literal. The opening quote is consumed.
    fn scan_string(&mut self, position: Position) -> Token {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Token::new(TokenType::ILLEGAL, "unterminated string", position);
            }

            match self.peek() {
                b'"' => {
                    self.curr += 1;
                    break;
                }

                b'\\' => {
                    self.curr += 1;
                    self.escape(&mut value);
                }

                _ => self.push_char(&mut value),
            }
        }

        Token::new(TokenType::STRING, value, position)
    }

    /// Parse an f‑string body. `f"` is consumed; the literal of the returned
    /// token is the raw body between the quotes.
    fn scan_fstring(&mut self, position: Position) -> Token {
        let body_start = self.curr;
        let mut segments: Vec<FStringSegment> = Vec::new();
        let mut text = String::new();

        loop {
            if self.is_at_end() {
                return Token::new(TokenType::ILLEGAL, "unterminated f-string", position);
            }

            match self.peek() {
                b'"' => break,

                b'\\' => {
                    self.curr += 1;
                    self.escape(&mut text);
                }

                b'{' if self.peek_next() == b'{' => {
                    self.curr += 2;
                    text.push('{');
                }

                b'}' if self.peek_next() == b'}' => {
                    self.curr += 2;
                    text.push('}');
                }

                b'{' => {
                    self.curr += 1;

                    if !text.is_empty() {
                        segments.push(FStringSegment::Text(std::mem::take(&mut text)));
                    }

                    match self.scan_embedded() {
                        Some(segment) => segments.push(segment),
                        None => {
                            return Token::new(
                                TokenType::ILLEGAL,
                                "unterminated f-string expression",
                                position,
                            );
                        }
                    }
                }

                _ => self.push_char(&mut text),
            }
        }

        let body = &self.src[body_start..self.curr];
        self.curr += 1; // closing quote

        if !text.is_empty() {
            segments.push(FStringSegment::Text(text));
        }

        Token::new(TokenType::FSTRING(segments), body, position)
    }

    /// Collect the source of an `{ … }` interpolation whose `{` was consumed.
    /// Nested braces and string literals are skipped over.
    fn scan_embedded(&mut self) -> Option<FStringSegment> {
        let expr_start = self.curr;
        let position = self.position_at(expr_start);
        let mut depth = 0usize;

        while !self.is_at_end() {
            match self.advance() {
                b'{' => depth += 1,

                b'}' if depth == 0 => {
                    let source = self.src[expr_start..self.curr - 1].to_owned();
                    return Some(FStringSegment::Expr { source, position });
                }

                b'}' => depth -= 1,

                b'"' => {
                    while !self.is_at_end() && self.peek() != b'"' {
                        if self.advance() == b'\\' && !self.is_at_end() {
                            self.curr += 1;
                        }
                    }
                    self.curr += 1;
                }

                b'\n' => self.newline(),

                _ => {}
            }
        }

        None
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted_eof {
            return None;
        }

        let token = self.next_token();

        if token.is(&TokenType::EOF) {
            self.emitted_eof = true;
        }

        Some(token)
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
