use log::debug;

use crate::error::ParserException;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};

/// Two‑token window over a [`Scanner`]: the token being parsed and the one
/// after it.
pub struct TokenStream<'a> {
    scanner: Scanner<'a>,
    current: Token,
    peek: Token,
}

impl<'a> TokenStream<'a> {
    pub fn new(mut scanner: Scanner<'a>) -> Self {
        let current = scanner.next_token();
        let peek = scanner.next_token();

        Self {
            scanner,
            current,
            peek,
        }
    }

    #[inline]
    pub fn current(&self) -> &Token {
        &self.current
    }

    #[inline]
    pub fn peek(&self) -> &Token {
        &self.peek
    }

    /// Shift the window one token forward.
    pub fn advance(&mut self) {
        let next = self.scanner.next_token();
        self.current = std::mem::replace(&mut self.peek, next);

        debug!("Parser at {}", self.current);
    }

    #[inline]
    pub fn current_is(&self, token_type: &TokenType) -> bool {
        self.current.is(token_type)
    }

    #[inline]
    pub fn peek_is(&self, token_type: &TokenType) -> bool {
        self.peek.is(token_type)
    }

    pub fn at_end(&self) -> bool {
        self.current_is(&TokenType::EOF)
    }

    /// Advance onto the peek token iff it has the expected type; otherwise
    /// the grammar cannot continue and a [`ParserException`] is raised.
    pub fn expect_peek(&mut self, token_type: &TokenType) -> Result<(), ParserException> {
        if self.peek_is(token_type) {
            self.advance();
            return Ok(());
        }

        let found = &self.peek;
        let message = if found.is(&TokenType::ILLEGAL) {
            found.literal.clone()
        } else {
            format!(
                "expected next token to be {}, got {} instead",
                token_type.name(),
                found.token_type.name()
            )
        };

        Err(ParserException::new(message, found))
    }

    /// Consume an optional trailing token.
    pub fn skip_peek(&mut self, token_type: &TokenType) -> bool {
        if self.peek_is(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }
}
