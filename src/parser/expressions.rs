//! Prefix / infix parser registry and the precedence‑climbing loop.

use std::rc::Rc;

use log::debug;

use super::{ParseResult, Parser, Precedence, PrecedenceTable};
use crate::ast::{
    ExprKind, Expression, FStringPart, FunctionLiteral, Identifier, InfixOp, Literal, PrefixOp,
    Span,
};
use crate::error::ParserException;
use crate::scanner::Scanner;
use crate::token::{FStringSegment, Position, Token, TokenType};

/// Red zone and growth size for deeply nested expressions.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

type PrefixParseFn<'a> = fn(&mut Parser<'a>) -> ParseResult<Expression>;
type InfixParseFn<'a> = fn(&mut Parser<'a>, Rc<Expression>) -> ParseResult<Expression>;

impl<'a> Parser<'a> {
    // ───────────────────────── registry ─────────────────────────

    fn prefix_parser(token_type: &TokenType) -> Option<PrefixParseFn<'a>> {
        let parser: PrefixParseFn<'a> = match token_type {
            TokenType::IDENT => Self::parse_identifier,
            TokenType::INT => Self::parse_integer_literal,
            TokenType::FLOAT => Self::parse_float_literal,
            TokenType::STRING => Self::parse_string_literal,
            TokenType::FSTRING(_) => Self::parse_fstring_literal,
            TokenType::TRUE | TokenType::FALSE => Self::parse_boolean,
            TokenType::NULL => Self::parse_null,
            TokenType::BANG | TokenType::MINUS => Self::parse_prefix_expression,
            TokenType::LPAREN => Self::parse_grouped_expression,
            TokenType::IF => Self::parse_if_expression,
            TokenType::FUNCTION => Self::parse_function_literal,
            TokenType::LBRACKET => Self::parse_array_literal,
            TokenType::LBRACE => Self::parse_hash_literal,
            TokenType::NEW => Self::parse_new_expression,
            TokenType::SUPER => Self::parse_super_expression,
            _ => return None,
        };

        Some(parser)
    }

    fn infix_parser(token_type: &TokenType) -> Option<InfixParseFn<'a>> {
        let parser: InfixParseFn<'a> = match token_type {
            TokenType::PLUS
            | TokenType::MINUS
            | TokenType::ASTERISK
            | TokenType::SLASH
            | TokenType::PERCENT
            | TokenType::EQ
            | TokenType::NOT_EQ
            | TokenType::LT
            | TokenType::GT
            | TokenType::LT_EQ
            | TokenType::GT_EQ
            | TokenType::AND
            | TokenType::OR => Self::parse_infix_expression,
            TokenType::LPAREN => Self::parse_call_expression,
            TokenType::LBRACKET => Self::parse_index_expression,
            TokenType::DOT => Self::parse_member_expression,
            TokenType::ASSIGN
            | TokenType::PLUS_ASSIGN
            | TokenType::MINUS_ASSIGN
            | TokenType::ASTERISK_ASSIGN
            | TokenType::SLASH_ASSIGN => Self::parse_assignment,
            _ => return None,
        };

        Some(parser)
    }

    // ─────────────────────── precedence climbing ───────────────────────

    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expression> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.parse_expression_inner(precedence)
        })
    }

    fn parse_expression_inner(&mut self, precedence: Precedence) -> ParseResult<Expression> {
        let current = self.stream.current();

        let Some(prefix) = Self::prefix_parser(&current.token_type) else {
            let message = if current.is(&TokenType::ILLEGAL) {
                current.literal.clone()
            } else {
                format!("no prefix parse function for {} found", current.token_type)
            };

            return Err(ParserException::new(message, current));
        };

        let mut left = prefix(self)?;

        while !self.stream.peek_is(&TokenType::SEMICOLON)
            && precedence < PrecedenceTable::lookup(&self.stream.peek().token_type)
        {
            let Some(infix) = Self::infix_parser(&self.stream.peek().token_type) else {
                return Ok(left);
            };

            self.stream.advance();
            left = infix(self, Rc::new(left))?;
        }

        Ok(left)
    }

    /// Span from `start` to the current token.
    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.stream.current().position)
    }

    fn literal(&self, literal: Literal) -> Expression {
        let position = self.stream.current().position;
        Expression::new(ExprKind::Literal(literal), Span::new(position, position))
    }

    // ───────────────────────── prefix parsers ─────────────────────────

    fn parse_identifier(&mut self) -> ParseResult<Expression> {
        let token = self.stream.current();

        Ok(Expression::new(
            ExprKind::Identifier(token.literal.clone()),
            Span::between(token, token),
        ))
    }

    fn parse_integer_literal(&mut self) -> ParseResult<Expression> {
        let token = self.stream.current().clone();

        let value = match token.literal.parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                self.reporter.report(
                    format!("could not parse {} as integer", token.literal),
                    &token,
                );
                0
            }
        };

        Ok(self.literal(Literal::Integer(value)))
    }

    fn parse_float_literal(&mut self) -> ParseResult<Expression> {
        let token = self.stream.current().clone();

        let value = match token.literal.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                self.reporter
                    .report(format!("could not parse {} as float", token.literal), &token);
                0.0
            }
        };

        Ok(self.literal(Literal::Float(value)))
    }

    fn parse_string_literal(&mut self) -> ParseResult<Expression> {
        let value = self.stream.current().literal.clone();
        Ok(self.literal(Literal::Str(value)))
    }

    /// Interpolated strings: every embedded expression is re‑lexed and
    /// parsed by a sub‑parser positioned at its original source location.
    fn parse_fstring_literal(&mut self) -> ParseResult<Expression> {
        let token = self.stream.current().clone();

        let TokenType::FSTRING(segments) = &token.token_type else {
            return Err(ParserException::new("expected an f-string", &token));
        };

        let mut parts = Vec::with_capacity(segments.len());

        for segment in segments {
            match segment {
                FStringSegment::Text(text) => parts.push(FStringPart::Text(text.clone())),

                FStringSegment::Expr { source, position } => {
                    let expr = self.parse_embedded(source, *position, &token)?;
                    parts.push(FStringPart::Expr(expr));
                }
            }
        }

        Ok(self.literal(Literal::FString(parts)))
    }

    fn parse_embedded(
        &mut self,
        source: &str,
        position: Position,
        fstring: &Token,
    ) -> ParseResult<Rc<Expression>> {
        debug!("Parsing f-string expression {:?} at {}", source, position);

        let mut sub = Parser::new(Scanner::with_origin(source, position));

        let parsed = sub.parse_expression(Precedence::Lowest);

        let result = match parsed {
            Ok(expr) if sub.stream.peek_is(&TokenType::EOF) => Ok(Rc::new(expr)),

            Ok(_) => Err(ParserException::new(
                "unexpected token in f-string expression",
                sub.stream.peek(),
            )),

            Err(e) => Err(e),
        };

        self.reporter.extend(sub.reporter.into_errors());

        result.map_err(|e| {
            if e.token.is(&TokenType::EOF) {
                ParserException::new(format!("invalid f-string expression: {}", e.message), fstring)
            } else {
                e
            }
        })
    }

    fn parse_boolean(&mut self) -> ParseResult<Expression> {
        let value = self.stream.current_is(&TokenType::TRUE);
        Ok(self.literal(Literal::Boolean(value)))
    }

    fn parse_null(&mut self) -> ParseResult<Expression> {
        Ok(self.literal(Literal::Null))
    }

    fn parse_prefix_expression(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;

        let operator = if self.stream.current_is(&TokenType::BANG) {
            PrefixOp::Not
        } else {
            PrefixOp::Negate
        };

        self.stream.advance();
        let right = self.parse_expression(Precedence::Prefix)?;

        Ok(Expression::new(
            ExprKind::Prefix {
                operator,
                right: Rc::new(right),
            },
            self.span_from(start),
        ))
    }

    fn parse_grouped_expression(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;

        self.stream.advance();
        let mut expr = self.parse_expression(Precedence::Lowest)?;
        self.stream.expect_peek(&TokenType::RPAREN)?;

        expr.span = self.span_from(start);
        Ok(expr)
    }

    fn parse_if_expression(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;
        let mut conditions = Vec::new();
        let mut consequences = Vec::new();
        let mut alternative = None;

        loop {
            self.stream.expect_peek(&TokenType::LPAREN)?;
            self.stream.advance();
            conditions.push(Rc::new(self.parse_expression(Precedence::Lowest)?));
            self.stream.expect_peek(&TokenType::RPAREN)?;
            self.stream.expect_peek(&TokenType::LBRACE)?;
            consequences.push(Rc::new(self.parse_block_statement()?));

            if self.stream.skip_peek(&TokenType::ELIF) {
                continue;
            }

            if self.stream.skip_peek(&TokenType::ELSE) {
                if self.stream.skip_peek(&TokenType::IF) {
                    continue;
                }

                self.stream.expect_peek(&TokenType::LBRACE)?;
                alternative = Some(Rc::new(self.parse_block_statement()?));
            }

            break;
        }

        Ok(Expression::new(
            ExprKind::If {
                conditions,
                consequences,
                alternative,
            },
            self.span_from(start),
        ))
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::LPAREN)?;
        let function = self.parse_function_rest(None, start)?;

        Ok(Expression::new(
            ExprKind::Literal(Literal::Function(Rc::new(function))),
            self.span_from(start),
        ))
    }

    /// Parameters and body of a function or method; *current* is `(`.
    pub(crate) fn parse_function_rest(
        &mut self,
        name: Option<String>,
        start: Position,
    ) -> ParseResult<FunctionLiteral> {
        let parameters = self.parse_function_parameters()?;
        self.stream.expect_peek(&TokenType::LBRACE)?;

        let saved = self.context.enter_function();
        let body = self.parse_block_statement();
        self.context.exit_function(saved);

        Ok(FunctionLiteral {
            name,
            parameters,
            body: Rc::new(body?),
            span: self.span_from(start),
        })
    }

    fn parse_function_parameters(&mut self) -> ParseResult<Vec<Identifier>> {
        let mut parameters: Vec<Identifier> = Vec::new();

        if self.stream.skip_peek(&TokenType::RPAREN) {
            return Ok(parameters);
        }

        loop {
            self.stream.expect_peek(&TokenType::IDENT)?;
            let token = self.stream.current().clone();

            if parameters.iter().any(|p| p.name == token.literal) {
                self.reporter
                    .report(format!("duplicate parameter '{}'", token.literal), &token);
            }

            parameters.push(Identifier::from_token(&token));

            if !self.stream.skip_peek(&TokenType::COMMA) {
                break;
            }
        }

        self.stream.expect_peek(&TokenType::RPAREN)?;
        Ok(parameters)
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;
        let elements = self.parse_expression_list(&TokenType::RBRACKET)?;

        Ok(Expression::new(
            ExprKind::Literal(Literal::Array(elements)),
            self.span_from(start),
        ))
    }

    fn parse_hash_literal(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;
        let mut pairs = Vec::new();

        while !self.stream.peek_is(&TokenType::RBRACE) {
            self.stream.advance();
            let key = self.parse_expression(Precedence::Lowest)?;

            self.stream.expect_peek(&TokenType::COLON)?;
            self.stream.advance();
            let value = self.parse_expression(Precedence::Lowest)?;

            pairs.push((Rc::new(key), Rc::new(value)));

            if !self.stream.peek_is(&TokenType::RBRACE) {
                self.stream.expect_peek(&TokenType::COMMA)?;
            }
        }

        self.stream.expect_peek(&TokenType::RBRACE)?;

        Ok(Expression::new(
            ExprKind::Literal(Literal::Hash(pairs)),
            self.span_from(start),
        ))
    }

    fn parse_new_expression(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::IDENT)?;
        let class = self.parse_identifier()?;

        let arguments = if self.stream.skip_peek(&TokenType::LPAREN) {
            self.parse_expression_list(&TokenType::RPAREN)?
        } else {
            Vec::new()
        };

        Ok(Expression::new(
            ExprKind::New {
                class: Rc::new(class),
                arguments,
            },
            self.span_from(start),
        ))
    }

    fn parse_super_expression(&mut self) -> ParseResult<Expression> {
        let start = self.stream.current().position;

        let method = if self.stream.skip_peek(&TokenType::DOT) {
            self.stream.expect_peek(&TokenType::IDENT)?;
            Some(Identifier::from_token(self.stream.current()))
        } else {
            None
        };

        Ok(Expression::new(
            ExprKind::Super { method },
            self.span_from(start),
        ))
    }

    /// Comma separated expressions up to `end`; *current* is the opener.
    /// A trailing comma is accepted.
    fn parse_expression_list(&mut self, end: &TokenType) -> ParseResult<Vec<Rc<Expression>>> {
        let mut list = Vec::new();

        if self.stream.skip_peek(end) {
            return Ok(list);
        }

        self.stream.advance();
        list.push(Rc::new(self.parse_expression(Precedence::Lowest)?));

        while self.stream.skip_peek(&TokenType::COMMA) {
            if self.stream.peek_is(end) {
                break;
            }

            self.stream.advance();
            list.push(Rc::new(self.parse_expression(Precedence::Lowest)?));
        }

        self.stream.expect_peek(end)?;
        Ok(list)
    }

    // ───────────────────────── infix parsers ─────────────────────────

    fn parse_infix_expression(&mut self, left: Rc<Expression>) -> ParseResult<Expression> {
        let token = self.stream.current().clone();
        let precedence = PrecedenceTable::lookup(&token.token_type);

        let operator = infix_operator(&token.token_type)
            .ok_or_else(|| ParserException::new("unknown infix operator", &token))?;

        self.stream.advance();
        let right = self.parse_expression(precedence)?;
        let span = left.span.to(right.span);

        Ok(Expression::new(
            ExprKind::Infix {
                left,
                operator,
                right: Rc::new(right),
            },
            span,
        ))
    }

    fn parse_call_expression(&mut self, function: Rc<Expression>) -> ParseResult<Expression> {
        let start = function.span.start;
        let arguments = self.parse_expression_list(&TokenType::RPAREN)?;

        Ok(Expression::new(
            ExprKind::Call {
                function,
                arguments,
            },
            self.span_from(start),
        ))
    }

    fn parse_index_expression(&mut self, left: Rc<Expression>) -> ParseResult<Expression> {
        let start = left.span.start;

        self.stream.advance();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.stream.expect_peek(&TokenType::RBRACKET)?;

        Ok(Expression::new(
            ExprKind::Index {
                left,
                index: Rc::new(index),
            },
            self.span_from(start),
        ))
    }

    fn parse_member_expression(&mut self, object: Rc<Expression>) -> ParseResult<Expression> {
        let start = object.span.start;

        self.stream.expect_peek(&TokenType::IDENT)?;
        let property = Identifier::from_token(self.stream.current());

        Ok(Expression::new(
            ExprKind::Member { object, property },
            self.span_from(start),
        ))
    }

    /// `target = value` and the compound forms, which desugar to
    /// `target = target op value`. Right associative.
    fn parse_assignment(&mut self, target: Rc<Expression>) -> ParseResult<Expression> {
        let token = self.stream.current().clone();

        if !matches!(
            target.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. }
        ) {
            self.reporter.report("invalid assignment target", &token);
        }

        self.stream.advance();
        let mut value = self.parse_expression(PrecedenceTable::below(Precedence::Assign))?;

        if let ExprKind::Identifier(name) = &target.kind {
            name_function(&mut value, name);
        }

        let compound = match token.token_type {
            TokenType::PLUS_ASSIGN => Some(InfixOp::Add),
            TokenType::MINUS_ASSIGN => Some(InfixOp::Sub),
            TokenType::ASTERISK_ASSIGN => Some(InfixOp::Mul),
            TokenType::SLASH_ASSIGN => Some(InfixOp::Div),
            _ => None,
        };

        let value = match compound {
            Some(operator) => {
                let span = target.span.to(value.span);
                Expression::new(
                    ExprKind::Infix {
                        left: Rc::clone(&target),
                        operator,
                        right: Rc::new(value),
                    },
                    span,
                )
            }
            None => value,
        };

        let span = target.span.to(value.span);

        Ok(Expression::new(
            ExprKind::Assign {
                target,
                value: Rc::new(value),
            },
            span,
        ))
    }
}

fn infix_operator(token_type: &TokenType) -> Option<InfixOp> {
    Some(match token_type {
        TokenType::PLUS => InfixOp::Add,
        TokenType::MINUS => InfixOp::Sub,
        TokenType::ASTERISK => InfixOp::Mul,
        TokenType::SLASH => InfixOp::Div,
        TokenType::PERCENT => InfixOp::Mod,
        TokenType::EQ => InfixOp::Eq,
        TokenType::NOT_EQ => InfixOp::NotEq,
        TokenType::LT => InfixOp::Lt,
        TokenType::GT => InfixOp::Gt,
        TokenType::LT_EQ => InfixOp::LtEq,
        TokenType::GT_EQ => InfixOp::GtEq,
        TokenType::AND => InfixOp::And,
        TokenType::OR => InfixOp::Or,
        _ => return None,
    })
}

/// Give an anonymous function literal the name it is being bound to.
pub(crate) fn name_function(value: &mut Expression, name: &str) {
    if let ExprKind::Literal(Literal::Function(function)) = &mut value.kind {
        if function.name.is_none() {
            Rc::make_mut(function).name = Some(name.to_owned());
        }
    }
}
