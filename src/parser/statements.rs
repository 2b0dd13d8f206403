//! Statement parsers, dispatched on the leading keyword.

use std::rc::Rc;

use log::debug;

use super::expressions::name_function;
use super::{ParseResult, Parser, Precedence};
use crate::ast::{
    BlockStatement, ClassStatement, ExprKind, Expression, FunctionLiteral, Identifier, Literal,
    Span, Statement, StmtKind,
};
use crate::error::ParserException;
use crate::token::TokenType;

type StatementParseFn<'a> = fn(&mut Parser<'a>) -> ParseResult<Statement>;

/// `let` and `const` differ only in const‑ness and whether an initializer
/// is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declaration {
    Let,
    Const,
}

impl<'a> Parser<'a> {
    fn statement_parser(token_type: &TokenType) -> Option<StatementParseFn<'a>> {
        let parser: StatementParseFn<'a> = match token_type {
            TokenType::LET => Self::declaration_parser(Declaration::Let),
            TokenType::CONST => Self::declaration_parser(Declaration::Const),
            TokenType::RETURN => Self::parse_return_statement,
            TokenType::LBRACE => Self::parse_block,
            TokenType::WHILE => Self::parse_while_statement,
            TokenType::FOR => Self::parse_for_statement,
            TokenType::BREAK => Self::parse_break_statement,
            TokenType::CONTINUE => Self::parse_continue_statement,
            TokenType::CLASS => Self::parse_class_statement,
            _ => return None,
        };

        Some(parser)
    }

    /// Factory shared by `let` and `const`.
    fn declaration_parser(kind: Declaration) -> StatementParseFn<'a> {
        match kind {
            Declaration::Let => |p: &mut Parser<'a>| p.parse_declaration(Declaration::Let),
            Declaration::Const => |p: &mut Parser<'a>| p.parse_declaration(Declaration::Const),
        }
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Statement> {
        match Self::statement_parser(&self.stream.current().token_type) {
            Some(parser) => parser(self),
            None => self.parse_expression_statement(),
        }
    }

    fn parse_declaration(&mut self, kind: Declaration) -> ParseResult<Statement> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::IDENT)?;
        let name = Identifier::from_token(self.stream.current());

        let value = if self.stream.skip_peek(&TokenType::ASSIGN) {
            self.stream.advance();
            let mut value = self.parse_expression(Precedence::Lowest)?;
            name_function(&mut value, &name.name);
            Some(Rc::new(value))
        } else {
            None
        };

        self.stream.skip_peek(&TokenType::SEMICOLON);
        let span = Span::new(start, self.stream.current().position);

        let kind = match kind {
            Declaration::Let => StmtKind::Let { name, value },

            Declaration::Const => {
                let value = value.unwrap_or_else(|| {
                    let token = self.stream.current().clone();
                    self.reporter.report(
                        format!("missing initializer in const declaration '{}'", name),
                        &token,
                    );
                    Rc::new(Expression::new(ExprKind::Literal(Literal::Null), span))
                });

                StmtKind::Const { name, value }
            }
        };

        Ok(Statement::new(kind, span))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        let start = self.stream.current().position;

        let ends_here = self.stream.peek_is(&TokenType::SEMICOLON)
            || self.stream.peek_is(&TokenType::RBRACE)
            || self.stream.peek_is(&TokenType::EOF);

        let value = if ends_here {
            None
        } else {
            self.stream.advance();
            Some(Rc::new(self.parse_expression(Precedence::Lowest)?))
        };

        self.stream.skip_peek(&TokenType::SEMICOLON);

        Ok(Statement::new(
            StmtKind::Return { value },
            Span::new(start, self.stream.current().position),
        ))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let start = self.stream.current().position;
        let expression = self.parse_expression(Precedence::Lowest)?;

        self.stream.skip_peek(&TokenType::SEMICOLON);

        Ok(Statement::new(
            StmtKind::Expression {
                expression: Rc::new(expression),
            },
            Span::new(start, self.stream.current().position),
        ))
    }

    fn parse_block(&mut self) -> ParseResult<Statement> {
        let block = self.parse_block_statement()?;
        let span = block.span;

        Ok(Statement::new(StmtKind::Block(Rc::new(block)), span))
    }

    /// `{ statement* }`; *current* is the opening brace.
    pub(crate) fn parse_block_statement(&mut self) -> ParseResult<BlockStatement> {
        let start = self.stream.current().position;
        let mut statements = Vec::new();

        self.stream.advance();

        while !self.stream.current_is(&TokenType::RBRACE) {
            if self.stream.at_end() {
                return Err(ParserException::new(
                    "expected '}' to close block",
                    self.stream.current(),
                ));
            }

            if let Some(stmt) = self.parse_statement_recovering() {
                statements.push(Rc::new(stmt));
            }

            self.stream.advance();
        }

        Ok(BlockStatement {
            statements,
            span: Span::new(start, self.stream.current().position),
        })
    }

    /// Parse a loop body with the loop depth raised.
    fn parse_loop_body(&mut self) -> ParseResult<BlockStatement> {
        self.stream.expect_peek(&TokenType::LBRACE)?;

        self.context.enter_loop();
        let body = self.parse_block_statement();
        self.context.exit_loop();

        body
    }

    fn parse_while_statement(&mut self) -> ParseResult<Statement> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::LPAREN)?;
        self.stream.advance();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.stream.expect_peek(&TokenType::RPAREN)?;

        let body = self.parse_loop_body()?;

        Ok(Statement::new(
            StmtKind::While {
                condition: Rc::new(condition),
                body: Rc::new(body),
            },
            Span::new(start, self.stream.current().position),
        ))
    }

    fn parse_for_statement(&mut self) -> ParseResult<Statement> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::LPAREN)?;

        let init = if self.stream.skip_peek(&TokenType::SEMICOLON) {
            None
        } else {
            self.stream.advance();
            let token = self.stream.current().clone();
            let init = self.parse_statement()?;

            if !matches!(
                init.kind,
                StmtKind::Let { .. } | StmtKind::Const { .. } | StmtKind::Expression { .. }
            ) {
                self.reporter
                    .report("for-loop initializer must be a declaration or expression", &token);
            }

            if !self.stream.current_is(&TokenType::SEMICOLON) {
                self.stream.expect_peek(&TokenType::SEMICOLON)?;
            }

            Some(Rc::new(init))
        };

        let condition = if self.stream.skip_peek(&TokenType::SEMICOLON) {
            None
        } else {
            self.stream.advance();
            let condition = self.parse_expression(Precedence::Lowest)?;
            self.stream.expect_peek(&TokenType::SEMICOLON)?;
            Some(Rc::new(condition))
        };

        let update = if self.stream.skip_peek(&TokenType::RPAREN) {
            None
        } else {
            self.stream.advance();
            let update = self.parse_expression(Precedence::Lowest)?;
            self.stream.expect_peek(&TokenType::RPAREN)?;
            Some(Rc::new(update))
        };

        let body = self.parse_loop_body()?;

        Ok(Statement::new(
            StmtKind::For {
                init,
                condition,
                update,
                body: Rc::new(body),
            },
            Span::new(start, self.stream.current().position),
        ))
    }

    fn parse_break_statement(&mut self) -> ParseResult<Statement> {
        self.parse_loop_jump(StmtKind::Break, "break")
    }

    fn parse_continue_statement(&mut self) -> ParseResult<Statement> {
        self.parse_loop_jump(StmtKind::Continue, "continue")
    }

    fn parse_loop_jump(&mut self, kind: StmtKind, keyword: &str) -> ParseResult<Statement> {
        let token = self.stream.current().clone();

        if !self.context.in_loop() {
            self.reporter
                .report(format!("'{}' outside of a loop", keyword), &token);
        }

        self.stream.skip_peek(&TokenType::SEMICOLON);

        Ok(Statement::new(
            kind,
            Span::new(token.position, self.stream.current().position),
        ))
    }

    fn parse_class_statement(&mut self) -> ParseResult<Statement> {
        let start = self.stream.current().position;

        self.stream.expect_peek(&TokenType::IDENT)?;
        let name = Identifier::from_token(self.stream.current());

        let superclass = if self.stream.skip_peek(&TokenType::EXTENDS) {
            self.stream.expect_peek(&TokenType::IDENT)?;
            let token = self.stream.current().clone();

            if token.literal == name.name {
                self.reporter
                    .report(format!("class '{}' cannot extend itself", name), &token);
            }

            Some(Rc::new(Expression::new(
                ExprKind::Identifier(token.literal.clone()),
                Span::between(&token, &token),
            )))
        } else {
            None
        };

        self.stream.expect_peek(&TokenType::LBRACE)?;

        let mut constructor = None;
        let mut methods: Vec<Rc<FunctionLiteral>> = Vec::new();

        while !self.stream.peek_is(&TokenType::RBRACE) && !self.stream.peek_is(&TokenType::EOF) {
            self.stream.expect_peek(&TokenType::IDENT)?;
            let token = self.stream.current().clone();
            let method_start = token.position;

            self.stream.expect_peek(&TokenType::LPAREN)?;
            let method =
                Rc::new(self.parse_function_rest(Some(token.literal.clone()), method_start)?);

            debug!("Parsed method {}.{}", name, token.literal);

            if token.literal == "init" {
                if constructor.is_some() {
                    self.reporter
                        .report(format!("class '{}' has more than one init", name), &token);
                }
                constructor = Some(method);
            } else {
                if methods.iter().any(|m| m.name.as_deref() == Some(token.literal.as_str())) {
                    self.reporter.report(
                        format!("duplicate method '{}' in class '{}'", token.literal, name),
                        &token,
                    );
                }
                methods.push(method);
            }

            self.stream.skip_peek(&TokenType::SEMICOLON);
        }

        self.stream.expect_peek(&TokenType::RBRACE)?;

        Ok(Statement::new(
            StmtKind::Class(Rc::new(ClassStatement {
                name,
                superclass,
                constructor,
                methods,
            })),
            Span::new(start, self.stream.current().position),
        ))
    }
}
