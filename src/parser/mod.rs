/*!
Recursive‑descent statement parser combined with a Pratt expression parser.

Grammar (EBNF — condensed)
--------------------------

```text
program        → statement* EOF ;
statement      → letStmt | constStmt | returnStmt | whileStmt | forStmt
               | breakStmt | continueStmt | classStmt | block | exprStmt ;
letStmt        → "let" IDENT ( "=" expression )? ";"? ;
constStmt      → "const" IDENT "=" expression ";"? ;
returnStmt     → "return" expression? ";"? ;
whileStmt      → "while" "(" expression ")" block ;
forStmt        → "for" "(" ( letStmt | constStmt | exprStmt | ";" )
                 expression? ";" expression? ")" block ;
classStmt      → "class" IDENT ( "extends" IDENT )? "{" method* "}" ;
method         → IDENT "(" parameters? ")" block ;
block          → "{" statement* "}" ;
exprStmt       → expression ";"? ;

expression     → prefix ( infix )* ;           (precedence climbing)
prefix         → IDENT | INT | FLOAT | STRING | FSTRING | "true" | "false"
               | "null" | ( "!" | "-" ) expression | "(" expression ")"
               | ifExpr | "fn" "(" parameters? ")" block
               | "[" list? "]" | "{" pairs? "}" | "new" IDENT ( "(" list? ")" )?
               | "super" ( "." IDENT )? ;
ifExpr         → "if" "(" expression ")" block
                 ( ( "elif" | "else" "if" ) "(" expression ")" block )*
                 ( "else" block )? ;
infix          → binaryOp expression | "(" list? ")" | "[" expression "]"
               | "." IDENT | assignOp expression ;
```

Errors come in two flavours. Recoverable problems (a `break` outside a
loop, an invalid assignment target, a malformed number) are reported to the
[`ErrorReporter`] and parsing carries on. A token that cannot continue the
grammar at all raises a [`ParserException`]; the statement loop records it
and resynchronizes at the next statement boundary.

Every parse routine starts with the construct's first token as *current*
and leaves *current* on the construct's last token.
*/

mod context;
mod expressions;
mod precedence;
mod statements;
mod stream;

pub use context::{ErrorReporter, ParsingContext};
pub use precedence::{Precedence, PrecedenceTable};
pub use stream::TokenStream;

use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Program, Span, Statement};
use crate::error::{ParseError, ParserException};
use crate::scanner::Scanner;
use crate::token::TokenType;

pub(crate) type ParseResult<T> = Result<T, ParserException>;

/// A best‑effort program together with every syntax error found.
#[derive(Debug)]
pub struct ParseOutput {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a whole source text.
pub fn parse_program(source: &str) -> ParseOutput {
    Parser::new(Scanner::new(source)).parse()
}

/// Top‑level parser over a token stream.
pub struct Parser<'a> {
    stream: TokenStream<'a>,
    reporter: ErrorReporter,
    context: ParsingContext,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(scanner: Scanner<'a>) -> Self {
        info!("Parser created");

        Self {
            stream: TokenStream::new(scanner),
            reporter: ErrorReporter::default(),
            context: ParsingContext::default(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program and return its statements plus diagnostics.
    pub fn parse(mut self) -> ParseOutput {
        info!("Beginning parse phase");

        let start = self.stream.current().position;
        let mut statements: Vec<Rc<Statement>> = Vec::new();

        while !self.stream.at_end() {
            if let Some(stmt) = self.parse_statement_recovering() {
                debug!("Parsed statement: {}", stmt.kind_name());
                statements.push(Rc::new(stmt));
            }

            self.stream.advance();
        }

        let end = self.stream.current().position;
        let errors = self.reporter.into_errors();

        info!(
            "Parsed {} statements with {} errors",
            statements.len(),
            errors.len()
        );

        ParseOutput {
            program: Program {
                statements,
                span: Span::new(start, end),
            },
            errors,
        }
    }

    // ────────────────────── utility helpers ───────────────────────

    /// Parse one statement, turning an exception into a report.
    fn parse_statement_recovering(&mut self) -> Option<Statement> {
        match self.parse_statement() {
            Ok(stmt) => Some(stmt),

            Err(exception) => {
                self.reporter.report_exception(exception);
                self.synchronize();
                None
            }
        }
    }

    /// Discards tokens until it thinks it is at a statement boundary. The
    /// caller's `advance` then lands on the next statement.
    fn synchronize(&mut self) {
        loop {
            if self.stream.current_is(&TokenType::SEMICOLON) || self.stream.at_end() {
                return;
            }

            let peek = &self.stream.peek().token_type;

            if peek.starts_statement()
                || *peek == TokenType::RBRACE
                || *peek == TokenType::EOF
            {
                return;
            }

            self.stream.advance();
        }
    }
}
