use crate::ast::{
    BlockStatement, ClassStatement, ExprKind, Expression, FStringPart, FunctionLiteral, Literal,
    Program, Statement, StmtKind,
};

/// Renders an AST back to canonical source.
///
/// Every prefix, infix and assignment expression is fully parenthesized, so
/// the output re-parses to the same tree and printing that tree again yields
/// identical text.
#[derive(Debug, Default)]
pub struct AstPrinter {
    indent: usize,
}

impl AstPrinter {
    pub fn print_program(program: &Program) -> String {
        let mut printer = AstPrinter::default();

        program
            .statements
            .iter()
            .map(|stmt| printer.statement(stmt))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── statements ──────────────────────────────────────────────────

    fn statement(&mut self, stmt: &Statement) -> String {
        match &stmt.kind {
            StmtKind::Expression { expression } => {
                let text = self.expression(expression);

                // A leading brace would re-parse as a block.
                if text.starts_with('{') {
                    format!("({});", text)
                } else {
                    format!("{};", text)
                }
            }

            StmtKind::Block(block) => self.block(block),

            StmtKind::While { condition, body } => format!(
                "while ({}) {}",
                self.expression(condition),
                self.block(body)
            ),

            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let mut header = String::from("for (");

                if let Some(init) = init {
                    header.push_str(&self.header_statement(init));
                }
                header.push(';');

                if let Some(condition) = condition {
                    header.push(' ');
                    header.push_str(&self.expression(condition));
                }
                header.push(';');

                if let Some(update) = update {
                    header.push(' ');
                    header.push_str(&self.expression(update));
                }

                format!("{}) {}", header, self.block(body))
            }

            StmtKind::Class(class) => self.class(class),

            _ => format!("{};", self.header_statement(stmt)),
        }
    }

    /// A simple statement without its trailing semicolon.
    fn header_statement(&mut self, stmt: &Statement) -> String {
        match &stmt.kind {
            StmtKind::Let { name, value } => match value {
                Some(value) => format!("let {} = {}", name, self.expression(value)),
                None => format!("let {}", name),
            },

            StmtKind::Const { name, value } => {
                format!("const {} = {}", name, self.expression(value))
            }

            StmtKind::Return { value } => match value {
                Some(value) => format!("return {}", self.expression(value)),
                None => "return".into(),
            },

            StmtKind::Break => "break".into(),

            StmtKind::Continue => "continue".into(),

            StmtKind::Expression { expression } => self.expression(expression),

            _ => self.statement(stmt),
        }
    }

    fn block(&mut self, block: &BlockStatement) -> String {
        if block.statements.is_empty() {
            return "{}".into();
        }

        self.indent += 1;
        let pad = "    ".repeat(self.indent);
        let lines: Vec<String> = block
            .statements
            .iter()
            .map(|stmt| format!("{}{}", pad, self.statement(stmt)))
            .collect();
        self.indent -= 1;

        format!("{{\n{}\n{}}}", lines.join("\n"), "    ".repeat(self.indent))
    }

    fn class(&mut self, class: &ClassStatement) -> String {
        let mut out = format!("class {}", class.name);

        if let Some(superclass) = &class.superclass {
            out.push_str(" extends ");
            out.push_str(&self.expression(superclass));
        }

        if class.constructor.is_none() && class.methods.is_empty() {
            out.push_str(" {}");
            return out;
        }

        self.indent += 1;
        let pad = "    ".repeat(self.indent);
        let methods: Vec<String> = class
            .constructor
            .iter()
            .chain(class.methods.iter())
            .map(|method| {
                format!(
                    "{}{}{}",
                    pad,
                    method.display_name(),
                    self.function_rest(method)
                )
            })
            .collect();
        self.indent -= 1;

        out.push_str(&format!(
            " {{\n{}\n{}}}",
            methods.join("\n"),
            "    ".repeat(self.indent)
        ));
        out
    }

    /// `(params) { body }`
    fn function_rest(&mut self, function: &FunctionLiteral) -> String {
        let parameters: Vec<&str> = function
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        format!("({}) {}", parameters.join(", "), self.block(&function.body))
    }

    // ── expressions ─────────────────────────────────────────────────

    fn expression(&mut self, expr: &Expression) -> String {
        match &expr.kind {
            ExprKind::Identifier(name) => name.clone(),

            ExprKind::Prefix { operator, right } => {
                format!("({}{})", operator, self.expression(right))
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                self.expression(left),
                operator,
                self.expression(right)
            ),

            ExprKind::Assign { target, value } => format!(
                "({} = {})",
                self.expression(target),
                self.expression(value)
            ),

            ExprKind::Call {
                function,
                arguments,
            } => format!(
                "{}({})",
                self.expression(function),
                self.list(arguments)
            ),

            ExprKind::If {
                conditions,
                consequences,
                alternative,
            } => {
                let mut out = String::new();

                for (i, (condition, consequence)) in
                    conditions.iter().zip(consequences).enumerate()
                {
                    let keyword = if i == 0 { "if" } else { " elif" };
                    out.push_str(&format!(
                        "{} ({}) {}",
                        keyword,
                        self.expression(condition),
                        self.block(consequence)
                    ));
                }

                if let Some(alternative) = alternative {
                    out.push_str(" else ");
                    out.push_str(&self.block(alternative));
                }

                out
            }

            ExprKind::Index { left, index } => {
                format!("{}[{}]", self.expression(left), self.expression(index))
            }

            ExprKind::Member { object, property } => {
                format!("{}.{}", self.expression(object), property)
            }

            ExprKind::New { class, arguments } => {
                format!("new {}({})", self.expression(class), self.list(arguments))
            }

            ExprKind::Super { method } => match method {
                Some(method) => format!("super.{}", method),
                None => "super".into(),
            },

            ExprKind::Literal(literal) => self.literal(literal),
        }
    }

    fn list(&mut self, items: &[std::rc::Rc<Expression>]) -> String {
        items
            .iter()
            .map(|item| self.expression(item))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn literal(&mut self, literal: &Literal) -> String {
        match literal {
            Literal::Integer(n) => n.to_string(),

            // `{:?}` keeps the fractional part: 3.0 stays a float.
            Literal::Float(n) => format!("{:?}", n),

            Literal::Str(s) => format!("\"{}\"", escape(s, false)),

            Literal::FString(parts) => {
                let mut out = String::from("f\"");

                for part in parts {
                    match part {
                        FStringPart::Text(text) => out.push_str(&escape(text, true)),
                        FStringPart::Expr(expr) => {
                            let text = self.expression(expr);

                            // `{{` would scan as an escaped brace.
                            if text.starts_with('{') {
                                out.push_str(&format!("{{ {}}}", text));
                            } else {
                                out.push_str(&format!("{{{}}}", text));
                            }
                        }
                    }
                }

                out.push('"');
                out
            }

            Literal::Boolean(b) => b.to_string(),

            Literal::Null => "null".into(),

            Literal::Array(elements) => format!("[{}]", self.list(elements)),

            Literal::Function(function) => format!("fn{}", self.function_rest(function)),

            Literal::Hash(pairs) => {
                let items: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.expression(k), self.expression(v)))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }
}

/// Re-escape string contents; f-string text doubles its braces.
fn escape(s: &str, fstring: bool) -> String {
    let mut out = String::with_capacity(s.len());

    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '{' if fstring => out.push_str("{{"),
            '}' if fstring => out.push_str("}}"),
            other => out.push(other),
        }
    }

    out
}
