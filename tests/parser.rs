#[cfg(test)]
mod parser_tests {
    use stepscript as script;

    use script::ast::{ExprKind, Literal, StmtKind};
    use script::ast_printer::AstPrinter;
    use script::parse_program;
    use script::token::Position;

    /// Parse `source`, insist it is error free and return its canonical form.
    fn print(source: &str) -> String {
        let parsed = parse_program(source);

        assert!(
            parsed.is_ok(),
            "unexpected parse errors for {:?}: {:?}",
            source,
            parsed.errors
        );

        AstPrinter::print_program(&parsed.program)
    }

    fn error_messages(source: &str) -> Vec<String> {
        parse_program(source)
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_precedence_01_arithmetic() {
        assert_eq!(print("1 + 2 * 3"), "(1 + (2 * 3));");
        assert_eq!(print("(1 + 2) * 3"), "((1 + 2) * 3);");
        assert_eq!(print("10 - 4 - 3"), "((10 - 4) - 3);");
        assert_eq!(print("7 % 4 / 2"), "((7 % 4) / 2);");
    }

    #[test]
    fn test_precedence_02_prefix_and_comparison() {
        assert_eq!(print("-a * b"), "((-a) * b);");
        assert_eq!(print("!true == false"), "((!true) == false);");
        assert_eq!(print("1 + 2 < 4 == true"), "(((1 + 2) < 4) == true);");
    }

    #[test]
    fn test_precedence_03_logical() {
        assert_eq!(print("a || b && c"), "(a || (b && c));");
        assert_eq!(print("a && b || c"), "((a && b) || c);");
    }

    #[test]
    fn test_precedence_04_postfix_chains() {
        assert_eq!(print("a.b(1)[2]"), "a.b(1)[2];");
        assert_eq!(print("-f(x)"), "(-f(x));");
        assert_eq!(print("new Point(1, 2).x"), "new Point(1, 2).x;");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(print("a = b = 3"), "(a = (b = 3));");
        assert_eq!(print("p.x = 1"), "(p.x = 1);");
    }

    #[test]
    fn test_compound_assignment_desugars() {
        assert_eq!(print("x += 1"), "(x = (x + 1));");
        assert_eq!(print("x *= y - 1"), "(x = (x * (y - 1)));");
    }

    #[test]
    fn test_declarations() {
        assert_eq!(print("let x = 5;"), "let x = 5;");
        assert_eq!(print("let x;"), "let x;");
        assert_eq!(print("const name = \"a\";"), "const name = \"a\";");
    }

    #[test]
    fn test_function_literal_takes_binding_name() {
        let parsed = parse_program("let add = fn(a, b) { return a + b; };");
        assert!(parsed.is_ok());

        match &parsed.program.statements[0].kind {
            StmtKind::Let {
                value: Some(value), ..
            } => match &value.kind {
                ExprKind::Literal(Literal::Function(function)) => {
                    assert_eq!(function.name.as_deref(), Some("add"));
                    assert_eq!(function.parameters.len(), 2);
                }
                other => panic!("expected function literal, got {:?}", other),
            },
            other => panic!("expected let statement, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else_chain() {
        let printed = print("if (a) { 1 } elif (b) { 2 } else if (c) { 3 } else { 4 }");

        assert_eq!(
            printed,
            "if (a) {\n    1;\n} elif (b) {\n    2;\n} elif (c) {\n    3;\n} else {\n    4;\n};"
        );
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            print("for (let i = 0; i < 3; i += 1) { continue; }"),
            "for (let i = 0; (i < 3); (i = (i + 1))) {\n    continue;\n}"
        );
        assert_eq!(print("for (;;) { break; }"), "for (;;) {\n    break;\n}");
        assert_eq!(print("while (true) {}"), "while (true) {}");
    }

    #[test]
    fn test_class_declaration() {
        let printed = print(
            "class B extends A { init(x) { this.x = x; } get() { return super.get() + 1; } }",
        );

        assert_eq!(
            printed,
            "class B extends A {\n    init(x) {\n        (this.x = x);\n    }\n    get() {\n        return (super.get() + 1);\n    }\n}"
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(print("3.0"), "3.0;");
        assert_eq!(print(".5"), "0.5;");
        assert_eq!(print("[1, \"two\", null]"), "[1, \"two\", null];");
        assert_eq!(print("let h = {\"a\": 1, 2: true};"), "let h = {\"a\": 1, 2: true};");
        assert_eq!(print("\"tab\\tquote\\\"\""), "\"tab\\tquote\\\"\";");
    }

    #[test]
    fn test_fstring_literal() {
        assert_eq!(print("f\"x = {x + 1}!\""), "f\"x = {(x + 1)}!\";");
        assert_eq!(print("f\"{{literal}}\""), "f\"{{literal}}\";");
    }

    #[test]
    fn test_hash_statement_is_parenthesized() {
        assert_eq!(print("({1: 2})[1];"), "({1: 2}[1]);");
    }

    #[test]
    fn test_positions_are_recorded() {
        let parsed = parse_program("let a = 1;\n  a + 2;");
        assert!(parsed.is_ok());

        let second = &parsed.program.statements[1];
        assert_eq!(second.position(), Position::new(2, 3));
    }

    #[test]
    fn test_error_01_missing_identifier() {
        let parsed = parse_program("let = 5;");

        assert_eq!(parsed.errors.len(), 1);

        let error = &parsed.errors[0];
        assert_eq!(
            error.message,
            "expected next token to be IDENT, got ASSIGN instead"
        );
        assert_eq!((error.line, error.column), (1, 5));
        assert_eq!(
            error.to_string(),
            "[line 1, column 5] Error: expected next token to be IDENT, got ASSIGN instead"
        );
    }

    #[test]
    fn test_error_02_recovery_continues_with_next_statement() {
        let parsed = parse_program("let = 1; let y = 2;");

        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.program.statements.len(), 1);
        assert_eq!(
            AstPrinter::print_program(&parsed.program),
            "let y = 2;"
        );
    }

    #[test]
    fn test_error_03_semantic_reports() {
        assert_eq!(error_messages("break;"), vec!["'break' outside of a loop"]);
        assert_eq!(error_messages("1 = 2;"), vec!["invalid assignment target"]);
        assert_eq!(
            error_messages("const c;"),
            vec!["missing initializer in const declaration 'c'"]
        );
        assert_eq!(
            error_messages("class A extends A {}"),
            vec!["class 'A' cannot extend itself"]
        );
    }

    #[test]
    fn test_error_04_illegal_token_surfaces() {
        let messages = error_messages("let x = 1 $ 2;");

        assert!(
            messages.iter().any(|m| m.contains("unexpected character '$'")),
            "got {:?}",
            messages
        );
    }

    #[test]
    fn test_pretty_print_is_fixed_point() {
        let source = r#"
            let fib = fn(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); };
            const limit = 10;
            let counter = fn() { let c = 0; return fn() { c += 1; c }; };
            class Animal {
                init(name) { this.name = name; }
                speak() { return f"{this.name} makes a sound {{ok}}"; }
            }
            class Dog extends Animal {
                speak() { return super.speak() + "!"; }
            }
            let d = new Dog("rex");
            let data = {"k": [1, 2.5, -3], true: null};
            for (let i = 0; i < limit; i += 1) {
                if (i % 2 == 0) { continue; } elif (i > 7) { break; } else { print(i); }
            }
            while (!false && data["k"][0] >= 1) { data = {"k": rest(data["k"])}; }
            f"nested { {1: 2}[1] } and {len("s")}";
            ({});
        "#;

        let first = print(source);
        let second = print(&first);

        assert_eq!(first, second);
    }
}
