#[cfg(test)]
mod evaluator_tests {
    use stepscript as script;

    use script::error::{EvalError, LangError};
    use script::object::Object;
    use script::output::{NullSink, OutputEvent, OutputKind};
    use script::{
        parse_program, read_source, run_source, Environment, Evaluator, InterpreterConfig,
    };

    fn run_with(
        source: &str,
        config: InterpreterConfig,
    ) -> (Result<Object, EvalError>, Vec<OutputEvent>) {
        let parsed = parse_program(source);
        assert!(parsed.is_ok(), "parse errors: {:?}", parsed.errors);

        let mut events: Vec<OutputEvent> = Vec::new();
        let env = Environment::global();
        let result = Evaluator::with_config(&mut events, config).evaluate(&parsed.program, &env);

        (result, events)
    }

    fn run(source: &str) -> (Object, Vec<OutputEvent>) {
        let (result, events) = run_with(source, InterpreterConfig::default());

        match result {
            Ok(value) => (value, events),
            Err(e) => panic!("unexpected fatal error for {:?}: {}", source, e),
        }
    }

    /// Evaluate and render the final value.
    fn eval(source: &str) -> String {
        run(source).0.inspect()
    }

    fn messages(events: &[OutputEvent], kind: OutputKind) -> Vec<&str> {
        events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.as_str())
            .collect()
    }

    #[test]
    fn test_let_binding_arithmetic() {
        let (value, events) = run("let x = 5; let y = x + 3; y");

        assert_eq!(value.inspect(), "8");

        let rendered: Vec<(OutputKind, &str)> =
            events.iter().map(|e| (e.kind, e.message.as_str())).collect();
        assert_eq!(
            rendered,
            vec![
                (OutputKind::Binding, "let x = 5"),
                (OutputKind::Operation, "5 + 3 => 8"),
                (OutputKind::Binding, "let y = 8"),
            ]
        );
    }

    #[test]
    fn test_recursive_fibonacci() {
        let source = "
            let fib = fn(n) {
                if (n < 2) { return n; }
                return fib(n - 1) + fib(n - 2);
            };
            fib(7)
        ";

        let (value, events) = run(source);
        assert_eq!(value.inspect(), "13");
        assert_eq!(messages(&events, OutputKind::Return).last(), Some(&"fib returned 13"));
    }

    #[test]
    fn test_index_out_of_range_is_error() {
        let (value, events) = run("[1, 2, 3][5]");

        assert!(value.is_error());
        assert_eq!(value.inspect(), "ERROR: index out of range: 5");
        assert_eq!(messages(&events, OutputKind::Error), vec!["index out of range: 5"]);
    }

    #[test]
    fn test_errors_stop_the_program() {
        let (value, events) = run("let a = 1 / 0; print(\"unreachable\");");

        assert_eq!(value.inspect(), "ERROR: division by zero");
        assert!(messages(&events, OutputKind::Log).is_empty());
    }

    #[test]
    fn test_const_reassignment_is_error() {
        assert_eq!(
            eval("const c = 1; c = 2;"),
            "ERROR: cannot assign to constant 'c'"
        );
    }

    #[test]
    fn test_redeclaration_and_undeclared_assignment() {
        assert_eq!(
            eval("let a = 1; let a = 2;"),
            "ERROR: cannot redeclare 'a' in the same scope"
        );
        assert_eq!(eval("z = 1;"), "ERROR: identifier not found: z");
    }

    #[test]
    fn test_block_scoping() {
        assert_eq!(
            eval("{ let inner = 1; } inner"),
            "ERROR: identifier not found: inner"
        );
        assert_eq!(eval("let a = 1; { let a = 2; a = 3; } a"), "1");
        assert_eq!(eval("let a = 1; { a = 3; } a"), "3");
        assert_eq!(
            eval("for (let i = 0; i < 1; i += 1) {} i"),
            "ERROR: identifier not found: i"
        );
    }

    #[test]
    fn test_closure_counter() {
        let source = "
            let counter = fn() {
                let c = 0;
                return fn() { c = c + 1; return c; };
            };
            let next = counter();
            let a = next();
            let b = next();
            [a, b]
        ";

        assert_eq!(eval(source), "[1, 2]");
    }

    #[test]
    fn test_classes_inheritance_and_super() {
        let source = r#"
            class Animal {
                init(name) { this.name = name; }
                speak() { return this.name + " makes a sound"; }
            }
            class Dog extends Animal {
                speak() { return super.speak() + "!"; }
            }
            let d = new Dog("rex");
            d.speak()
        "#;

        let (value, events) = run(source);
        assert_eq!(value.inspect(), "rex makes a sound!");

        let bindings = messages(&events, OutputKind::Binding);
        assert!(bindings.contains(&"class Animal defined"));
        assert!(bindings.contains(&"class Dog defined"));
        assert!(bindings.contains(&"<Dog instance>.name = rex"));
    }

    #[test]
    fn test_bare_super_calls_parent_init() {
        let source = "
            class A { init(x) { this.x = x; } }
            class B extends A { init(x, y) { super(x); this.y = y; } }
            let b = new B(1, 2);
            [b.x, b.y]
        ";

        assert_eq!(eval(source), "[1, 2]");
    }

    #[test]
    fn test_class_errors() {
        assert_eq!(
            eval("class P {} let p = new P(); p.missing"),
            "ERROR: undefined property 'missing' on P instance"
        );
        assert_eq!(
            eval("class P {} new P(1)"),
            "ERROR: wrong number of arguments: expected 0, got 1"
        );
        assert_eq!(eval("let x = 1; new x()"), "ERROR: not a class: INTEGER");
        assert_eq!(
            eval("let NotAClass = 3; class C extends NotAClass {}"),
            "ERROR: superclass must be a class, got INTEGER"
        );
    }

    #[test]
    fn test_member_assignment_event() {
        let (_, events) = run("class P {} let p = new P(); p.x = 3;");

        assert!(messages(&events, OutputKind::Binding).contains(&"<P instance>.x = 3"));
    }

    #[test]
    fn test_truthiness_and_branches() {
        let (value, events) = run("if (0) { \"yes\" } else { \"no\" }");
        assert_eq!(value.inspect(), "yes");
        assert_eq!(messages(&events, OutputKind::Branch), vec!["if branch taken"]);

        let source = "if (null) { 1 } elif (false) { 2 } elif (\"\") { 3 } else { 4 }";
        let (value, events) = run(source);
        assert_eq!(value.inspect(), "3");
        assert_eq!(messages(&events, OutputKind::Branch), vec!["elif branch 2 taken"]);

        let (value, events) = run("if (false) { 1 } else { 4 }");
        assert_eq!(value.inspect(), "4");
        assert_eq!(messages(&events, OutputKind::Branch), vec!["else branch taken"]);

        assert_eq!(eval("if (false) { 1 }"), "null");
    }

    #[test]
    fn test_branch_event_precedes_block_output() {
        let (_, events) = run("if (1 < 2) { print(\"hi\"); }");

        let rendered: Vec<(OutputKind, &str)> =
            events.iter().map(|e| (e.kind, e.message.as_str())).collect();
        assert_eq!(
            rendered,
            vec![
                (OutputKind::Operation, "1 < 2 => true"),
                (OutputKind::Branch, "if branch taken"),
                (OutputKind::Log, "hi"),
            ]
        );
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(eval("1 && \"x\""), "true");
        assert_eq!(eval("null || 0"), "true");
        assert_eq!(eval("false || null"), "false");

        // The right side is never evaluated once the left decides.
        let (value, events) = run("false && undefined_name");
        assert_eq!(value.inspect(), "false");
        assert!(events.is_empty());
        assert_eq!(eval("true || undefined_name"), "true");
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(eval("1 + 2.5"), "3.5");
        assert_eq!(eval("7 / 2"), "3");
        assert_eq!(eval("7.0 / 2"), "3.5");
        assert_eq!(eval("2 * 1.5"), "3.0");
        assert_eq!(eval("-7 % 3"), "-1");
        assert_eq!(eval("1 == 1.0"), "true");
        assert_eq!(eval("1 / 0"), "ERROR: division by zero");
        assert_eq!(eval("9223372036854775807 + 1"), "ERROR: integer overflow");
    }

    #[test]
    fn test_operator_type_errors() {
        assert_eq!(eval("1 + \"a\""), "ERROR: type mismatch: INTEGER + STRING");
        assert_eq!(eval("\"a\" - \"b\""), "ERROR: unknown operator: STRING - STRING");
        assert_eq!(eval("-true"), "ERROR: unknown operator: -BOOLEAN");
        assert_eq!(eval("\"a\" + \"b\""), "ab");
        assert_eq!(eval("\"a\" < \"b\""), "true");
        assert_eq!(eval("[1, [2]] == [1, [2]]"), "true");
        assert_eq!(eval("null == false"), "false");
    }

    #[test]
    fn test_loops() {
        let source = "
            let s = 0;
            for (let i = 0; i < 5; i += 1) {
                if (i == 3) { continue; }
                s += i;
            }
            s
        ";
        assert_eq!(eval(source), "7");

        let source = "
            let n = 0;
            while (true) {
                n += 1;
                if (n >= 4) { break; }
            }
            n
        ";
        assert_eq!(eval(source), "4");
    }

    #[test]
    fn test_return_inside_loop_leaves_function() {
        let source = "
            let find = fn(items, wanted) {
                for (let i = 0; i < len(items); i += 1) {
                    if (items[i] == wanted) { return i; }
                }
                return -1;
            };
            [find([4, 5, 6], 6), find([4], 9)]
        ";

        assert_eq!(eval(source), "[2, -1]");
    }

    #[test]
    fn test_hashes() {
        let source = r#"
            let h = {"a": 1, 2: "two", true: 3};
            [h["a"], h[2], h[true], h["missing"], h.a]
        "#;

        assert_eq!(eval(source), "[1, \"two\", 3, null, 1]");
        assert_eq!(eval("let h = {[1]: 2}; h"), "ERROR: unusable as hash key: ARRAY");
        assert_eq!(eval("1[0]"), "ERROR: index operator not supported: INTEGER[INTEGER]");
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("len(\"héllo\")"), "5");
        assert_eq!(eval("len([1, 2]) + len({1: 2})"), "3");
        assert_eq!(eval("let a = [1]; let b = push(a, 2); [a, b]"), "[[1], [1, 2]]");
        assert_eq!(eval("[first([7, 8]), last([7, 8]), rest([7, 8])]"), "[7, 8, [8]]");
        assert_eq!(eval("rest([])"), "null");
        assert_eq!(eval("type(1.5)"), "FLOAT");
        assert_eq!(eval("str([1, \"a\"])"), "[1, \"a\"]");
        assert_eq!(
            eval("len(1)"),
            "ERROR: argument to `len` not supported, got INTEGER"
        );
        assert_eq!(
            eval("len()"),
            "ERROR: wrong number of arguments: expected 1, got 0"
        );
        assert_eq!(eval("len"), "<builtin len>");
    }

    #[test]
    fn test_print_emits_log_events() {
        let (value, events) = run("print(\"a\", 1, [1, \"b\"], 2.0)");

        assert_eq!(value.inspect(), "null");
        assert_eq!(messages(&events, OutputKind::Log), vec!["a 1 [1, \"b\"] 2.0"]);
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(eval("let x = 1; x()"), "ERROR: not a function: INTEGER");
        assert_eq!(
            eval("let f = fn(a) { a }; f(1, 2)"),
            "ERROR: wrong number of arguments: expected 1, got 2"
        );
        assert_eq!(eval("let f = fn(a, b) { a }; f"), "<fn f(a, b)>");
    }

    #[test]
    fn test_fstring_interpolation() {
        assert_eq!(eval("let n = \"x\"; f\"{n}={1 + 1} {{ok}}\""), "x=2 {ok}");
    }

    #[test]
    fn test_deep_recursion_within_limit() {
        let source = "
            let down = fn(n) { if (n == 0) { return 0; } return down(n - 1); };
            down(900)
        ";

        assert_eq!(eval(source), "0");
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let config = InterpreterConfig::default().with_max_call_depth(50);
        let (result, events) = run_with("let f = fn(n) { return f(n + 1); }; f(0);", config);

        assert_eq!(result.err(), Some(EvalError::StackOverflow { limit: 50 }));

        let last = events.last().map(|e| (e.kind, e.message.as_str()));
        assert_eq!(
            last,
            Some((
                OutputKind::Error,
                "stack overflow: maximum call depth of 50 exceeded"
            ))
        );
    }

    #[test]
    fn test_run_source_error_channels() {
        let config = InterpreterConfig::default();

        match run_source("let = 1;", &mut NullSink, config) {
            Err(LangError::Parse(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected parse error, got {:?}", other),
        }

        match run_source("1 / 0", &mut NullSink, config) {
            Err(LangError::Runtime(message)) => assert_eq!(message, "division by zero"),
            other => panic!("expected runtime error, got {:?}", other),
        }

        match run_source("let f = fn() { return 2; }; f()", &mut NullSink, config) {
            Ok(value) => assert_eq!(value.inspect(), "2"),
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_read_source_error_channels() {
        let dir = std::env::temp_dir();

        let missing = dir.join(format!("stepscript-missing-{}.ss", std::process::id()));
        match read_source(&missing) {
            Err(LangError::Io(_)) => {}
            other => panic!("expected an I/O error, got {:?}", other),
        }

        let binary = dir.join(format!("stepscript-binary-{}.ss", std::process::id()));
        std::fs::write(&binary, [b'1', 0xff, 0xfe]).expect("temp file is writable");
        let result = read_source(&binary);
        std::fs::remove_file(&binary).expect("temp file is removable");

        match result {
            Err(LangError::Utf8(_)) => {}
            other => panic!("expected a UTF-8 error, got {:?}", other),
        }

        let text = dir.join(format!("stepscript-text-{}.ss", std::process::id()));
        std::fs::write(&text, "let x = 1;\nx").expect("temp file is writable");
        let result = read_source(&text);
        std::fs::remove_file(&text).expect("temp file is removable");

        assert_eq!(result.ok().as_deref(), Some("let x = 1;\nx"));
    }
}
