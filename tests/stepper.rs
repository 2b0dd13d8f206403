#[cfg(test)]
mod stepper_tests {
    use stepscript as script;

    use script::error::EvalError;
    use script::output::{OutputEvent, OutputKind};
    use script::stepper::{ExecutionState, StepType};
    use script::{parse_program, Environment, Evaluator, InterpreterConfig, StepEvaluator};

    const PROGRAMS: &[&str] = &[
        "let x = 5; let y = x + 3; y",
        "let fib = fn(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }; fib(7)",
        "[1, 2, 3][5]",
        "const c = 1; c = 2;",
        "{ let inner = 1; } inner",
        "let counter = fn() { let c = 0; return fn() { c += 1; return c; }; };
         let next = counter(); next(); next()",
        r#"class Animal {
               init(name) { this.name = name; }
               speak() { return this.name + " makes a sound"; }
           }
           class Dog extends Animal {
               init(name) { super(name); this.tricks = 0; }
               speak() { return super.speak() + "!"; }
           }
           let d = new Dog("rex");
           d.tricks += 1;
           print(d.speak(), d.tricks);"#,
        "let s = 0;
         for (let i = 0; i < 6; i += 1) { if (i == 2) { continue; } elif (i == 5) { break; } s += i; }
         let n = 0; while (n < 3) { n = n + 1; } [s, n]",
        r#"let h = {"a": 1, 2: [true, null]}; f"{h["a"]} {h[2]} {len(h)}""#,
        "false && missing; true || missing; 1 && 2.5",
        "print(\"a\", 1); let f = fn() { print(\"inside\"); }; f(); push([1], 2)",
        "let find = fn(xs, w) { for (let i = 0; i < len(xs); i += 1) { if (xs[i] == w) { return i; } } return -1; }; find([3, 4], 4)",
        "let a = 1 + \"x\"; print(\"never\");",
    ];

    fn parse(source: &str) -> script::ast::Program {
        let parsed = parse_program(source);
        assert!(parsed.is_ok(), "parse errors: {:?}", parsed.errors);
        parsed.program
    }

    fn direct(
        source: &str,
        config: InterpreterConfig,
    ) -> (Result<String, EvalError>, Vec<OutputEvent>) {
        let program = parse(source);
        let mut events: Vec<OutputEvent> = Vec::new();
        let env = Environment::global();

        let result = Evaluator::with_config(&mut events, config)
            .evaluate(&program, &env)
            .map(|value| value.inspect());

        (result, events)
    }

    fn prepared(source: &str, config: InterpreterConfig) -> StepEvaluator {
        let program = parse(source);
        let mut stepper = StepEvaluator::with_config(config);
        stepper.prepare(&program);
        stepper
    }

    fn to_json(state: &ExecutionState) -> String {
        serde_json::to_string(state).expect("state serializes")
    }

    #[test]
    fn test_stepped_and_direct_runs_agree() {
        for source in PROGRAMS {
            let config = InterpreterConfig::default();
            let (expected, expected_events) = direct(source, config);

            let mut stepper = prepared(source, config);
            let state = stepper.run_to_end().expect("no fatal error");

            assert!(state.is_complete, "run of {:?} did not complete", source);
            assert_eq!(
                Ok(stepper.result().map(|value| value.inspect()).unwrap_or_default()),
                expected,
                "result differs for {:?}",
                source
            );
            assert_eq!(
                stepper.events(),
                expected_events,
                "events differ for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_first_step_is_program_start() {
        let mut stepper = prepared("let x = 1;", InterpreterConfig::default());
        let state = stepper.state();

        let step = state.current_step.as_ref().expect("a seeded step");
        assert_eq!(state.current_step_number, 1);
        assert_eq!(step.step_type, StepType::Before);
        assert_eq!(step.description, "Program started");
        assert_eq!(step.node_kind, "Program");
        assert_eq!(step.node_path, "program");
        assert!(!state.is_complete);

        assert!(stepper.previous_step().is_none());
    }

    #[test]
    fn test_step_numbers_increase_by_one() {
        let mut stepper = prepared(PROGRAMS[1], InterpreterConfig::default());
        let mut last = stepper.state().current_step_number;

        while !stepper.is_finished() {
            let state = stepper.next_step().expect("no fatal error");
            assert_eq!(state.current_step_number, last + 1);
            last = state.current_step_number;
        }

        assert_eq!(last, stepper.step_count());

        // Past the end the final state repeats.
        let again = stepper.next_step().expect("no fatal error");
        assert_eq!(again.current_step_number, last);
        assert!(again.is_complete);
    }

    #[test]
    fn test_every_node_has_before_and_after() {
        let mut stepper = prepared("let y = 1 + 2;", InterpreterConfig::default());
        let mut steps = vec![stepper.state()];

        while !stepper.is_finished() {
            steps.push(stepper.next_step().expect("no fatal error"));
        }

        let kinds: Vec<(StepType, &str)> = steps
            .iter()
            .filter_map(|s| s.current_step.as_ref())
            .map(|s| (s.step_type, s.node_kind))
            .collect();

        for kind in ["LetStatement", "InfixExpression", "IntegerLiteral"] {
            assert!(kinds.contains(&(StepType::Before, kind)), "no before for {}", kind);
            assert!(kinds.contains(&(StepType::After, kind)), "no after for {}", kind);
        }

        assert!(kinds.contains(&(StepType::During, "InfixExpression")));
        assert_eq!(kinds.last(), Some(&(StepType::After, "Program")));
    }

    #[test]
    fn test_rewind_then_replay_restores_state() {
        let mut stepper = prepared(PROGRAMS[6], InterpreterConfig::default());

        for _ in 0..40 {
            stepper.next_step().expect("no fatal error");
        }

        let frontier = to_json(&stepper.state());
        let events_before = stepper.events();
        let recorded = stepper.step_count();

        for _ in 0..15 {
            assert!(stepper.previous_step().is_some());
        }

        assert_eq!(stepper.state().current_step_number, 41 - 15);

        for _ in 0..15 {
            stepper.next_step().expect("no fatal error");
        }

        assert_eq!(to_json(&stepper.state()), frontier);
        assert_eq!(stepper.events(), events_before);
        assert_eq!(stepper.step_count(), recorded);
    }

    #[test]
    fn test_output_follows_cursor() {
        let mut stepper = prepared("print(\"one\"); print(\"two\");", InterpreterConfig::default());
        let end = stepper.run_to_end().expect("no fatal error");

        let entries = end.output.entries();
        let logs: Vec<&str> = entries
            .iter()
            .filter(|entry| entry.kind == OutputKind::Log)
            .map(|entry| entry.message.as_str())
            .collect();
        assert_eq!(logs, vec!["one", "two"]);

        for entry in &entries {
            assert!(entry.step <= end.current_step_number);
        }

        while stepper.previous_step().is_some() {}

        let start = stepper.state();
        assert_eq!(start.current_step_number, 1);
        assert!(start.output.is_empty());
    }

    #[test]
    fn test_call_stack_frames() {
        let source = "let outer = fn(a) { return inner(a + 1); };
                      let inner = fn(b) { return b * 2; };
                      outer(5)";
        let mut stepper = prepared(source, InterpreterConfig::default());

        let mut deepest = Vec::new();

        while !stepper.is_finished() {
            let state = stepper.next_step().expect("no fatal error");

            if state.call_stack.len() > deepest.len() {
                deepest = state.call_stack.clone();
            }
        }

        assert_eq!(deepest.len(), 2);
        assert_eq!(deepest[0].function_name, "outer");
        assert_eq!(deepest[0].arguments, vec!["5"]);
        assert!(!deepest[0].active);
        assert_eq!(deepest[1].function_name, "inner");
        assert_eq!(deepest[1].arguments, vec!["6"]);
        assert!(deepest[1].active);

        let end = stepper.state();
        assert!(end.call_stack.is_empty());
        assert_eq!(stepper.result().map(|value| value.inspect()), Some("12".to_owned()));
    }

    #[test]
    fn test_environment_snapshot() {
        let source = "let x = 5; const k = \"v\"; { let hidden = 1; }";
        let mut stepper = prepared(source, InterpreterConfig::default());
        let end = stepper.run_to_end().expect("no fatal error");

        let environment = &end.current_step.as_ref().expect("final step").environment;

        let x = environment.lookup("x").expect("x is bound");
        assert_eq!(x.value, "5");
        assert!(!x.constant);

        let k = environment.lookup("k").expect("k is bound");
        assert!(k.constant);

        assert!(environment.lookup("hidden").is_none());
    }

    #[test]
    fn test_stack_overflow_is_fatal() {
        let config = InterpreterConfig::default().with_max_call_depth(20);
        let source = "let f = fn(n) { return f(n + 1); }; f(0);";

        let (direct_result, direct_events) = direct(source, config);
        assert_eq!(direct_result, Err(EvalError::StackOverflow { limit: 20 }));

        let mut stepper = prepared(source, config);
        let result = stepper.run_to_end();

        assert_eq!(result.err(), Some(EvalError::StackOverflow { limit: 20 }));
        assert_eq!(stepper.fatal_error(), Some(&EvalError::StackOverflow { limit: 20 }));
        assert!(stepper.is_finished());
        assert_eq!(stepper.events(), direct_events);

        let state = stepper.next_step().expect("finished runs do not fail again");
        assert!(state.is_complete);
        assert_eq!(state.call_stack.len(), 20);

        let last = state.output.last().expect("an error entry");
        assert_eq!(last.kind, OutputKind::Error);
        assert_eq!(last.message, "stack overflow: maximum call depth of 20 exceeded");
    }

    #[test]
    fn test_runtime_error_is_final_result() {
        let source = "let a = [1][3]; print(\"never\");";
        let mut stepper = prepared(source, InterpreterConfig::default());
        let end = stepper.run_to_end().expect("runtime errors are not fatal");

        let step = end.current_step.as_ref().expect("final step");
        assert_eq!(
            step.result.as_ref().map(|value| value.inspect()),
            Some("ERROR: index out of range: 3".to_owned())
        );
        assert_eq!(end.output.last().map(|entry| entry.kind), Some(OutputKind::Error));
    }

    #[test]
    fn test_state_serializes_to_json() {
        let mut stepper = prepared("let x = 1 + 2;", InterpreterConfig::default());
        stepper.next_step().expect("no fatal error");
        let end = stepper.run_to_end().expect("no fatal error");

        let value = serde_json::to_value(&end).expect("state serializes");

        assert_eq!(value["is_complete"], true);
        assert_eq!(value["current_step"]["step_type"], "after");
        assert_eq!(value["current_step"]["node_kind"], "Program");

        let bindings = &value["current_step"]["environment"]["bindings"];
        assert_eq!(bindings[0]["name"], "x");
        assert_eq!(bindings[0]["type"], "INTEGER");

        let output = value["output"].as_array().expect("output is an array");
        assert!(output
            .iter()
            .any(|entry| entry["kind"] == "binding" && entry["message"] == "let x = 3"));
        assert!(output.iter().all(|entry| entry["timestamp"].is_string()));
    }

    #[test]
    fn test_long_loop_runs_to_end() {
        let source = "let i = 0; let total = 0;
                      while (i < 5000) { i = i + 1; total += i; }
                      total";
        let mut stepper = prepared(source, InterpreterConfig::default());
        let end = stepper.run_to_end().expect("no fatal error");

        assert!(end.is_complete);
        assert_eq!(end.current_step_number, stepper.step_count());
        assert!(stepper.step_count() > 100_000);
        assert_eq!(
            stepper.result().map(|value| value.inspect()),
            Some("12502500".to_owned())
        );

        assert_eq!(end.output.len(), stepper.events().len());
        assert!(end.output.len() > 15_000);
    }

    #[test]
    fn test_overflow_at_default_call_depth() {
        let config = InterpreterConfig::default();
        let source = "let f = fn(n) { return f(n + 1); }; f(0);";

        let mut stepper = prepared(source, config);
        let result = stepper.run_to_end();

        let limit = config.max_call_depth;
        assert_eq!(result.err(), Some(EvalError::StackOverflow { limit }));

        let state = stepper.state();
        assert!(state.is_complete);
        assert_eq!(state.call_stack.len(), limit);
        assert!(state.call_stack[..limit - 1].iter().all(|frame| !frame.active));
        assert!(state.call_stack[limit - 1].active);
        assert_eq!(state.call_stack[limit - 1].arguments, vec![(limit - 1).to_string()]);

        // Rewinding restores the shallower stacks recorded on the way down.
        let depths: Vec<usize> = (0..100)
            .filter_map(|_| stepper.previous_step())
            .map(|state| state.call_stack.len())
            .collect();
        assert_eq!(depths.len(), 100);
        assert_eq!(depths.iter().copied().max(), Some(limit));
        assert!(depths.iter().copied().min() < Some(limit));
    }

    #[test]
    fn test_earlier_states_keep_their_output() {
        let mut stepper = prepared(
            "print(\"a\"); print(\"b\"); print(\"c\");",
            InterpreterConfig::default(),
        );

        let mut first_log = None;
        while !stepper.is_finished() {
            let state = stepper.next_step().expect("no fatal error");

            if first_log.is_none() && !state.output.is_empty() {
                first_log = Some(state);
            }
        }

        let early = first_log.expect("a state with output");
        let end = stepper.state();

        assert_eq!(early.output.len(), 1);
        assert_eq!(early.output.last().map(|entry| entry.message), Some("a".to_owned()));
        assert_eq!(end.output.len(), 3);

        stepper.prepare(&parse("print(\"z\");"));
        stepper.run_to_end().expect("no fatal error");

        // A new run starts a new log; old states are unaffected.
        assert_eq!(early.output.len(), 1);
        assert_eq!(end.output.last().map(|entry| entry.message), Some("c".to_owned()));
        assert_eq!(stepper.state().output.len(), 1);
    }

    #[test]
    fn test_prepare_resets_everything() {
        let mut stepper = prepared("print(1);", InterpreterConfig::default());
        stepper.run_to_end().expect("no fatal error");
        assert!(stepper.is_finished());

        stepper.prepare(&parse("2"));

        assert!(!stepper.is_finished());
        assert_eq!(stepper.step_count(), 1);
        assert!(stepper.events().is_empty());
        assert!(stepper.result().is_none());

        stepper.run_to_end().expect("no fatal error");
        assert_eq!(stepper.result().map(|value| value.inspect()), Some("2".to_owned()));
    }
}
