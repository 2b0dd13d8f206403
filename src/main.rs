use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use stepscript as script;

use script::ast_printer::AstPrinter;
use script::config::{InterpreterConfig, DEFAULT_MAX_CALL_DEPTH};
use script::environment::Environment;
use script::evaluator::Evaluator;
use script::object::Object;
use script::output::ConsoleSink;
use script::stepper::{ExecutionState, StepEvaluator};
use script::token::TokenType;
use script::{parse_program, tokenize};

#[derive(ClapParser, Debug)]
#[command(version, about = "Stepscript interpreter and step debugger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum user function call depth
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Parses input from a file and prints the canonical program
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file and prints the final value
    Run { filename: Option<PathBuf> },

    /// Runs input from a file one evaluation step at a time
    Step {
        filename: Option<PathBuf>,

        /// Print each execution state as JSON
        #[arg(long)]
        json: bool,

        /// After finishing, walk back this many steps
        #[arg(long, default_value_t = 0)]
        rewind: usize,
    },
}

fn read_file(filename: &PathBuf) -> Result<String> {
    script::read_source(filename).context(format!("Failed to read file {:?}", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("stepscript::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Parse `source`, exiting with 65 on syntax errors.
fn parse_or_exit(source: &str) -> script::ast::Program {
    let parsed = parse_program(source);

    if !parsed.is_ok() {
        for e in &parsed.errors {
            debug!("Parse debug: {}", e);
            eprintln!("{}", e);
        }
        std::process::exit(65);
    }

    info!("Parsed {} statements", parsed.program.statements.len());
    parsed.program
}

fn print_state(state: &ExecutionState, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string(state).context("Failed to serialize execution state")?;
        println!("{}", text);
        return Ok(());
    }

    if let Some(step) = &state.current_step {
        let result = step
            .result
            .as_ref()
            .map(|value| format!(" => {}", value.inspect()))
            .unwrap_or_default();

        println!(
            "#{} [{:?}] {} @ {}:{} {}{}",
            step.number,
            step.step_type,
            step.node_kind,
            step.line,
            step.column,
            step.description,
            result
        );
    }

    Ok(())
}

fn missing_input() -> ! {
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let config = InterpreterConfig::default().with_max_call_depth(args.max_depth);

    match args.commands {
        Commands::Tokenize { filename } => {
            let Some(filename) = filename else {
                missing_input();
            };

            info!("Running Tokenize subcommand");
            let source = read_file(&filename)?;
            let mut tokenized = true;

            for token in tokenize(&source) {
                if token.is(&TokenType::ILLEGAL) {
                    tokenized = false;
                    eprintln!("[line {}] Error: {}", token.line(), token.literal);
                    continue;
                }

                println!("{}", token);
            }

            if !tokenized {
                debug!("Tokenization failed, exiting with code 65");
                std::process::exit(65);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename else {
                missing_input();
            };

            info!("Running Parse subcommand");
            let source = read_file(&filename)?;
            let program = parse_or_exit(&source);

            println!("{}", AstPrinter::print_program(&program));
        }

        Commands::Run { filename } => {
            let Some(filename) = filename else {
                missing_input();
            };

            info!("Running Run subcommand");
            let source = read_file(&filename)?;
            let program = parse_or_exit(&source);

            let env = Environment::global();
            let mut sink = ConsoleSink;
            let mut evaluator = Evaluator::with_config(&mut sink, config);

            match evaluator.evaluate(&program, &env) {
                Ok(Object::Error(message)) => {
                    debug!("Runtime debug: {}", message);
                    eprintln!("Runtime error: {}", message);
                    std::process::exit(70);
                }

                Ok(value) => {
                    info!("Program executed successfully");

                    if !matches!(value, Object::Null) {
                        println!("{}", value.inspect());
                    }
                }

                Err(e) => {
                    debug!("Fatal debug: {}", e);
                    eprintln!("{}", e);
                    std::process::exit(70);
                }
            }
        }

        Commands::Step {
            filename,
            json,
            rewind,
        } => {
            let Some(filename) = filename else {
                missing_input();
            };

            info!("Running Step subcommand");
            let source = read_file(&filename)?;
            let program = parse_or_exit(&source);

            let mut stepper = StepEvaluator::with_config(config);
            stepper.prepare(&program);
            print_state(&stepper.state(), json)?;

            let mut fatal = None;

            while !stepper.is_finished() {
                match stepper.next_step() {
                    Ok(state) => print_state(&state, json)?,

                    Err(e) => {
                        print_state(&stepper.state(), json)?;
                        fatal = Some(e);
                        break;
                    }
                }
            }

            for _ in 0..rewind {
                let Some(state) = stepper.previous_step() else {
                    break;
                };
                print_state(&state, json)?;
            }

            if let Some(e) = fatal {
                eprintln!("{}", e);
                std::process::exit(70);
            }

            if let Some(Object::Error(message)) = stepper.result() {
                eprintln!("Runtime error: {}", message);
                std::process::exit(70);
            }

            info!("Stepped run finished after {} steps", stepper.step_count());
        }
    }

    Ok(())
}
