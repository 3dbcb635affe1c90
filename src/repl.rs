use crate::ast::Stmt;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::Value;
use std::io::{self, Write};

/// Interactive loop over one persistent evaluator, so declarations, classes
/// and the reverse flag carry over from line to line.
pub fn start() {
    println!("DreamBerd Interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or 'quit' to leave");
    println!();

    let mut evaluator = Evaluator::new().with_echo(true);

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                run_repl_command(&terminated(line), &mut evaluator);
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

/// Lines typed without a terminator get a `!`.
fn terminated(line: &str) -> String {
    if line.ends_with(['!', '?', '¡', '}']) {
        line.to_string()
    } else {
        format!("{}!", line)
    }
}

fn run_repl_command(source: &str, evaluator: &mut Evaluator) {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.scan_tokens();
    for diagnostic in lexer.diagnostics() {
        diagnostic.report(source, None);
    }

    let program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };

    let emitted_before = evaluator.output().len();
    match evaluator.interpret(&program) {
        Ok(value) => {
            // Echo the value of a lone expression that printed nothing itself
            let lone_expression = matches!(
                program.statements.as_slice(),
                [Stmt::Expression { debug: false, .. }]
            );
            let printed = evaluator.output().len() > emitted_before;
            if lone_expression && !printed && !matches!(value, Value::Undefined) {
                println!("{}", value);
            }
        }
        Err(error) => error.report(source, None),
    }
}

