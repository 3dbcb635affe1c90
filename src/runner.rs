use crate::error::DreamError;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::{parse, Parser};

/// Parses and runs `source` in a fresh evaluator and returns every emitted
/// line. Nothing is written to stdout.
pub fn run(source: &str) -> Result<Vec<String>, DreamError> {
    let program = parse(source)?;

    let mut evaluator = Evaluator::new();
    evaluator.interpret(&program)?;
    Ok(evaluator.output().to_vec())
}

/// Runs `source` with output echoed live and every problem rendered as a
/// diagnostic on stderr. Returns false if the run failed.
pub fn run_and_report(source: &str, filename: Option<&str>) -> bool {
    // Lexical analysis
    let mut lexer = Lexer::new(source);
    let tokens = lexer.scan_tokens();
    for diagnostic in lexer.diagnostics() {
        diagnostic.report(source, filename);
    }

    // Parsing
    let program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(error) => {
            error.report(source, filename);
            return false;
        }
    };

    // Evaluation
    let mut evaluator = Evaluator::new().with_echo(true);
    match evaluator.interpret(&program) {
        Ok(_) => true,
        Err(error) => {
            error.report(source, filename);
            false
        }
    }
}
