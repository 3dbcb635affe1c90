// DreamBerd Language Interpreter Library
//
// Lexer, parser and tree-walking evaluator for DreamBerd: a language with
// four kinds of equality, variables that expire, and arrays that start at -1.

// Public modules
pub mod ast;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, Program, Stmt};
pub use error::{DreamError, InterpretationError, ParseError, RuntimeFault, Span};
pub use evaluator::Evaluator;
pub use host::{Clock, Coin, FixedCoin, RandomCoin, SystemClock};
pub use lexer::{tokenize, Lexer, Token, TokenType};
pub use parser::{parse, Parser};
pub use value::Value;

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::{run, run_and_report};
