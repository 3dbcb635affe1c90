use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Character offsets into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start, other.end.max(self.end))
    }
}

fn print_report(
    source: &str,
    filename: Option<&str>,
    span: Span,
    title: &str,
    color: Color,
    message: &str,
    help: Option<&str>,
) {
    let filename = filename.unwrap_or("<repl>");
    let end = span.end.max(span.start + 1);

    let mut report_builder = Report::build(ReportKind::Error, filename, span.start)
        .with_message(format!("{}: {}", title.fg(color), message))
        .with_label(
            Label::new((filename, span.start..end))
                .with_message(message)
                .with_color(color),
        );

    if let Some(help_text) = help {
        report_builder = report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
    }

    if let Err(error) = report_builder
        .finish()
        .eprint((filename, Source::from(source)))
    {
        eprintln!("{}: {} ({})", title, message, error);
    }
}

/// An unrecognized character the lexer skipped over.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Skipped unrecognized character '{character}' at line {line}, column {column}")]
pub struct LexDiagnostic {
    pub character: char,
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

impl LexDiagnostic {
    pub fn report(&self, source: &str, filename: Option<&str>) {
        let message = format!("Skipped unrecognized character '{}'", self.character);
        print_report(source, filename, self.span, "Lexical Warning", Color::Red, &message, None);
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub span: Span,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(message: String, line: usize, column: usize, span: Span) -> Self {
        Self {
            message,
            line,
            column,
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        print_report(
            source,
            filename,
            self.span,
            "Parse Error",
            Color::Yellow,
            &self.message,
            self.help.as_deref(),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFault {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Variable '{0}' has been deleted")]
    DeletedVariable(String),

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    #[error("Undefined class: {0}")]
    UndefinedClass(String),

    #[error("Can't have more than one '{0}' instance!")]
    DuplicateInstance(String),

    #[error("Property '{0}' not found")]
    MissingMember(String),

    #[error("Cannot {operation} non-numeric value of type {type_name}")]
    NonNumericStep {
        operation: &'static str,
        type_name: &'static str,
    },

    #[error("Cannot repeat a string of length {length} {times} times")]
    OversizedRepeat { length: usize, times: usize },

    #[error("Array index out of bounds: {0}")]
    IndexOutOfRange(String),

    #[error("Cannot perform arithmetic on deleted value {0}")]
    PoisonedArithmetic(String),

    #[error("Unsupported operand types for '{operator}': {left} and {right}")]
    TypeMismatch {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("Can only index arrays, got {0}")]
    NotIndexable(&'static str),

    #[error("Cannot reassign global constant '{0}'")]
    ImmutableGlobal(String),

    #[error("Nothing named '{0}' has been exported")]
    MissingExport(String),

    #[error("'{0}' can only be used with variables")]
    InvalidTemporalTarget(&'static str),

    #[error("The '{0}' operator is not implemented")]
    UnimplementedOperator(&'static str),
}

impl RuntimeFault {
    pub fn at(self, span: Span) -> RuntimeError {
        RuntimeError { fault: self, span }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            RuntimeFault::DeletedVariable(_) => {
                Some("Deleted variables stay deleted; declare a new one with a different name.")
            }
            RuntimeFault::DuplicateInstance(_) => {
                Some("Classes may only ever be instantiated once. Reuse the existing instance.")
            }
            RuntimeFault::IndexOutOfRange(_) => {
                Some("Arrays start at -1: the first element is arr[-1], the second arr[0].")
            }
            RuntimeFault::ImmutableGlobal(_) => {
                Some("'const const const' values can never change.")
            }
            _ => None,
        }
    }
}

/// A fault located at the expression or statement that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{fault}")]
pub struct RuntimeError {
    pub fault: RuntimeFault,
    pub span: Span,
}

/// The first runtime fault of a run plus the output emitted before it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Interpretation error: {fault}")]
pub struct InterpretationError {
    pub fault: RuntimeFault,
    pub span: Span,
    pub output: Vec<String>,
}

impl InterpretationError {
    pub fn new(error: RuntimeError, output: Vec<String>) -> Self {
        Self {
            fault: error.fault,
            span: error.span,
            output,
        }
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        print_report(
            source,
            filename,
            self.span,
            "Runtime Error",
            Color::Magenta,
            &self.fault.to_string(),
            self.fault.help(),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DreamError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Interpretation(#[from] InterpretationError),
}

impl DreamError {
    pub fn report(&self, source: &str, filename: Option<&str>) {
        match self {
            DreamError::Parse(error) => error.report(source, filename),
            DreamError::Interpretation(error) => error.report(source, filename),
        }
    }
}
