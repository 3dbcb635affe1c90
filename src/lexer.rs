use crate::error::{LexDiagnostic, Span};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Dot,
    Minus,
    Plus,
    Star,
    Slash,
    Caret,
    Percent,
    Less,
    Greater,
    Question,
    /// `;` is logical not.
    Not,

    // One or two character tokens
    LessEqual,
    GreaterEqual,
    PlusPlus,
    MinusMinus,
    AndAnd,
    OrOr,
    Arrow,
    BangEqual,

    // Equals runs, classified by length
    Equal,
    EqualEqual,
    EqualEqualEqual,
    EqualEqualEqualEqual,
    FileSeparator,

    // Terminators carrying a priority
    Exclamation,
    InvertedExclamation,

    // Literals
    Identifier,
    String,
    Number,
    Boolean,
    Maybe,

    // Keywords
    Const,
    ConstConstConst,
    Var,
    Function,
    Async,
    Class,
    If,
    Else,
    When,
    Return,
    Delete,
    Import,
    Export,
    To,
    Reverse,
    Previous,
    Next,
    Current,
    Noop,
    Use,
    New,
    Await,

    // Special
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    /// Only meaningful for exclamation runs (run length) and `¡` (-1).
    pub priority: i32,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: usize, column: usize, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            line,
            column,
            priority: 0,
            span,
        }
    }
}

const NUMBER_NAMES: [(&str, &str); 13] = [
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
    ("eleven", "11"),
    ("twelve", "12"),
];

/// Emoji that may start or continue an identifier.
const IDENTIFIER_EMOJI: [char; 2] = ['👍', '🎯'];
/// Variation selector and keycap, so `1️⃣` style names stay one identifier.
const IDENTIFIER_JOINERS: [char; 2] = ['\u{FE0F}', '\u{20E3}'];

pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).scan_tokens()
}

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    diagnostics: Vec<LexDiagnostic>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
    keywords: HashMap<&'static str, TokenType>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("const", TokenType::Const);
        keywords.insert("var", TokenType::Var);
        for spelling in ["function", "func", "fun", "fn", "functi", "f", "union"] {
            keywords.insert(spelling, TokenType::Function);
        }
        keywords.insert("async", TokenType::Async);
        keywords.insert("class", TokenType::Class);
        keywords.insert("classname", TokenType::Class);
        keywords.insert("if", TokenType::If);
        keywords.insert("else", TokenType::Else);
        keywords.insert("when", TokenType::When);
        keywords.insert("return", TokenType::Return);
        keywords.insert("delete", TokenType::Delete);
        keywords.insert("import", TokenType::Import);
        keywords.insert("export", TokenType::Export);
        keywords.insert("to", TokenType::To);
        keywords.insert("reverse", TokenType::Reverse);
        keywords.insert("previous", TokenType::Previous);
        keywords.insert("next", TokenType::Next);
        keywords.insert("current", TokenType::Current);
        keywords.insert("noop", TokenType::Noop);
        keywords.insert("use", TokenType::Use);
        keywords.insert("new", TokenType::New);
        keywords.insert("await", TokenType::Await);
        keywords.insert("true", TokenType::Boolean);
        keywords.insert("false", TokenType::Boolean);
        keywords.insert("maybe", TokenType::Maybe);

        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
            keywords,
        }
    }

    pub fn diagnostics(&self) -> &[LexDiagnostic] {
        &self.diagnostics
    }

    pub fn scan_tokens(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            self.line,
            self.column,
            Span::new(self.current, self.current),
        ));

        std::mem::take(&mut self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            ':' => self.add_token(TokenType::Colon),
            '.' => self.add_token(TokenType::Dot),
            '*' => self.add_token(TokenType::Star),
            '^' => self.add_token(TokenType::Caret),
            '%' => self.add_token(TokenType::Percent),
            ';' => self.add_token(TokenType::Not),
            '?' => self.add_token(TokenType::Question),
            '+' => {
                let token_type = if self.match_char('+') {
                    TokenType::PlusPlus
                } else {
                    TokenType::Plus
                };
                self.add_token(token_type);
            }
            '-' => {
                let token_type = if self.match_char('-') {
                    TokenType::MinusMinus
                } else {
                    TokenType::Minus
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '>' => {
                let token_type = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '&' if self.peek() == '&' => {
                self.advance();
                self.add_token(TokenType::AndAnd);
            }
            '|' if self.peek() == '|' => {
                self.advance();
                self.add_token(TokenType::OrOr);
            }
            '/' => {
                if self.match_char('/') {
                    // Comment goes until end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '=' => self.equals_run(),
            '!' => self.exclamation_run(),
            '¡' => {
                self.add_token(TokenType::InvertedExclamation);
                if let Some(token) = self.tokens.last_mut() {
                    token.priority = -1;
                }
            }
            '"' | '\'' => self.string(c),
            ' ' | '\r' | '\t' | '\n' => {
                // Whitespace, including newlines, separates tokens only
            }
            c if c.is_ascii_digit() => self.number(),
            c if is_identifier_start(c) => self.identifier(),
            _ => self.skip_unrecognized(c),
        }
    }

    fn skip_unrecognized(&mut self, character: char) {
        let diagnostic = LexDiagnostic {
            character,
            line: self.start_line,
            column: self.start_column,
            span: Span::new(self.start, self.current),
        };
        tracing::warn!(%diagnostic, "lexer skipped character");
        self.diagnostics.push(diagnostic);
    }

    fn advance(&mut self) -> char {
        if self.is_at_end() {
            return '\0';
        }

        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.source.get(self.current + offset).copied().unwrap_or('\0')
    }

    fn count_run(&self, from: usize, c: char) -> usize {
        self.source[from.min(self.source.len())..]
            .iter()
            .take_while(|&&next| next == c)
            .count()
    }

    /// `=>` wins over the run; otherwise the run length picks the token.
    fn equals_run(&mut self) {
        if self.match_char('>') {
            self.add_token(TokenType::Arrow);
            return;
        }

        let length = 1 + self.count_run(self.current, '=');
        for _ in 1..length {
            self.advance();
        }

        let token_type = match length {
            1 => TokenType::Equal,
            2 => TokenType::EqualEqual,
            3 => TokenType::EqualEqualEqual,
            4 => TokenType::EqualEqualEqualEqual,
            _ => TokenType::FileSeparator,
        };
        self.add_token(token_type);
    }

    fn exclamation_run(&mut self) {
        let length = 1 + self.count_run(self.current, '!');

        // A lone `!` glued to a lone `=` is not-equal.
        if length == 1 && self.peek() == '=' && self.peek_next() != '=' && self.peek_next() != '>' {
            self.advance();
            self.add_token(TokenType::BangEqual);
            return;
        }

        for _ in 1..length {
            self.advance();
        }
        self.add_token(TokenType::Exclamation);
        if let Some(token) = self.tokens.last_mut() {
            token.priority = i32::try_from(length).unwrap_or(i32::MAX);
        }
    }

    /// The opening quote run length is the closing delimiter length.
    fn string(&mut self, quote: char) {
        let quote_count = 1 + self.count_run(self.current, quote);
        for _ in 1..quote_count {
            self.advance();
        }

        let mut value = String::new();
        while !self.is_at_end() {
            if self.peek() == quote && self.count_run(self.current, quote) >= quote_count {
                for _ in 0..quote_count {
                    self.advance();
                }
                self.add_token_with_content(TokenType::String, value);
                return;
            }
            value.push(self.advance());
        }

        // Unterminated strings run to the end of input.
        self.add_token_with_content(TokenType::String, value);
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() || self.peek() == '.' {
            self.advance();
        }

        // Fractions stay as raw text until evaluation
        if self.peek() == '/' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        self.add_token(TokenType::Number);
    }

    fn identifier(&mut self) {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let lowered = text.to_lowercase();

        if let Some((_, digits)) = NUMBER_NAMES.iter().find(|(name, _)| *name == lowered) {
            self.add_token_with_content(TokenType::Number, digits.to_string());
            return;
        }

        if lowered == "const" && self.const_const_const() {
            self.add_token_with_content(TokenType::ConstConstConst, "const const const".to_string());
            return;
        }

        let token_type = self
            .keywords
            .get(lowered.as_str())
            .cloned()
            .unwrap_or(TokenType::Identifier);

        self.add_token_with_content(token_type, text);
    }

    /// Looks past horizontal whitespace for two more `const` words. On failure
    /// the scan position is restored to just after the first one.
    fn const_const_const(&mut self) -> bool {
        let saved = (self.current, self.line, self.column);

        for _ in 0..2 {
            while matches!(self.peek(), ' ' | '\t') {
                self.advance();
            }
            let word_length = self.source[self.current..]
                .iter()
                .take_while(|c| c.is_alphabetic())
                .count();
            let word: String = self.source[self.current..self.current + word_length]
                .iter()
                .collect();
            if !word.eq_ignore_ascii_case("const") {
                (self.current, self.line, self.column) = saved;
                return false;
            }
            for _ in 0..word_length {
                self.advance();
            }
        }

        true
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.add_token_with_content(token_type, text);
    }

    fn add_token_with_content(&mut self, token_type: TokenType, lexeme: String) {
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            self.start_line,
            self.start_column,
            Span::new(self.start, self.current),
        ));
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || IDENTIFIER_EMOJI.contains(&c)
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric()
        || c == '_'
        || c == '$'
        || IDENTIFIER_EMOJI.contains(&c)
        || IDENTIFIER_JOINERS.contains(&c)
}
