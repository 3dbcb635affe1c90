use dreamberd::lexer::{tokenize, Lexer, Token, TokenType};
use pretty_assertions::assert_eq;

fn types(source: &str) -> Vec<TokenType> {
    tokenize(source).into_iter().map(|token| token.token_type).collect()
}

fn lexemes(source: &str) -> Vec<String> {
    tokenize(source)
        .into_iter()
        .filter(|token| token.token_type != TokenType::Eof)
        .map(|token| token.lexeme)
        .collect()
}

fn first(source: &str) -> Token {
    tokenize(source).remove(0)
}

#[test]
fn equals_runs_are_classified_by_length() {
    assert_eq!(
        types("a = b == c === d ==== e"),
        vec![
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Identifier,
            TokenType::EqualEqual,
            TokenType::Identifier,
            TokenType::EqualEqualEqual,
            TokenType::Identifier,
            TokenType::EqualEqualEqualEqual,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
}

#[test]
fn five_or_more_equals_make_one_separator() {
    assert_eq!(types("====="), vec![TokenType::FileSeparator, TokenType::Eof]);
    assert_eq!(types("=========="), vec![TokenType::FileSeparator, TokenType::Eof]);
}

#[test]
fn arrow_wins_over_equals() {
    assert_eq!(
        types("f => 1"),
        vec![TokenType::Function, TokenType::Arrow, TokenType::Number, TokenType::Eof]
    );
}

#[test]
fn exclamation_run_length_is_priority() {
    let tokens = tokenize("x!!!");
    assert_eq!(tokens[1].token_type, TokenType::Exclamation);
    assert_eq!(tokens[1].lexeme, "!!!");
    assert_eq!(tokens[1].priority, 3);

    let tokens = tokenize("x!");
    assert_eq!(tokens[1].priority, 1);
}

#[test]
fn inverted_exclamation_has_negative_priority() {
    let tokens = tokenize("x¡");
    assert_eq!(tokens[1].token_type, TokenType::InvertedExclamation);
    assert_eq!(tokens[1].priority, -1);
}

#[test]
fn bang_equal_is_not_equal() {
    assert_eq!(
        types("a != b"),
        vec![TokenType::Identifier, TokenType::BangEqual, TokenType::Identifier, TokenType::Eof]
    );
    // Two bangs are still a terminator
    assert_eq!(
        types("a !!= b"),
        vec![
            TokenType::Identifier,
            TokenType::Exclamation,
            TokenType::Equal,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
}

#[test]
fn quote_run_sets_closing_length() {
    let token = first(r#""""say "hi" now""""#);
    assert_eq!(token.token_type, TokenType::String);
    assert_eq!(token.lexeme, r#"say "hi" now"#);

    assert_eq!(lexemes("'single'"), vec!["single".to_string()]);
    assert_eq!(lexemes("''it's''"), vec!["it's".to_string()]);
}

#[test]
fn unterminated_string_runs_to_end() {
    let tokens = tokenize("\"no end in sight");
    assert_eq!(tokens[0].token_type, TokenType::String);
    assert_eq!(tokens[0].lexeme, "no end in sight");
    assert_eq!(tokens[1].token_type, TokenType::Eof);
}

#[test]
fn const_const_const_is_one_token() {
    let tokens = tokenize("const const const pi");
    assert_eq!(tokens[0].token_type, TokenType::ConstConstConst);
    assert_eq!(tokens[0].lexeme, "const const const");
    assert_eq!(tokens[1].token_type, TokenType::Identifier);

    let tokens = tokenize("CONST Const\tconst pi");
    assert_eq!(tokens[0].token_type, TokenType::ConstConstConst);
    assert_eq!(tokens[0].lexeme, "const const const");
}

#[test]
fn two_consts_restore_position() {
    assert_eq!(
        types("const const pi"),
        vec![TokenType::Const, TokenType::Const, TokenType::Identifier, TokenType::Eof]
    );
    assert_eq!(lexemes("const const pi"), vec!["const", "const", "pi"]);
}

#[test]
fn number_words_become_numbers() {
    let tokens = tokenize("print(Seven + twelve)");
    assert_eq!(tokens[2].token_type, TokenType::Number);
    assert_eq!(tokens[2].lexeme, "7");
    assert_eq!(tokens[4].lexeme, "12");

    // Only whole words count
    assert_eq!(first("sevenths").token_type, TokenType::Identifier);
}

#[test]
fn fractions_stay_in_one_number() {
    assert_eq!(lexemes("1/3"), vec!["1/3"]);
    assert_eq!(
        types("x/3"),
        vec![TokenType::Identifier, TokenType::Slash, TokenType::Number, TokenType::Eof]
    );
    assert_eq!(
        types("1 / 3"),
        vec![TokenType::Number, TokenType::Slash, TokenType::Number, TokenType::Eof]
    );
}

#[test]
fn keywords_ignore_case() {
    assert_eq!(first("FUNCTION").token_type, TokenType::Function);
    assert_eq!(first("True").token_type, TokenType::Boolean);
    assert_eq!(first("False").token_type, TokenType::Boolean);
    assert_eq!(first("maybe").token_type, TokenType::Maybe);
    assert_eq!(first("className").token_type, TokenType::Class);
    // The lexeme keeps the spelling that was written
    assert_eq!(first("FUNCTION").lexeme, "FUNCTION");
}

#[test]
fn every_function_spelling() {
    for spelling in ["function", "func", "fun", "fn", "functi", "f", "union"] {
        assert_eq!(first(spelling).token_type, TokenType::Function, "{}", spelling);
    }
}

#[test]
fn undefined_and_null_are_identifiers() {
    assert_eq!(first("undefined").token_type, TokenType::Identifier);
    assert_eq!(first("null").token_type, TokenType::Identifier);
}

#[test]
fn emoji_identifiers() {
    assert_eq!(lexemes("👍 🎯score"), vec!["👍", "🎯score"]);
    assert_eq!(first("$money").token_type, TokenType::Identifier);
}

#[test]
fn comments_emit_nothing() {
    assert_eq!(
        types("// a comment\nprint"),
        vec![TokenType::Identifier, TokenType::Eof]
    );
}

#[test]
fn compound_operators() {
    assert_eq!(
        types("++ -- && || ; <= >="),
        vec![
            TokenType::PlusPlus,
            TokenType::MinusMinus,
            TokenType::AndAnd,
            TokenType::OrOr,
            TokenType::Not,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::Eof,
        ]
    );
}

#[test]
fn unrecognized_characters_are_reported_and_skipped() {
    let mut lexer = Lexer::new("x @ y");
    let tokens = lexer.scan_tokens();

    assert_eq!(
        tokens.iter().map(|token| token.token_type.clone()).collect::<Vec<_>>(),
        vec![TokenType::Identifier, TokenType::Identifier, TokenType::Eof]
    );
    assert_eq!(lexer.diagnostics().len(), 1);
    assert_eq!(lexer.diagnostics()[0].character, '@');
    assert_eq!(lexer.diagnostics()[0].column, 3);
    assert_eq!(
        lexer.diagnostics()[0].to_string(),
        "Skipped unrecognized character '@' at line 1, column 3"
    );
}

#[test]
fn positions_are_one_based() {
    let tokens = tokenize("a\n  b");
    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (2, 3));

    let eof = tokens.last().unwrap();
    assert_eq!(eof.token_type, TokenType::Eof);
    assert_eq!((eof.line, eof.column), (2, 4));
}
