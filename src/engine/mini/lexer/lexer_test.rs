use super::Lexer;
use crate::engine::mini::token::TokenType;

fn types(input: &str) -> Vec<TokenType> {
    Lexer::new(input, 1, true)
        .tokenize()
        .into_iter()
        .map(|t| t.token_type)
        .collect()
}

#[test]
fn operators_take_the_longest_match() {
    assert_eq!(
        types("= == === != !== <= >= && || !"),
        vec![
            TokenType::Assign,
            TokenType::Eq,
            TokenType::StrictEq,
            TokenType::NotEq,
            TokenType::StrictNotEq,
            TokenType::Lte,
            TokenType::Gte,
            TokenType::And,
            TokenType::Or,
            TokenType::Bang,
            TokenType::Eof,
        ]
    );
}

#[test]
fn keywords_and_identifiers() {
    assert_eq!(
        types("var let function typeof undefined foo_1 $x"),
        vec![
            TokenType::Var,
            TokenType::Let,
            TokenType::Function,
            TokenType::Typeof,
            TokenType::Undefined,
            TokenType::Ident,
            TokenType::Ident,
            TokenType::Eof,
        ]
    );
}

#[test]
fn let_is_an_identifier_at_old_language_levels() {
    let tokens = Lexer::new("let", 1, false).tokenize();
    assert_eq!(tokens[0].token_type, TokenType::Ident);
}

#[test]
fn numbers_with_fraction_and_exponent() {
    let tokens = Lexer::new("3.25 1e3 2E-2 7.", 1, true).tokenize();
    let literals: Vec<_> = tokens.iter().map(|t| t.literal.as_str()).collect();
    assert_eq!(literals, vec!["3.25", "1e3", "2E-2", "7", ".", ""]);
}

#[test]
fn string_escapes_are_cooked() {
    let tokens = Lexer::new(r#"'it\'s' "a\tb\n""#, 1, true).tokenize();
    assert_eq!(tokens[0].literal, "it's");
    assert_eq!(tokens[1].literal, "a\tb\n");
}

#[test]
fn string_cannot_span_lines() {
    let tokens = Lexer::new("'abc\n'", 1, true).tokenize();
    assert_eq!(tokens[0].token_type, TokenType::UnterminatedString);
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        types("1 // two\n/* three\n */ 4"),
        vec![TokenType::Number, TokenType::Number, TokenType::Eof]
    );
}

#[test]
fn unterminated_comment_ends_the_stream() {
    let tokens = Lexer::new("1 /* open", 1, true).tokenize();
    let last = tokens.last().unwrap();
    assert_eq!(last.token_type, TokenType::UnterminatedComment);
    assert!(last.is_end_of_input());
    assert_eq!((last.line, last.column), (1, 3));
}

#[test]
fn positions_start_at_the_given_line() {
    let tokens = Lexer::new("a\n  b", 2, true).tokenize();
    assert_eq!((tokens[0].line, tokens[0].column), (2, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (3, 3));
}
