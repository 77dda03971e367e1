use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Special
    Illegal,
    Eof,
    UnterminatedString,
    UnterminatedComment,

    // Identifiers and literals
    Ident,
    Number,
    String,

    // Operators
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    And,
    Or,
    Bang,
    Assign,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    // Keywords
    Var,
    Let,
    Function,
    Return,
    If,
    Else,
    While,
    Throw,
    Typeof,
    True,
    False,
    Null,
    Undefined,
}

/// Resolves an identifier to its keyword. `let` is only a keyword when the
/// language level enables block declarations.
pub fn lookup_ident(ident: &str, allow_let: bool) -> TokenType {
    match ident {
        "var" => TokenType::Var,
        "let" if allow_let => TokenType::Let,
        "function" => TokenType::Function,
        "return" => TokenType::Return,
        "if" => TokenType::If,
        "else" => TokenType::Else,
        "while" => TokenType::While,
        "throw" => TokenType::Throw,
        "typeof" => TokenType::Typeof,
        "true" => TokenType::True,
        "false" => TokenType::False,
        "null" => TokenType::Null,
        "undefined" => TokenType::Undefined,
        _ => TokenType::Ident,
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Illegal => "ILLEGAL",
            TokenType::Eof => "end of input",
            TokenType::UnterminatedString => "unterminated string",
            TokenType::UnterminatedComment => "unterminated comment",
            TokenType::Ident => "identifier",
            TokenType::Number => "number",
            TokenType::String => "string",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Asterisk => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Lt => "<",
            TokenType::Gt => ">",
            TokenType::Lte => "<=",
            TokenType::Gte => ">=",
            TokenType::Eq => "==",
            TokenType::NotEq => "!=",
            TokenType::StrictEq => "===",
            TokenType::StrictNotEq => "!==",
            TokenType::And => "&&",
            TokenType::Or => "||",
            TokenType::Bang => "!",
            TokenType::Assign => "=",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::LBrace => "{",
            TokenType::RBrace => "}",
            TokenType::LBracket => "[",
            TokenType::RBracket => "]",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Dot => ".",
            TokenType::Var => "var",
            TokenType::Let => "let",
            TokenType::Function => "function",
            TokenType::Return => "return",
            TokenType::If => "if",
            TokenType::Else => "else",
            TokenType::While => "while",
            TokenType::Throw => "throw",
            TokenType::Typeof => "typeof",
            TokenType::True => "true",
            TokenType::False => "false",
            TokenType::Null => "null",
            TokenType::Undefined => "undefined",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub literal: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        literal: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            token_type,
            literal: literal.into(),
            line,
            column,
        }
    }

    /// Input ran out before the construct this token belongs to was closed.
    pub fn is_end_of_input(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::Eof | TokenType::UnterminatedComment
        )
    }
}
