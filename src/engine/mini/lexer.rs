use super::token::{Token, TokenType, lookup_ident};

#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    read_position: usize,
    current_char: Option<char>,
    line: usize,
    /// 1-based column of `current_char`.
    column: usize,
    allow_let: bool,
    unterminated_comment_at: Option<(usize, usize)>,
}

impl Lexer {
    /// `start_line` is the physical line the first character sits on.
    pub fn new(input: &str, start_line: usize, allow_let: bool) -> Self {
        let mut lexer = Self {
            input: input.chars().collect(),
            position: 0,
            read_position: 0,
            current_char: None,
            line: start_line.max(1),
            column: 0,
            allow_let,
            unterminated_comment_at: None,
        };
        lexer.read_char();
        lexer
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_ignorable();

        if let Some((line, col)) = self.unterminated_comment_at.take() {
            return Token::new(TokenType::UnterminatedComment, "/*", line, col);
        }

        let line = self.line;
        let col = self.column;

        let token = match self.current_char {
            Some('=') if self.peek_char() == Some('=') => {
                self.read_char();
                if self.peek_char() == Some('=') {
                    self.read_char();
                    Token::new(TokenType::StrictEq, "===", line, col)
                } else {
                    Token::new(TokenType::Eq, "==", line, col)
                }
            }
            Some('!') if self.peek_char() == Some('=') => {
                self.read_char();
                if self.peek_char() == Some('=') {
                    self.read_char();
                    Token::new(TokenType::StrictNotEq, "!==", line, col)
                } else {
                    Token::new(TokenType::NotEq, "!=", line, col)
                }
            }
            Some('<') if self.peek_char() == Some('=') => {
                self.read_char();
                Token::new(TokenType::Lte, "<=", line, col)
            }
            Some('>') if self.peek_char() == Some('=') => {
                self.read_char();
                Token::new(TokenType::Gte, ">=", line, col)
            }
            Some('&') if self.peek_char() == Some('&') => {
                self.read_char();
                Token::new(TokenType::And, "&&", line, col)
            }
            Some('|') if self.peek_char() == Some('|') => {
                self.read_char();
                Token::new(TokenType::Or, "||", line, col)
            }
            Some('=') => Token::new(TokenType::Assign, "=", line, col),
            Some('!') => Token::new(TokenType::Bang, "!", line, col),
            Some('+') => Token::new(TokenType::Plus, "+", line, col),
            Some('-') => Token::new(TokenType::Minus, "-", line, col),
            Some('*') => Token::new(TokenType::Asterisk, "*", line, col),
            Some('/') => Token::new(TokenType::Slash, "/", line, col),
            Some('%') => Token::new(TokenType::Percent, "%", line, col),
            Some('<') => Token::new(TokenType::Lt, "<", line, col),
            Some('>') => Token::new(TokenType::Gt, ">", line, col),
            Some('(') => Token::new(TokenType::LParen, "(", line, col),
            Some(')') => Token::new(TokenType::RParen, ")", line, col),
            Some('{') => Token::new(TokenType::LBrace, "{", line, col),
            Some('}') => Token::new(TokenType::RBrace, "}", line, col),
            Some('[') => Token::new(TokenType::LBracket, "[", line, col),
            Some(']') => Token::new(TokenType::RBracket, "]", line, col),
            Some(',') => Token::new(TokenType::Comma, ",", line, col),
            Some(';') => Token::new(TokenType::Semicolon, ";", line, col),
            Some('.') => Token::new(TokenType::Dot, ".", line, col),

            Some(quote @ ('"' | '\'')) => return self.read_string(quote, line, col),

            None => Token::new(TokenType::Eof, "", line, col),

            Some(ch) if is_letter(ch) => {
                let ident = self.read_identifier();
                let token_type = lookup_ident(&ident, self.allow_let);
                return Token::new(token_type, ident, line, col);
            }

            Some(ch) if ch.is_ascii_digit() => {
                let num = self.read_number();
                return Token::new(TokenType::Number, num, line, col);
            }

            Some(ch) => Token::new(TokenType::Illegal, ch.to_string(), line, col),
        };

        self.read_char();
        token
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_end_of_input();
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn read_char(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.current_char = self.input.get(self.read_position).copied();
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.read_position).copied()
    }

    fn skip_ignorable(&mut self) {
        loop {
            while self.current_char.is_some_and(char::is_whitespace) {
                self.read_char();
            }

            if self.current_char == Some('/') && self.peek_char() == Some('/') {
                while self.current_char.is_some() && self.current_char != Some('\n') {
                    self.read_char();
                }
                continue;
            }

            if self.current_char == Some('/') && self.peek_char() == Some('*') {
                let start = (self.line, self.column);
                if !self.skip_block_comment() {
                    self.unterminated_comment_at = Some(start);
                    break;
                }
                continue;
            }

            break;
        }
    }

    /// Returns false when input ends inside the comment.
    fn skip_block_comment(&mut self) -> bool {
        self.read_char(); // '/'
        self.read_char(); // '*'
        while let Some(ch) = self.current_char {
            if ch == '*' && self.peek_char() == Some('/') {
                self.read_char();
                self.read_char();
                return true;
            }
            self.read_char();
        }
        false
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while self
            .current_char
            .is_some_and(|c| is_letter(c) || c.is_ascii_digit())
        {
            self.read_char();
        }
        self.input[start..self.position].iter().collect()
    }

    fn read_number(&mut self) -> String {
        let start = self.position;
        while self.current_char.is_some_and(|c| c.is_ascii_digit()) {
            self.read_char();
        }
        if self.current_char == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.read_char();
            while self.current_char.is_some_and(|c| c.is_ascii_digit()) {
                self.read_char();
            }
        }
        if matches!(self.current_char, Some('e' | 'E')) {
            let exponent_follows = match self.peek_char() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self
                    .input
                    .get(self.read_position + 1)
                    .is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                self.read_char();
                if matches!(self.current_char, Some('+' | '-')) {
                    self.read_char();
                }
                while self.current_char.is_some_and(|c| c.is_ascii_digit()) {
                    self.read_char();
                }
            }
        }
        self.input[start..self.position].iter().collect()
    }

    /// Strings may not span lines.
    fn read_string(&mut self, quote: char, line: usize, col: usize) -> Token {
        let mut value = String::new();
        self.read_char(); // opening quote
        loop {
            match self.current_char {
                None | Some('\n') => {
                    return Token::new(TokenType::UnterminatedString, value, line, col);
                }
                Some(c) if c == quote => {
                    self.read_char();
                    return Token::new(TokenType::String, value, line, col);
                }
                Some('\\') => {
                    self.read_char();
                    match self.current_char {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('0') => value.push('\0'),
                        Some(other) => value.push(other),
                        None => {
                            return Token::new(TokenType::UnterminatedString, value, line, col);
                        }
                    }
                    self.read_char();
                }
                Some(c) => {
                    value.push(c);
                    self.read_char();
                }
            }
        }
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod lexer_test;
