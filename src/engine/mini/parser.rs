use std::sync::Arc;

use super::{
    ast::{Expr, FunctionDecl, InfixOp, Pos, PrefixOp, Program, Statement},
    lexer::Lexer,
    token::{Token, TokenType},
};
use crate::{
    config::DEFAULT_MAX_NESTING_DEPTH,
    engine::{EngineError, SourceLocation},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Raised because input ended, not because of a bad token.
    pub at_end: bool,
    /// Raised because nesting went past the parser's depth limit.
    pub too_deep: bool,
}

impl ParseError {
    pub fn into_engine_error(self, unit: &str) -> EngineError {
        let location = SourceLocation::new(unit, self.line, self.column);
        if self.too_deep {
            return EngineError::ResourceExhausted {
                what: self.message,
                location: Some(location),
            };
        }
        EngineError::Syntax {
            message: self.message,
            location,
            at_end: self.at_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    LogicalOr,
    LogicalAnd,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn infix_precedence(token_type: TokenType) -> Precedence {
    match token_type {
        TokenType::Or => Precedence::LogicalOr,
        TokenType::And => Precedence::LogicalAnd,
        TokenType::Eq | TokenType::NotEq | TokenType::StrictEq | TokenType::StrictNotEq => {
            Precedence::Equals
        }
        TokenType::Lt | TokenType::Gt | TokenType::Lte | TokenType::Gte => {
            Precedence::LessGreater
        }
        TokenType::Plus | TokenType::Minus => Precedence::Sum,
        TokenType::Asterisk | TokenType::Slash | TokenType::Percent => Precedence::Product,
        TokenType::LParen | TokenType::LBracket | TokenType::Dot => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

fn infix_op(token_type: TokenType) -> Option<InfixOp> {
    Some(match token_type {
        TokenType::Plus => InfixOp::Add,
        TokenType::Minus => InfixOp::Sub,
        TokenType::Asterisk => InfixOp::Mul,
        TokenType::Slash => InfixOp::Div,
        TokenType::Percent => InfixOp::Rem,
        TokenType::Lt => InfixOp::Lt,
        TokenType::Gt => InfixOp::Gt,
        TokenType::Lte => InfixOp::Lte,
        TokenType::Gte => InfixOp::Gte,
        TokenType::Eq => InfixOp::Eq,
        TokenType::NotEq => InfixOp::NotEq,
        TokenType::StrictEq => InfixOp::StrictEq,
        TokenType::StrictNotEq => InfixOp::StrictNotEq,
        TokenType::And => InfixOp::And,
        TokenType::Or => InfixOp::Or,
        _ => return None,
    })
}

/// Recursive descent for statements, Pratt parsing for expressions. Stops at
/// the first error.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    peek: Token,
    /// Line of the most recently consumed token.
    last_line: usize,
    function_depth: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        let last_line = current.line;
        Self {
            lexer,
            current,
            peek,
            last_line,
            function_depth: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        while !self.is_current(TokenType::Eof) {
            if self.is_current(TokenType::RBrace) {
                return Err(self.unexpected());
            }
            if let Some(statement) = self.parse_statement()? {
                program.statements.push(statement);
            }
        }
        Ok(program)
    }

    // Token navigation

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        let upcoming = std::mem::replace(&mut self.peek, next);
        let previous = std::mem::replace(&mut self.current, upcoming);
        self.last_line = previous.line;
        previous
    }

    fn is_current(&self, token_type: TokenType) -> bool {
        self.current.token_type == token_type
    }

    fn is_peek(&self, token_type: TokenType) -> bool {
        self.peek.token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token, ParseError> {
        if self.is_current(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_at(
                &self.current,
                format!("expected {}, found {}", token_type, describe(&self.current)),
            ))
        }
    }

    fn current_pos(&self) -> Pos {
        Pos::new(self.current.line, self.current.column)
    }

    fn error_at(&self, token: &Token, message: String) -> ParseError {
        let message = match token.token_type {
            TokenType::UnterminatedComment => "unterminated comment".to_string(),
            TokenType::UnterminatedString => "unterminated string literal".to_string(),
            TokenType::Illegal => format!("illegal character `{}`", token.literal),
            _ => message,
        };
        ParseError {
            message,
            line: token.line,
            column: token.column,
            at_end: token.is_end_of_input(),
            too_deep: false,
        }
    }

    /// Opens one nesting level; fails once `max_depth` levels are open.
    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError {
                message: format!("nesting exceeds {} levels", self.max_depth),
                line: self.current.line,
                column: self.current.column,
                at_end: false,
                too_deep: true,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let base = self.depth;
        self.enter()?;
        let result = parse(self);
        self.depth = base;
        result
    }

    fn unexpected(&self) -> ParseError {
        self.error_at(
            &self.current,
            format!("unexpected {}", describe(&self.current)),
        )
    }

    /// Statements end at `;`, before `}`, at end of input, or at a line break.
    fn finish_statement(&mut self) -> Result<(), ParseError> {
        match self.current.token_type {
            TokenType::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenType::RBrace | TokenType::Eof => Ok(()),
            _ if self.current.line > self.last_line => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    // Statements

    fn parse_statement(&mut self) -> Result<Option<Statement>, ParseError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Option<Statement>, ParseError> {
        let statement = match self.current.token_type {
            TokenType::Semicolon => {
                self.advance();
                return Ok(None);
            }
            TokenType::Var | TokenType::Let => self.parse_var()?,
            TokenType::Function if self.is_peek(TokenType::Ident) => {
                Statement::Function(self.parse_function()?)
            }
            TokenType::Return => self.parse_return()?,
            TokenType::If => self.parse_if()?,
            TokenType::While => self.parse_while()?,
            TokenType::Throw => self.parse_throw()?,
            TokenType::LBrace => {
                let pos = self.current_pos();
                Statement::Block {
                    statements: self.parse_block()?,
                    pos,
                }
            }
            _ => {
                let pos = self.current_pos();
                let expr = self.parse_expression()?;
                self.finish_statement()?;
                Statement::Expression { expr, pos }
            }
        };
        Ok(Some(statement))
    }

    fn parse_var(&mut self) -> Result<Statement, ParseError> {
        let pos = self.current_pos();
        self.advance();
        let name = self.expect(TokenType::Ident)?.literal;
        let value = if self.is_current(TokenType::Assign) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.finish_statement()?;
        Ok(Statement::Var { name, value, pos })
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        if self.function_depth == 0 {
            return Err(self.error_at(&self.current, "return outside of function".to_string()));
        }
        let pos = self.current_pos();
        let keyword_line = self.current.line;
        self.advance();
        let ends_here = matches!(
            self.current.token_type,
            TokenType::Semicolon | TokenType::RBrace | TokenType::Eof
        ) || self.current.line > keyword_line;
        let value = if ends_here {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.finish_statement()?;
        Ok(Statement::Return { value, pos })
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let pos = self.current_pos();
        self.advance();
        let condition = self.parse_condition()?;
        let consequence = self.parse_body()?;
        let alternative = if self.is_current(TokenType::Else) {
            self.advance();
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            consequence,
            alternative,
            pos,
        })
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        let pos = self.current_pos();
        self.advance();
        let condition = self.parse_condition()?;
        let body = self.parse_body()?;
        Ok(Statement::While {
            condition,
            body,
            pos,
        })
    }

    fn parse_throw(&mut self) -> Result<Statement, ParseError> {
        let pos = self.current_pos();
        self.advance();
        let value = self.parse_expression()?;
        self.finish_statement()?;
        Ok(Statement::Throw { value, pos })
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenType::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenType::RParen)?;
        Ok(condition)
    }

    /// Either a braced block or a single statement.
    fn parse_body(&mut self) -> Result<Vec<Statement>, ParseError> {
        if self.is_current(TokenType::LBrace) {
            return self.parse_block();
        }
        Ok(self.parse_statement()?.into_iter().collect())
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(TokenType::LBrace)?;
        let mut statements = Vec::new();
        while !self.is_current(TokenType::RBrace) {
            if self.current.is_end_of_input() {
                return Err(self.error_at(&self.current, "unexpected end of input".to_string()));
            }
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
        }
        self.advance();
        Ok(statements)
    }

    fn parse_function(&mut self) -> Result<Arc<FunctionDecl>, ParseError> {
        let pos = self.current_pos();
        self.expect(TokenType::Function)?;
        let name = if self.is_current(TokenType::Ident) {
            Some(self.advance().literal)
        } else {
            None
        };
        self.expect(TokenType::LParen)?;
        let mut params = Vec::new();
        if !self.is_current(TokenType::RParen) {
            params.push(self.expect(TokenType::Ident)?.literal);
            while self.is_current(TokenType::Comma) {
                self.advance();
                params.push(self.expect(TokenType::Ident)?.literal);
            }
        }
        self.expect(TokenType::RParen)?;

        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;

        Ok(Arc::new(FunctionDecl {
            name,
            params,
            body: body?,
            pos,
        }))
    }

    // Expressions

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::expression)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.is_current(TokenType::Ident) && self.is_peek(TokenType::Assign) {
            let pos = self.current_pos();
            let name = self.advance().literal;
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Expr::Assign {
                name,
                value: Box::new(value),
                pos,
            });
        }
        self.parse_binary(Precedence::Lowest)
    }

    fn parse_binary(&mut self, precedence: Precedence) -> Result<Expr, ParseError> {
        self.nested(|parser| {
            let mut left = parser.parse_prefix()?;
            while precedence < infix_precedence(parser.current.token_type) {
                // Every operator applied here wraps `left` one level deeper.
                parser.enter()?;
                left = parser.parse_infix(left)?;
            }
            Ok(left)
        })
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let expr = match self.current.token_type {
            TokenType::Number => {
                let token = self.advance();
                let value = token.literal.parse::<f64>().map_err(|_| {
                    self.error_at(&token, format!("invalid number `{}`", token.literal))
                })?;
                Expr::Number(value)
            }
            TokenType::String => Expr::Str(self.advance().literal),
            TokenType::True => {
                self.advance();
                Expr::Bool(true)
            }
            TokenType::False => {
                self.advance();
                Expr::Bool(false)
            }
            TokenType::Null => {
                self.advance();
                Expr::Null
            }
            TokenType::Undefined => {
                self.advance();
                Expr::Undefined
            }
            TokenType::Ident => Expr::Ident {
                name: self.advance().literal,
                pos,
            },
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                inner
            }
            TokenType::LBracket => {
                self.advance();
                let items = self.parse_list(TokenType::RBracket)?;
                Expr::Array(items)
            }
            TokenType::Minus | TokenType::Bang | TokenType::Typeof => {
                let op = match self.advance().token_type {
                    TokenType::Minus => PrefixOp::Negate,
                    TokenType::Bang => PrefixOp::Not,
                    _ => PrefixOp::Typeof,
                };
                let operand = self.parse_binary(Precedence::Prefix)?;
                Expr::Prefix {
                    op,
                    operand: Box::new(operand),
                    pos,
                }
            }
            TokenType::Function => Expr::Function(self.parse_function()?),
            _ => return Err(self.unexpected()),
        };
        Ok(expr)
    }

    fn parse_infix(&mut self, left: Expr) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let token = self.advance();
        let expr = match token.token_type {
            TokenType::LParen => Expr::Call {
                callee: Box::new(left),
                args: self.parse_list(TokenType::RParen)?,
                pos,
            },
            TokenType::LBracket => {
                let index = self.parse_expression()?;
                self.expect(TokenType::RBracket)?;
                Expr::Index {
                    target: Box::new(left),
                    index: Box::new(index),
                    pos,
                }
            }
            TokenType::Dot => Expr::Member {
                target: Box::new(left),
                property: self.expect(TokenType::Ident)?.literal,
                pos,
            },
            other => {
                let op = infix_op(other)
                    .ok_or_else(|| self.error_at(&token, "unexpected operator".to_string()))?;
                let right = self.parse_binary(infix_precedence(other))?;
                Expr::Infix {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    pos,
                }
            }
        };
        Ok(expr)
    }

    /// Comma separated expressions up to `end`, which is consumed.
    fn parse_list(&mut self, end: TokenType) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.is_current(end) {
            self.advance();
            return Ok(items);
        }
        items.push(self.parse_expression()?);
        while self.is_current(TokenType::Comma) {
            self.advance();
            items.push(self.parse_expression()?);
        }
        self.expect(end)?;
        Ok(items)
    }
}

fn describe(token: &Token) -> String {
    match token.token_type {
        TokenType::Ident | TokenType::Number => format!("`{}`", token.literal),
        TokenType::Eof => "end of input".to_string(),
        other => format!("`{}`", other),
    }
}
