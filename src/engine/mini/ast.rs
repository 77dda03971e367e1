use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub pos: Pos,
}

impl FunctionDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Var {
        name: String,
        value: Option<Expr>,
        pos: Pos,
    },
    Expression {
        expr: Expr,
        pos: Pos,
    },
    Function(Arc<FunctionDecl>),
    Return {
        value: Option<Expr>,
        pos: Pos,
    },
    If {
        condition: Expr,
        consequence: Vec<Statement>,
        alternative: Option<Vec<Statement>>,
        pos: Pos,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
        pos: Pos,
    },
    Throw {
        value: Expr,
        pos: Pos,
    },
    Block {
        statements: Vec<Statement>,
        pos: Pos,
    },
}

impl Statement {
    pub fn pos(&self) -> Pos {
        match self {
            Statement::Function(decl) => decl.pos,
            Statement::Var { pos, .. }
            | Statement::Expression { pos, .. }
            | Statement::Return { pos, .. }
            | Statement::If { pos, .. }
            | Statement::While { pos, .. }
            | Statement::Throw { pos, .. }
            | Statement::Block { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Negate,
    Not,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
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
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<Expr>),
    Ident {
        name: String,
        pos: Pos,
    },
    Prefix {
        op: PrefixOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    Assign {
        name: String,
        value: Box<Expr>,
        pos: Pos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Member {
        target: Box<Expr>,
        property: String,
        pos: Pos,
    },
    Function(Arc<FunctionDecl>),
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null | Expr::Undefined
        )
    }
}

/// Walks statement lists, descending into nested blocks and function bodies.
/// `f` gets each statement list together with whether it sits inside a
/// function.
pub fn walk_bodies<'a>(
    statements: &'a [Statement],
    in_function: bool,
    f: &mut impl FnMut(&'a [Statement], bool),
) {
    f(statements, in_function);
    for statement in statements {
        match statement {
            Statement::Function(decl) => walk_bodies(&decl.body, true, f),
            Statement::Var { value, .. } | Statement::Return { value, .. } => {
                if let Some(value) = value {
                    walk_expr_bodies(value, f);
                }
            }
            Statement::Expression { expr, .. } | Statement::Throw { value: expr, .. } => {
                walk_expr_bodies(expr, f)
            }
            Statement::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                walk_expr_bodies(condition, f);
                walk_bodies(consequence, in_function, f);
                if let Some(alternative) = alternative {
                    walk_bodies(alternative, in_function, f);
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                walk_expr_bodies(condition, f);
                walk_bodies(body, in_function, f);
            }
            Statement::Block { statements, .. } => walk_bodies(statements, in_function, f),
        }
    }
}

fn walk_expr_bodies<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a [Statement], bool)) {
    match expr {
        Expr::Function(decl) => walk_bodies(&decl.body, true, f),
        Expr::Array(items) => items.iter().for_each(|item| walk_expr_bodies(item, f)),
        Expr::Prefix { operand, .. } => walk_expr_bodies(operand, f),
        Expr::Infix { left, right, .. } => {
            walk_expr_bodies(left, f);
            walk_expr_bodies(right, f);
        }
        Expr::Assign { value, .. } => walk_expr_bodies(value, f),
        Expr::Call { callee, args, .. } => {
            walk_expr_bodies(callee, f);
            args.iter().for_each(|arg| walk_expr_bodies(arg, f));
        }
        Expr::Index { target, index, .. } => {
            walk_expr_bodies(target, f);
            walk_expr_bodies(index, f);
        }
        Expr::Member { target, .. } => walk_expr_bodies(target, f),
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::Ident { .. } => {}
    }
}
