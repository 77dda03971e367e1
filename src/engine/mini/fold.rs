use std::sync::Arc;

use super::{
    ast::{Expr, FunctionDecl, InfixOp, Program, Statement},
    interpreter::{apply_infix, apply_prefix},
    value::Value,
};

/// AST rewriter. Each method takes an owned node and returns a possibly
/// rewritten one; defaults rebuild the node after folding its children.
pub trait Folder {
    fn fold_program(&mut self, program: Program) -> Program {
        fold_program(self, program)
    }

    fn fold_stmt(&mut self, stmt: Statement) -> Statement {
        fold_stmt(self, stmt)
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        fold_expr(self, expr)
    }

    fn fold_function(&mut self, decl: Arc<FunctionDecl>) -> Arc<FunctionDecl> {
        fold_function(self, decl)
    }
}

pub fn fold_program<F: Folder + ?Sized>(folder: &mut F, program: Program) -> Program {
    Program {
        statements: fold_stmts(folder, program.statements),
    }
}

fn fold_stmts<F: Folder + ?Sized>(folder: &mut F, statements: Vec<Statement>) -> Vec<Statement> {
    statements
        .into_iter()
        .map(|s| folder.fold_stmt(s))
        .collect()
}

pub fn fold_function<F: Folder + ?Sized>(
    folder: &mut F,
    decl: Arc<FunctionDecl>,
) -> Arc<FunctionDecl> {
    let FunctionDecl {
        name,
        params,
        body,
        pos,
    } = Arc::unwrap_or_clone(decl);
    Arc::new(FunctionDecl {
        name,
        params,
        body: fold_stmts(folder, body),
        pos,
    })
}

pub fn fold_stmt<F: Folder + ?Sized>(folder: &mut F, stmt: Statement) -> Statement {
    match stmt {
        Statement::Var { name, value, pos } => Statement::Var {
            name,
            value: value.map(|v| folder.fold_expr(v)),
            pos,
        },
        Statement::Expression { expr, pos } => Statement::Expression {
            expr: folder.fold_expr(expr),
            pos,
        },
        Statement::Function(decl) => Statement::Function(folder.fold_function(decl)),
        Statement::Return { value, pos } => Statement::Return {
            value: value.map(|v| folder.fold_expr(v)),
            pos,
        },
        Statement::If {
            condition,
            consequence,
            alternative,
            pos,
        } => Statement::If {
            condition: folder.fold_expr(condition),
            consequence: fold_stmts(folder, consequence),
            alternative: alternative.map(|alt| fold_stmts(folder, alt)),
            pos,
        },
        Statement::While {
            condition,
            body,
            pos,
        } => Statement::While {
            condition: folder.fold_expr(condition),
            body: fold_stmts(folder, body),
            pos,
        },
        Statement::Throw { value, pos } => Statement::Throw {
            value: folder.fold_expr(value),
            pos,
        },
        Statement::Block { statements, pos } => Statement::Block {
            statements: fold_stmts(folder, statements),
            pos,
        },
    }
}

pub fn fold_expr<F: Folder + ?Sized>(folder: &mut F, expr: Expr) -> Expr {
    match expr {
        Expr::Array(items) => {
            Expr::Array(items.into_iter().map(|e| folder.fold_expr(e)).collect())
        }
        Expr::Prefix { op, operand, pos } => Expr::Prefix {
            op,
            operand: Box::new(folder.fold_expr(*operand)),
            pos,
        },
        Expr::Infix {
            op,
            left,
            right,
            pos,
        } => Expr::Infix {
            op,
            left: Box::new(folder.fold_expr(*left)),
            right: Box::new(folder.fold_expr(*right)),
            pos,
        },
        Expr::Assign { name, value, pos } => Expr::Assign {
            name,
            value: Box::new(folder.fold_expr(*value)),
            pos,
        },
        Expr::Call { callee, args, pos } => Expr::Call {
            callee: Box::new(folder.fold_expr(*callee)),
            args: args.into_iter().map(|a| folder.fold_expr(a)).collect(),
            pos,
        },
        Expr::Index { target, index, pos } => Expr::Index {
            target: Box::new(folder.fold_expr(*target)),
            index: Box::new(folder.fold_expr(*index)),
            pos,
        },
        Expr::Member {
            target,
            property,
            pos,
        } => Expr::Member {
            target: Box::new(folder.fold_expr(*target)),
            property,
            pos,
        },
        Expr::Function(decl) => Expr::Function(folder.fold_function(decl)),
        leaf @ (Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::Ident { .. }) => leaf,
    }
}

/// Evaluates operators whose operands are all literals.
///
/// Uses the interpreter's own operator semantics, so folding never changes
/// what a program prints. `&&` and `||` fold when the left side is a literal.
struct ConstantFolder;

impl Folder for ConstantFolder {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let expr = fold_expr(self, expr);
        match expr {
            Expr::Prefix { op, operand, pos } => match literal_value(&operand) {
                Some(value) => value_to_literal(&apply_prefix(op, &value))
                    .unwrap_or(Expr::Prefix { op, operand, pos }),
                None => Expr::Prefix { op, operand, pos },
            },
            Expr::Infix {
                op: op @ (InfixOp::And | InfixOp::Or),
                left,
                right,
                pos,
            } => match literal_value(&left) {
                Some(value) => {
                    let take_right = value.is_truthy() == (op == InfixOp::And);
                    if take_right { *right } else { *left }
                }
                None => Expr::Infix {
                    op,
                    left,
                    right,
                    pos,
                },
            },
            Expr::Infix {
                op,
                left,
                right,
                pos,
            } => {
                let folded = match (literal_value(&left), literal_value(&right)) {
                    (Some(l), Some(r)) => value_to_literal(&apply_infix(op, &l, &r)),
                    _ => None,
                };
                folded.unwrap_or(Expr::Infix {
                    op,
                    left,
                    right,
                    pos,
                })
            }
            other => other,
        }
    }
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Number(n) => Some(Value::Number(*n)),
        Expr::Str(s) => Some(Value::string(s.as_str())),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Null => Some(Value::Null),
        Expr::Undefined => Some(Value::Undefined),
        _ => None,
    }
}

/// Non-finite numbers stay unfolded; they have no literal form.
fn value_to_literal(value: &Value) -> Option<Expr> {
    match value {
        Value::Number(n) if n.is_finite() => Some(Expr::Number(*n)),
        Value::Number(_) => None,
        Value::Str(s) => Some(Expr::Str(s.to_string())),
        Value::Bool(b) => Some(Expr::Bool(*b)),
        Value::Null => Some(Expr::Null),
        Value::Undefined => Some(Expr::Undefined),
        Value::Array(_) | Value::Function(_) | Value::Builtin(_) => None,
    }
}

pub fn constant_fold(program: Program) -> Program {
    ConstantFolder.fold_program(program)
}

#[cfg(test)]
mod fold_test;
