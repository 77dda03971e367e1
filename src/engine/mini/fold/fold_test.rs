use super::constant_fold;
use crate::engine::mini::{
    ast::{Expr, Program, Statement},
    lexer::Lexer,
    parser::Parser,
};

fn folded(input: &str) -> Program {
    let program = Parser::new(Lexer::new(input, 1, true))
        .parse_program()
        .unwrap();
    constant_fold(program)
}

fn first_expr(program: &Program) -> &Expr {
    match &program.statements[0] {
        Statement::Expression { expr, .. } => expr,
        Statement::Var {
            value: Some(expr), ..
        } => expr,
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn arithmetic_on_literals_is_evaluated() {
    assert_eq!(*first_expr(&folded("1 + 2 * 3")), Expr::Number(7.0));
    assert_eq!(*first_expr(&folded("-(4 - 6)")), Expr::Number(2.0));
}

#[test]
fn string_concatenation_follows_runtime_rules() {
    assert_eq!(*first_expr(&folded("'n' + 1 + 2")), Expr::Str("n12".into()));
    assert_eq!(*first_expr(&folded("1 + 2 + 'n'")), Expr::Str("3n".into()));
}

#[test]
fn comparisons_and_typeof_fold() {
    assert_eq!(*first_expr(&folded("3 <= 2")), Expr::Bool(false));
    assert_eq!(*first_expr(&folded("null == undefined")), Expr::Bool(true));
    assert_eq!(*first_expr(&folded("typeof 'x'")), Expr::Str("string".into()));
}

#[test]
fn logical_operators_pick_an_operand() {
    let program = folded("var a = true && b");
    assert!(matches!(first_expr(&program), Expr::Ident { name, .. } if name == "b"));
    let program = folded("var a = 0 || 'fallback'");
    assert_eq!(*first_expr(&program), Expr::Str("fallback".into()));
}

#[test]
fn identifiers_block_folding() {
    assert!(matches!(first_expr(&folded("x + 1")), Expr::Infix { .. }));
}

#[test]
fn division_by_zero_is_left_for_runtime() {
    assert!(matches!(first_expr(&folded("1 / 0")), Expr::Infix { .. }));
}

#[test]
fn function_bodies_are_folded() {
    let program = folded("function f() { return 2 * 21 }");
    let Statement::Function(decl) = &program.statements[0] else {
        panic!("expected a function");
    };
    assert!(matches!(
        decl.body[0],
        Statement::Return {
            value: Some(Expr::Number(n)),
            ..
        } if n == 42.0
    ));
}
