use std::{collections::HashMap, rc::Rc, sync::Arc};

use super::{
    EngineOptions,
    ast::{Expr, FunctionDecl, InfixOp, Pos, PrefixOp, Program, Statement},
    builtins,
    scope::MiniScope,
    value::Value,
};
use crate::engine::{EngineError, SecurityDomain, SourceLocation};

enum Flow {
    /// Completed, carrying the last statement value if any.
    Normal(Option<Value>),
    Return(Value),
}

/// Tree-walking evaluator. Functions see their own locals and the globals,
/// nothing in between.
pub(super) struct Interpreter<'a> {
    pub(super) scope: &'a mut MiniScope,
    pub(super) options: &'a EngineOptions,
    pub(super) unit: &'a str,
    pub(super) domain: Option<&'a SecurityDomain>,
    frames: Vec<HashMap<String, Value>>,
}

impl<'a> Interpreter<'a> {
    pub(super) fn new(
        scope: &'a mut MiniScope,
        options: &'a EngineOptions,
        unit: &'a str,
        domain: Option<&'a SecurityDomain>,
    ) -> Self {
        Self {
            scope,
            options,
            unit,
            domain,
            frames: Vec::new(),
        }
    }

    pub(super) fn location(&self, pos: Pos) -> SourceLocation {
        SourceLocation::new(self.unit, pos.line, pos.column)
    }

    fn fail(&self, message: impl Into<String>, pos: Pos) -> EngineError {
        EngineError::runtime(message).at(self.location(pos))
    }

    pub(super) fn run_program(&mut self, program: &Program) -> Result<Value, EngineError> {
        self.hoist(&program.statements);
        match self.exec_block(&program.statements)? {
            Flow::Normal(value) => Ok(value.unwrap_or(Value::Undefined)),
            Flow::Return(value) => Ok(value),
        }
    }

    pub(super) fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        pos: Pos,
    ) -> Result<Value, EngineError> {
        match callee {
            Value::Builtin(builtin) => builtins::call(self, *builtin, args, pos),
            Value::Function(decl) => self.call_function(decl, args, pos),
            other => Err(self.fail(format!("{} is not a function", other.type_name()), pos)),
        }
    }

    fn call_function(
        &mut self,
        decl: &Arc<FunctionDecl>,
        args: Vec<Value>,
        pos: Pos,
    ) -> Result<Value, EngineError> {
        if self.frames.len() >= self.options.max_call_depth {
            return Err(EngineError::ResourceExhausted {
                what: "call stack exhausted".to_string(),
                location: Some(self.location(pos)),
            });
        }

        let mut frame = HashMap::with_capacity(decl.params.len());
        let mut args = args.into_iter();
        for param in &decl.params {
            frame.insert(param.clone(), args.next().unwrap_or(Value::Undefined));
        }
        self.frames.push(frame);
        self.hoist(&decl.body);
        let flow = self.exec_block(&decl.body);
        self.frames.pop();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Value::Undefined),
        }
    }

    /// Function declarations are visible before the statement that declares them.
    fn hoist(&mut self, statements: &[Statement]) {
        for statement in statements {
            if let Statement::Function(decl) = statement
                && let Some(name) = &decl.name
            {
                self.declare(name.clone(), Value::Function(Arc::clone(decl)));
            }
        }
    }

    fn declare(&mut self, name: String, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name, value),
            None => self.scope.globals.insert(name, value),
        };
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.scope.globals.get(name))
    }

    fn assign(&mut self, name: &str, value: Value, pos: Pos) -> Result<(), EngineError> {
        if let Some(slot) = self.frames.last_mut().and_then(|frame| frame.get_mut(name)) {
            *slot = value;
            return Ok(());
        }
        if let Some(slot) = self.scope.globals.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        if self.options.strict {
            return Err(self.fail(format!("assignment to undeclared variable {}", name), pos));
        }
        self.scope.globals.insert(name.to_string(), value);
        Ok(())
    }

    fn exec_block(&mut self, statements: &[Statement]) -> Result<Flow, EngineError> {
        let mut completion = None;
        for statement in statements {
            match self.exec(statement)? {
                Flow::Normal(Some(value)) => completion = Some(value),
                Flow::Normal(None) => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal(completion))
    }

    fn exec(&mut self, statement: &Statement) -> Result<Flow, EngineError> {
        match statement {
            Statement::Var { name, value, .. } => {
                match value {
                    Some(expr) => {
                        let value = self.eval(expr)?;
                        self.declare(name.clone(), value);
                    }
                    None if self.lookup_local_or_global(name) => {}
                    None => self.declare(name.clone(), Value::Undefined),
                }
                Ok(Flow::Normal(None))
            }
            Statement::Expression { expr, .. } => Ok(Flow::Normal(Some(self.eval(expr)?))),
            Statement::Function(decl) => {
                let function = Value::Function(Arc::clone(decl));
                if let Some(name) = &decl.name {
                    self.declare(name.clone(), function.clone());
                }
                Ok(Flow::Normal(Some(function)))
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.exec_block(consequence)
                } else if let Some(alternative) = alternative {
                    self.exec_block(alternative)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                let mut completion = None;
                while self.eval(condition)?.is_truthy() {
                    match self.exec_block(body)? {
                        Flow::Normal(Some(value)) => completion = Some(value),
                        Flow::Normal(None) => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(completion))
            }
            Statement::Throw { value, pos } => {
                let value = self.eval(value)?;
                Err(EngineError::Thrown {
                    value: value.to_string(),
                    location: Some(self.location(*pos)),
                })
            }
            Statement::Block { statements, .. } => self.exec_block(statements),
        }
    }

    fn lookup_local_or_global(&self, name: &str) -> bool {
        match self.frames.last() {
            Some(frame) => frame.contains_key(name),
            None => self.scope.globals.contains_key(name),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EngineError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(Rc::new(values)))
            }
            Expr::Ident { name, pos } => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| self.fail(format!("{} is not defined", name), *pos)),
            Expr::Prefix {
                op: PrefixOp::Typeof,
                operand,
                ..
            } => {
                if let Expr::Ident { name, .. } = &**operand
                    && self.lookup(name).is_none()
                {
                    return Ok(Value::string("undefined"));
                }
                let value = self.eval(operand)?;
                Ok(apply_prefix(PrefixOp::Typeof, &value))
            }
            Expr::Prefix { op, operand, .. } => {
                let value = self.eval(operand)?;
                Ok(apply_prefix(*op, &value))
            }
            Expr::Infix {
                op: InfixOp::And,
                left,
                right,
                ..
            } => {
                let left = self.eval(left)?;
                if left.is_truthy() { self.eval(right) } else { Ok(left) }
            }
            Expr::Infix {
                op: InfixOp::Or,
                left,
                right,
                ..
            } => {
                let left = self.eval(left)?;
                if left.is_truthy() { Ok(left) } else { self.eval(right) }
            }
            Expr::Infix {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(apply_infix(*op, &left, &right))
            }
            Expr::Assign { name, value, pos } => {
                let value = self.eval(value)?;
                self.assign(name, value.clone(), *pos)?;
                Ok(value)
            }
            Expr::Call { callee, args, pos } => {
                let function = self.eval(callee)?;
                if !matches!(function, Value::Function(_) | Value::Builtin(_)) {
                    let label = match &**callee {
                        Expr::Ident { name, .. } => name.clone(),
                        _ => function.type_name().to_string(),
                    };
                    return Err(self.fail(format!("{} is not a function", label), *pos));
                }
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_value(&function, args, *pos)
            }
            Expr::Index { target, index, pos } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(&target, &index, *pos)
            }
            Expr::Member {
                target,
                property,
                pos,
            } => {
                let target = self.eval(target)?;
                match (&target, property.as_str()) {
                    (Value::Undefined | Value::Null, _) => Err(self.fail(
                        format!("cannot read property '{}' of {}", property, target),
                        *pos,
                    )),
                    (Value::Array(items), "length") => Ok(Value::Number(items.len() as f64)),
                    (Value::Str(s), "length") => Ok(Value::Number(s.chars().count() as f64)),
                    _ => Ok(Value::Undefined),
                }
            }
            Expr::Function(decl) => Ok(Value::Function(Arc::clone(decl))),
        }
    }

    fn index(&self, target: &Value, index: &Value, pos: Pos) -> Result<Value, EngineError> {
        let slot = index.to_number();
        let position = (slot >= 0.0 && slot.fract() == 0.0).then_some(slot as usize);
        match (target, position) {
            (Value::Undefined | Value::Null, _) => Err(self.fail(
                format!("cannot read index {} of {}", index, target),
                pos,
            )),
            (Value::Array(items), Some(i)) => Ok(items.get(i).cloned().unwrap_or(Value::Undefined)),
            (Value::Str(s), Some(i)) => Ok(s
                .chars()
                .nth(i)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or(Value::Undefined)),
            _ => Ok(Value::Undefined),
        }
    }
}

pub(super) fn apply_prefix(op: PrefixOp, value: &Value) -> Value {
    match op {
        PrefixOp::Negate => Value::Number(-value.to_number()),
        PrefixOp::Not => Value::Bool(!value.is_truthy()),
        PrefixOp::Typeof => Value::string(value.type_name()),
    }
}

/// Non-short-circuiting operators. `&&` and `||` pick an operand.
pub(super) fn apply_infix(op: InfixOp, left: &Value, right: &Value) -> Value {
    match op {
        InfixOp::Add => match (left, right) {
            (Value::Str(_) | Value::Array(_), _) | (_, Value::Str(_) | Value::Array(_)) => {
                Value::string(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        InfixOp::Sub => Value::Number(left.to_number() - right.to_number()),
        InfixOp::Mul => Value::Number(left.to_number() * right.to_number()),
        InfixOp::Div => Value::Number(left.to_number() / right.to_number()),
        InfixOp::Rem => Value::Number(left.to_number() % right.to_number()),
        InfixOp::Lt | InfixOp::Gt | InfixOp::Lte | InfixOp::Gte => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let holds = ordering.is_some_and(|ordering| match op {
                InfixOp::Lt => ordering.is_lt(),
                InfixOp::Gt => ordering.is_gt(),
                InfixOp::Lte => ordering.is_le(),
                _ => ordering.is_ge(),
            });
            Value::Bool(holds)
        }
        InfixOp::Eq => Value::Bool(left.loose_equals(right)),
        InfixOp::NotEq => Value::Bool(!left.loose_equals(right)),
        InfixOp::StrictEq => Value::Bool(left.strict_equals(right)),
        InfixOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        InfixOp::And => {
            if left.is_truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        InfixOp::Or => {
            if left.is_truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    }
}
