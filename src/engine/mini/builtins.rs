use super::{
    ast::Pos,
    interpreter::Interpreter,
    scope::PendingTask,
    value::{Builtin, Value},
};
use crate::engine::EngineError;

pub(super) fn call(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    args: Vec<Value>,
    pos: Pos,
) -> Result<Value, EngineError> {
    match builtin {
        Builtin::Print => {
            let line = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            interp
                .scope
                .output
                .write_line(&line)
                .map_err(|e| EngineError::runtime(format!("print failed: {}", e)))?;
            Ok(Value::Undefined)
        }
        Builtin::Defer => {
            if interp.domain.is_some_and(|domain| domain.is_sandbox()) {
                return Err(EngineError::runtime(
                    "defer is not permitted in the sandbox domain",
                )
                .at(interp.location(pos)));
            }
            match args.into_iter().next() {
                Some(callee @ (Value::Function(_) | Value::Builtin(_))) => {
                    interp.scope.tasks.push_back(PendingTask {
                        callee,
                        unit: interp.unit.to_string(),
                    });
                    Ok(Value::Undefined)
                }
                _ => Err(EngineError::runtime("defer expects a function").at(interp.location(pos))),
            }
        }
        Builtin::Reject => {
            let reason = args.first().cloned().unwrap_or(Value::Undefined);
            interp.scope.rejections.push(reason.to_string());
            Ok(Value::Undefined)
        }
        Builtin::Version => Ok(Value::Number(f64::from(interp.options.language_version))),
    }
}
