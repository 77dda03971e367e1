//! A small ECMAScript-flavoured engine: enough of the language to drive the
//! host end to end (statements, functions, deferred tasks, rejections) and to
//! precompile units into artifacts.
use std::{cell::RefCell, rc::Rc, sync::Arc};

use crate::{
    artifact::format::{ArtifactClass, ArtifactHeader, encode_artifact},
    config::HostConfig,
    engine::{
        ArtifactDefiner, EngineError, ExecutionMode, LoaderContext, ScriptEngine, SecurityDomain,
        SourceLocation,
    },
};

mod ast;
mod builtins;
mod definer;
mod fold;
mod interpreter;
mod lexer;
mod parser;
mod scope;
mod token;
mod value;

use ast::{Program, Statement, walk_bodies};
use interpreter::Interpreter;
use lexer::Lexer;
use parser::{ParseError, Parser};

pub use definer::MiniDefiner;
pub use scope::{MiniScope, Output};
pub use value::{Builtin, Value};

/// Language levels from which `let` is a keyword. Zero means "latest".
const LET_MIN_VERSION: u32 = 170;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub mode: ExecutionMode,
    pub language_version: u32,
    pub strict: bool,
    pub warnings: bool,
    pub fatal_warnings: bool,
    pub max_call_depth: usize,
    pub max_nesting_depth: usize,
}

impl EngineOptions {
    fn allows_let(&self) -> bool {
        self.language_version == 0 || self.language_version >= LET_MIN_VERSION
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&HostConfig::default())
    }
}

impl From<&HostConfig> for EngineOptions {
    fn from(config: &HostConfig) -> Self {
        Self {
            mode: config.execution_mode(),
            language_version: config.language_version,
            strict: config.strict,
            warnings: config.warnings,
            fatal_warnings: config.fatal_warnings,
            max_call_depth: config.max_call_depth,
            max_nesting_depth: config.max_nesting_depth,
        }
    }
}

/// A compiled unit.
#[derive(Debug, Clone)]
pub struct MiniScript {
    name: String,
    program: Arc<Program>,
    domain: Option<SecurityDomain>,
}

impl MiniScript {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Option<&SecurityDomain> {
        self.domain.as_ref()
    }
}

#[derive(Debug)]
pub struct MiniEngine {
    options: EngineOptions,
    output: Output,
}

impl MiniEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            output: Output::Stdout,
        }
    }

    /// An engine whose scopes print into the returned buffer.
    pub fn captured(options: EngineOptions) -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let engine = Self {
            options,
            output: Output::Buffer(Rc::clone(&buffer)),
        };
        (engine, buffer)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn parse(&self, source: &str, start_line: usize) -> Result<Program, ParseError> {
        Parser::new(Lexer::new(source, start_line, self.options.allows_let()))
            .with_max_depth(self.options.max_nesting_depth)
            .parse_program()
    }

    /// Parses, checks and, in compiled mode, optimizes `source`.
    fn prepare(
        &self,
        source: &str,
        unit_name: &str,
        start_line: usize,
    ) -> Result<Program, EngineError> {
        let program = self
            .parse(source, start_line)
            .map_err(|e| e.into_engine_error(unit_name))?;
        self.check_unreachable(&program, unit_name)?;
        Ok(match self.options.mode {
            ExecutionMode::Compiled => fold::constant_fold(program),
            ExecutionMode::Interpreted => program,
        })
    }

    fn check_unreachable(&self, program: &Program, unit_name: &str) -> Result<(), EngineError> {
        if !self.options.warnings && !self.options.fatal_warnings {
            return Ok(());
        }
        let mut unreachable = Vec::new();
        walk_bodies(&program.statements, false, &mut |statements, _| {
            if let Some(i) = statements
                .iter()
                .position(|s| matches!(s, Statement::Return { .. }))
                && let Some(next) = statements.get(i + 1)
            {
                let pos = next.pos();
                unreachable.push(SourceLocation::new(unit_name, pos.line, pos.column));
            }
        });

        for location in unreachable {
            if self.options.fatal_warnings {
                return Err(EngineError::Syntax {
                    message: "unreachable code after return".to_string(),
                    location,
                    at_end: false,
                });
            }
            log::warn!("{}: unreachable code after return", location);
        }
        Ok(())
    }

    /// Compiles `source` into an artifact image named `name`.
    ///
    /// Library artifacts carry only function declarations and are not
    /// executable on their own.
    pub fn compile_artifact(
        &self,
        source: &str,
        name: &str,
        class: ArtifactClass,
    ) -> Result<Vec<u8>, EngineError> {
        let program = self.prepare(source, name, 1)?;
        let payload = match class {
            ArtifactClass::Script => serde_json::to_vec(&program),
            ArtifactClass::Library => {
                let mut functions = Vec::new();
                for statement in program.statements {
                    match statement {
                        Statement::Function(decl) => functions.push(decl),
                        other => {
                            let pos = other.pos();
                            return Err(EngineError::Link(format!(
                                "{}:{}:{}: libraries may only declare functions",
                                name, pos.line, pos.column
                            )));
                        }
                    }
                }
                serde_json::to_vec(&functions)
            }
        }
        .map_err(|e| EngineError::InvalidArtifact(e.to_string()))?;

        let header = ArtifactHeader {
            host_version: self.implementation_version(),
            class,
            name: name.to_string(),
        };
        Ok(encode_artifact(&header, &payload))
    }
}

impl ScriptEngine for MiniEngine {
    type Unit = MiniScript;
    type Scope = MiniScope;
    type Value = Value;

    fn implementation_version(&self) -> String {
        format!("mini/{}", env!("CARGO_PKG_VERSION"))
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.options.mode
    }

    fn compile_profile(&self) -> String {
        let mut profile = format!("v{}", self.options.language_version);
        if self.options.fatal_warnings {
            profile.push_str("+fatal-warnings");
        }
        profile
    }

    fn new_scope(&self) -> MiniScope {
        MiniScope::new(self.output.clone())
    }

    fn compile(
        &self,
        source: &str,
        unit_name: &str,
        start_line: usize,
        domain: Option<&SecurityDomain>,
    ) -> Result<Option<MiniScript>, EngineError> {
        let program = self.prepare(source, unit_name, start_line)?;
        if program.statements.is_empty() {
            return Ok(None);
        }
        Ok(Some(MiniScript {
            name: unit_name.to_string(),
            program: Arc::new(program),
            domain: domain.cloned(),
        }))
    }

    fn execute(&self, unit: &MiniScript, scope: &mut MiniScope) -> Result<Value, EngineError> {
        Interpreter::new(scope, &self.options, &unit.name, unit.domain.as_ref())
            .run_program(&unit.program)
    }

    fn is_compilable_unit(&self, text: &str) -> bool {
        match self.parse(text, 1) {
            Ok(_) => true,
            Err(e) => !e.at_end,
        }
    }

    fn render(&self, value: &Value) -> Result<String, EngineError> {
        Ok(value.to_string())
    }

    fn create_definer<'a>(
        &'a self,
        context: &LoaderContext,
        domain: Option<&SecurityDomain>,
    ) -> Box<dyn ArtifactDefiner<MiniScript> + 'a> {
        Box::new(MiniDefiner::new(context.clone(), domain.cloned()))
    }

    fn define_global_strings(&self, scope: &mut MiniScope, name: &str, values: &[String]) {
        let items = values.iter().map(|v| Value::string(v.as_str())).collect();
        scope.set_global(name, Value::Array(Rc::new(items)));
    }

    fn take_unhandled_rejections(&self, scope: &mut MiniScope) -> Vec<String> {
        std::mem::take(&mut scope.rejections)
    }

    fn run_pending_tasks(&self, scope: &mut MiniScope) -> Result<(), EngineError> {
        while let Some(task) = scope.tasks.pop_front() {
            log::trace!("running deferred task from {}", task.unit);
            Interpreter::new(scope, &self.options, &task.unit, None).call_value(
                &task.callee,
                Vec::new(),
                ast::Pos::default(),
            )?;
        }
        Ok(())
    }
}
