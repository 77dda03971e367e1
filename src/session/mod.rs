//! Read-accumulate-evaluate loop over a [`Console`].
//!
//! Lines are buffered until the engine reports the buffer as a compilable
//! unit, or input ends. Each unit is compiled as `<stdin>` starting at the
//! physical line it began on, executed against the caller's scope and its
//! result echoed unless it is `undefined` or a function the unit just
//! defined.
use std::{io, mem};

use crate::{
    config::Prompts,
    console::Console,
    engine::{EngineError, ScriptEngine, ScriptValue, SecurityDomain},
    report::ErrorReporter,
};

pub const STDIN_UNIT: &str = "<stdin>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Primary,
    Continuation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Units that failed to compile, execute or echo, plus unhandled
    /// rejections printed along the way.
    pub failures: usize,
    pub history: Vec<String>,
}

impl SessionOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Whether a result gets echoed back for the unit `source`.
pub fn should_echo<V: ScriptValue>(value: &V, source: &str) -> bool {
    if value.is_undefined() {
        return false;
    }
    !(value.is_function() && source.trim_start().starts_with("function"))
}

enum ReadOutcome {
    Unit,
    EndOfInput,
    Interrupted,
}

pub struct InteractiveSession {
    prompts: Option<Prompts>,
    domain: Option<SecurityDomain>,
    line: usize,
    unit_start: usize,
    buffer: String,
    history: Vec<String>,
    failures: usize,
}

impl InteractiveSession {
    /// `None` disables prompts, as when a script is piped in on `-`.
    pub fn new(prompts: Option<Prompts>) -> Self {
        Self {
            prompts,
            domain: None,
            line: 1,
            unit_start: 1,
            buffer: String::new(),
            history: Vec::new(),
            failures: 0,
        }
    }

    pub fn with_domain(mut self, domain: Option<SecurityDomain>) -> Self {
        self.domain = domain;
        self
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn prompt_kind(&self) -> PromptKind {
        if self.buffer.is_empty() {
            PromptKind::Primary
        } else {
            PromptKind::Continuation
        }
    }

    fn prompt(&self) -> Option<&str> {
        let prompts = self.prompts.as_ref()?;
        Some(match self.prompt_kind() {
            PromptKind::Primary => prompts.primary.as_str(),
            PromptKind::Continuation => prompts.continuation.as_str(),
        })
    }

    /// Runs until end of input. The outcome's history holds every unit that
    /// executed successfully, in order.
    pub fn run<E: ScriptEngine>(
        &mut self,
        engine: &E,
        scope: &mut E::Scope,
        console: &mut dyn Console,
        reporter: &mut dyn ErrorReporter,
    ) -> SessionOutcome {
        loop {
            console.flush();
            match self.accumulate(engine, console) {
                ReadOutcome::Interrupted => return self.outcome(),
                ReadOutcome::EndOfInput => {
                    self.evaluate(engine, scope, console, reporter);
                    break;
                }
                ReadOutcome::Unit => self.evaluate(engine, scope, console, reporter),
            }
        }
        console.println("");
        console.flush();
        self.outcome()
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            failures: self.failures,
            history: self.history.clone(),
        }
    }

    fn accumulate<E: ScriptEngine>(&mut self, engine: &E, console: &mut dyn Console) -> ReadOutcome {
        let mut failed_reads = 0;
        loop {
            let read = console.read_line(self.prompt());
            match read {
                Ok(Some(line)) => {
                    if self.buffer.is_empty() {
                        self.unit_start = self.line;
                    }
                    self.buffer.push_str(&line);
                    self.buffer.push('\n');
                    self.line += 1;
                    if engine.is_compilable_unit(&self.buffer) {
                        return ReadOutcome::Unit;
                    }
                }
                Ok(None) => return ReadOutcome::EndOfInput,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    log::debug!("session: read interrupted, stopping");
                    return ReadOutcome::Interrupted;
                }
                Err(e) => {
                    console.println(&e.to_string());
                    if !self.buffer.is_empty() {
                        return ReadOutcome::Unit;
                    }
                    // A console that keeps failing with nothing buffered is
                    // treated as closed.
                    failed_reads += 1;
                    if failed_reads > 1 {
                        return ReadOutcome::EndOfInput;
                    }
                }
            }
        }
    }

    fn evaluate<E: ScriptEngine>(
        &mut self,
        engine: &E,
        scope: &mut E::Scope,
        console: &mut dyn Console,
        reporter: &mut dyn ErrorReporter,
    ) {
        let source = mem::take(&mut self.buffer);
        if source.is_empty() {
            return;
        }
        let compiled = engine.compile(&source, STDIN_UNIT, self.unit_start, self.domain.as_ref());
        let result = compiled.and_then(|unit| match unit {
            Some(unit) => engine.execute(&unit, scope).map(Some),
            None => Ok(None),
        });

        match result {
            Ok(Some(value)) => {
                if should_echo(&value, &source) {
                    match engine.render(&value) {
                        Ok(text) => console.println(&text),
                        Err(e) => self.fail(reporter, &e),
                    }
                }
                self.history.push(source);
            }
            Ok(None) => {}
            Err(e) => self.fail(reporter, &e),
        }

        for rejection in engine.take_unhandled_rejections(scope) {
            console.println(&format!("Unhandled rejected promise: {}", rejection));
            self.failures += 1;
        }
    }

    fn fail(&mut self, reporter: &mut dyn ErrorReporter, error: &EngineError) {
        if error.is_resource_exhaustion() {
            log::error!("{}: {}", STDIN_UNIT, error);
        }
        reporter.report_engine(error);
        self.failures += 1;
    }
}

#[cfg(test)]
mod session_test;
