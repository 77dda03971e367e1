//! Error sink shared by the pipeline and the interactive session.
use std::{cell::RefCell, rc::Rc};

use crate::{engine::EngineError, error::HostError};

pub trait ErrorReporter {
    fn report(&mut self, error: &HostError);

    fn report_engine(&mut self, error: &EngineError);

    fn report_message(&mut self, message: &str);
}

/// Renders a host error as `unit:line:column: message` when the engine
/// attached a location, otherwise as the bare message.
pub fn render_error(error: &HostError) -> String {
    match error {
        HostError::Engine(engine) => render_engine_error(engine),
        HostError::PendingAsyncFailure(rejections) => rejections
            .iter()
            .map(|r| format!("Unhandled rejected promise: {}", r))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

pub fn render_engine_error(error: &EngineError) -> String {
    match error.location() {
        Some(location) => format!("{}: {}", location, error),
        None => error.to_string(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&mut self, error: &HostError) {
        eprintln!("{}", render_error(error));
    }

    fn report_engine(&mut self, error: &EngineError) {
        eprintln!("{}", render_engine_error(error));
    }

    fn report_message(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Keeps rendered reports in memory; clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    reports: Rc<RefCell<Vec<String>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&mut self, error: &HostError) {
        self.reports.borrow_mut().push(render_error(error));
    }

    fn report_engine(&mut self, error: &EngineError) {
        self.reports.borrow_mut().push(render_engine_error(error));
    }

    fn report_message(&mut self, message: &str) {
        self.reports.borrow_mut().push(message.to_string());
    }
}
