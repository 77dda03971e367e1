use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io::{self, Write},
    rc::Rc,
};

use super::value::{Builtin, Value};

/// Where `print` writes.
#[derive(Debug, Clone)]
pub enum Output {
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

impl Output {
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", line)?;
                out.flush()
            }
            Output::Buffer(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(line);
                buffer.push('\n');
                Ok(())
            }
        }
    }
}

/// A function queued by `defer`, run once the current unit has finished.
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub callee: Value,
    /// Unit that queued the task, for error locations.
    pub unit: String,
}

/// Global state shared by every unit executed against it.
#[derive(Debug)]
pub struct MiniScope {
    pub(super) globals: HashMap<String, Value>,
    pub(super) output: Output,
    pub(super) tasks: VecDeque<PendingTask>,
    pub(super) rejections: Vec<String>,
}

impl MiniScope {
    pub fn new(output: Output) -> Self {
        let mut globals = HashMap::new();
        for builtin in Builtin::ALL {
            globals.insert(builtin.name().to_string(), Value::Builtin(builtin));
        }
        Self {
            globals,
            output,
            tasks: VecDeque::new(),
            rejections: Vec::new(),
        }
    }

    /// A scope whose `print` output is collected in the returned buffer.
    pub fn captured() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (Self::new(Output::Buffer(Rc::clone(&buffer))), buffer)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }
}
