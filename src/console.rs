//! Line-oriented terminal access for the interactive session.
use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, BufRead, Write},
    rc::Rc,
};

pub trait Console {
    /// Writes `prompt` (if any) and reads one line without its terminator.
    /// `Ok(None)` signals end of input.
    fn read_line(&mut self, prompt: Option<&str>) -> io::Result<Option<String>>;

    fn println(&mut self, text: &str);

    fn flush(&mut self);
}

/// Lets a caller keep inspecting a console it handed to a pipeline.
impl<C: Console> Console for Rc<RefCell<C>> {
    fn read_line(&mut self, prompt: Option<&str>) -> io::Result<Option<String>> {
        self.borrow_mut().read_line(prompt)
    }

    fn println(&mut self, text: &str) {
        self.borrow_mut().println(text)
    }

    fn flush(&mut self) {
        self.borrow_mut().flush()
    }
}

/// The process's standard input and output. Streams are locked per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn read_line(&mut self, prompt: Option<&str>) -> io::Result<Option<String>> {
        if let Some(prompt) = prompt {
            let mut stdout = io::stdout().lock();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
        }
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        trim_terminator(&mut line);
        Ok(Some(line))
    }

    fn println(&mut self, text: &str) {
        if let Err(e) = writeln!(io::stdout().lock(), "{}", text) {
            log::warn!("console write failed: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = io::stdout().flush() {
            log::warn!("console flush failed: {}", e);
        }
    }
}

fn trim_terminator(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Console fed from a fixed list of lines. Prompts and printed text are
/// recorded into one transcript.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<io::Result<String>>,
    transcript: String,
    flushes: usize,
}

impl ScriptedConsole {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(|l| Ok(l.into())).collect(),
            ..Self::default()
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.input.push_back(Ok(line.into()));
    }

    /// Queues a read failure after the lines already queued.
    pub fn push_error(&mut self, kind: io::ErrorKind, message: &str) {
        self.input.push_back(Err(io::Error::new(kind, message.to_string())));
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: Option<&str>) -> io::Result<Option<String>> {
        if let Some(prompt) = prompt {
            self.transcript.push_str(prompt);
        }
        match self.input.pop_front() {
            Some(Ok(line)) => {
                self.transcript.push_str(&line);
                self.transcript.push('\n');
                Ok(Some(line))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn println(&mut self, text: &str) {
        self.transcript.push_str(text);
        self.transcript.push('\n');
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
