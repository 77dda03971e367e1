//! Boundary between the host and an embedded script engine.
//!
//! The host never looks inside a compiled unit. It asks the engine to
//! compile source, to define artifacts through a domain-scoped definer, and
//! to execute units against a scope. Everything else (grammar, values,
//! scheduling of deferred work) stays on the engine side of this module.
use std::{fmt, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mini;

/// Opaque token naming the privilege level a unit runs under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityDomain(Arc<str>);

impl SecurityDomain {
    pub const SANDBOX: &'static str = "sandbox";

    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn sandbox() -> Self {
        Self::new(Self::SANDBOX)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_sandbox(&self) -> bool {
        &*self.0 == Self::SANDBOX
    }
}

impl fmt::Display for SecurityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the engine runs units straight from the parse tree or after its
/// optimizing passes. Part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Interpreted,
    Compiled,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Interpreted => "interpreted",
            ExecutionMode::Compiled => "compiled",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub unit: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(unit: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            unit: unit.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.unit, self.line, self.column)
    }
}

/// Failure raised by the engine while compiling, linking or executing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
        /// The parser ran out of input rather than meeting a bad token.
        at_end: bool,
    },
    #[error("{message}")]
    Runtime {
        message: String,
        location: Option<SourceLocation>,
    },
    #[error("uncaught exception: {value}")]
    Thrown {
        value: String,
        location: Option<SourceLocation>,
    },
    #[error("{what}")]
    ResourceExhausted {
        what: String,
        location: Option<SourceLocation>,
    },
    #[error("link error: {0}")]
    Link(String),
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
}

impl EngineError {
    pub fn runtime(message: impl Into<String>) -> Self {
        EngineError::Runtime {
            message: message.into(),
            location: None,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            EngineError::Syntax { location, .. } => Some(location),
            EngineError::Runtime { location, .. }
            | EngineError::Thrown { location, .. }
            | EngineError::ResourceExhausted { location, .. } => location.as_ref(),
            EngineError::Link(_) | EngineError::InvalidArtifact(_) => None,
        }
    }

    /// Attaches `location` unless the error already carries one.
    pub fn at(self, location: SourceLocation) -> Self {
        match self {
            EngineError::Runtime {
                message,
                location: None,
            } => EngineError::Runtime {
                message,
                location: Some(location),
            },
            EngineError::Thrown {
                value,
                location: None,
            } => EngineError::Thrown {
                value,
                location: Some(location),
            },
            EngineError::ResourceExhausted {
                what,
                location: None,
            } => EngineError::ResourceExhausted {
                what,
                location: Some(location),
            },
            other => other,
        }
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, EngineError::ResourceExhausted { .. })
    }
}

/// What the host needs to know about a result value to apply echo rules.
pub trait ScriptValue {
    fn is_undefined(&self) -> bool;
    fn is_function(&self) -> bool;
}

/// Where a definer is being asked to load from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderContext {
    pub origin: PathBuf,
    pub host_version: String,
}

/// Template that produces the default instance of a defined script artifact.
pub trait ScriptTemplate<U> {
    fn name(&self) -> &str;
    fn instantiate(&self) -> Result<U, EngineError>;
}

/// An artifact after definition, tagged by the capability it exposes.
pub enum DefinedArtifact<U> {
    Script(Box<dyn ScriptTemplate<U>>),
    /// Loaded and well-formed, but not an executable unit.
    Other { name: String, kind: String },
}

impl<U> DefinedArtifact<U> {
    pub fn name(&self) -> &str {
        match self {
            DefinedArtifact::Script(template) => template.name(),
            DefinedArtifact::Other { name, .. } => name,
        }
    }
}

impl<U> fmt::Debug for DefinedArtifact<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinedArtifact::Script(template) => {
                f.debug_tuple("Script").field(&template.name()).finish()
            }
            DefinedArtifact::Other { name, kind } => f
                .debug_struct("Other")
                .field("name", name)
                .field("kind", kind)
                .finish(),
        }
    }
}

/// Domain-scoped loading capability handed out by the engine.
pub trait ArtifactDefiner<U> {
    fn define(&mut self, name: &str, bytes: &[u8]) -> Result<DefinedArtifact<U>, EngineError>;
    fn link(&mut self, artifact: &DefinedArtifact<U>) -> Result<(), EngineError>;
}

pub trait ScriptEngine {
    /// A compiled unit. Shared across threads through the script cache.
    type Unit: Send + Sync + 'static;
    type Scope;
    type Value: ScriptValue;

    fn implementation_version(&self) -> String;

    fn execution_mode(&self) -> ExecutionMode;

    /// Compile settings besides the execution mode that change what
    /// `compile` accepts or produces. Units compiled under different
    /// profiles never share a cache entry.
    fn compile_profile(&self) -> String {
        String::new()
    }

    fn new_scope(&self) -> Self::Scope;

    /// Returns `Ok(None)` when `source` holds nothing executable.
    fn compile(
        &self,
        source: &str,
        unit_name: &str,
        start_line: usize,
        domain: Option<&SecurityDomain>,
    ) -> Result<Option<Self::Unit>, EngineError>;

    fn execute(&self, unit: &Self::Unit, scope: &mut Self::Scope)
    -> Result<Self::Value, EngineError>;

    fn is_compilable_unit(&self, text: &str) -> bool;

    /// Converts a result to text for echoing. Conversion may itself fail.
    fn render(&self, value: &Self::Value) -> Result<String, EngineError>;

    fn create_definer<'a>(
        &'a self,
        context: &LoaderContext,
        domain: Option<&SecurityDomain>,
    ) -> Box<dyn ArtifactDefiner<Self::Unit> + 'a>;

    fn define_global_strings(&self, scope: &mut Self::Scope, name: &str, values: &[String]);

    /// Rejections nobody handled since the last call, rendered as text.
    fn take_unhandled_rejections(&self, scope: &mut Self::Scope) -> Vec<String>;

    /// Runs deferred tasks until the queue is empty.
    fn run_pending_tasks(&self, scope: &mut Self::Scope) -> Result<(), EngineError>;
}
