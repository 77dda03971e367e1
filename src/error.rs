use thiserror::Error;

use crate::engine::EngineError;

/// Process exit status. The last failure recorded during a run wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Success,
    Usage,
    RuntimeError,
    FileNotFound,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Usage => 1,
            ExitStatus::RuntimeError => 3,
            ExitStatus::FileNotFound => 4,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("couldn't read source \"{location}\": {reason}")]
    ContentUnavailable { location: String, reason: String },

    #[error("compiled artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("compiled artifact `{name}` must implement Script (found {found})")]
    ArtifactShape { name: String, found: String },

    #[error("failed to load compiled artifact `{name}`: {source}")]
    Loader {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("{} unhandled rejected promise(s)", .0.len())]
    PendingAsyncFailure(Vec<String>),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HostError {
    pub fn content_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        HostError::ContentUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            HostError::ContentUnavailable { .. } | HostError::ArtifactNotFound(_) => {
                ExitStatus::FileNotFound
            }
            HostError::Config(_) => ExitStatus::Usage,
            HostError::Engine(_)
            | HostError::ArtifactShape { .. }
            | HostError::Loader { .. }
            | HostError::PendingAsyncFailure(_) => ExitStatus::RuntimeError,
        }
    }
}
