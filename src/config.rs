use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{ExecutionMode, SecurityDomain},
    error::HostError,
};

pub const DEFAULT_CACHE_CAPACITY: usize = 32;
pub const DEFAULT_LANGUAGE_VERSION: u32 = 200;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 200;
pub const DEFAULT_RETAINED_UNITS: usize = 8;
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "shc";

const LANGUAGE_VERSIONS: &[u32] = &[0, 100, 110, 120, 130, 140, 150, 160, 170, 180, 200, 250];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub primary: String,
    pub continuation: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            primary: "js> ".to_string(),
            continuation: "  > ".to_string(),
        }
    }
}

/// Host settings. Loaded from an optional JSON file, then overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub cache_capacity: usize,
    /// Recently executed units a pipeline keeps alive so their cache
    /// entries survive between runs.
    pub retained_units: usize,
    pub interpreted: bool,
    pub language_version: u32,
    pub strict: bool,
    pub warnings: bool,
    pub fatal_warnings: bool,
    pub encoding: String,
    pub prompts: Prompts,
    pub artifact_extension: String,
    pub max_call_depth: usize,
    /// Deepest statement or expression nesting the parser accepts.
    pub max_nesting_depth: usize,
    pub security_domain: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            retained_units: DEFAULT_RETAINED_UNITS,
            interpreted: false,
            language_version: DEFAULT_LANGUAGE_VERSION,
            strict: false,
            warnings: false,
            fatal_warnings: false,
            encoding: "utf-8".to_string(),
            prompts: Prompts::default(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            security_domain: None,
        }
    }
}

impl HostConfig {
    pub fn from_json_str(text: &str) -> Result<Self, HostError> {
        let config: HostConfig =
            serde_json::from_str(text).map_err(|e| HostError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = fs::read_to_string(path)
            .map_err(|e| HostError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), HostError> {
        Encoding::from_label(&self.encoding)?;
        if !LANGUAGE_VERSIONS.contains(&self.language_version) {
            return Err(HostError::Config(format!(
                "unsupported language version {}",
                self.language_version
            )));
        }
        if self.artifact_extension.is_empty() || self.artifact_extension.contains('.') {
            return Err(HostError::Config(format!(
                "artifact extension must be a bare suffix, got `{}`",
                self.artifact_extension
            )));
        }
        if self.max_call_depth == 0 {
            return Err(HostError::Config("max_call_depth must be at least 1".into()));
        }
        if self.max_nesting_depth == 0 {
            return Err(HostError::Config("max_nesting_depth must be at least 1".into()));
        }
        Ok(())
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.interpreted {
            ExecutionMode::Interpreted
        } else {
            ExecutionMode::Compiled
        }
    }

    pub fn security_domain(&self) -> Option<SecurityDomain> {
        self.security_domain.as_deref().map(SecurityDomain::new)
    }
}

/// Text encodings the source reader can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
}

impl Encoding {
    pub fn from_label(label: &str) -> Result<Self, HostError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            other => Err(HostError::Config(format!("unsupported encoding `{}`", other))),
        }
    }
}
