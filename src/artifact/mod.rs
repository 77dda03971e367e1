//! Loading of precompiled units under a security domain.
use std::path::PathBuf;

use crate::{
    engine::{DefinedArtifact, LoaderContext, ScriptEngine, SecurityDomain},
    error::HostError,
};

pub mod format;

/// Unit name for an artifact path: the text between the last `/` and the
/// last `.` after it.
pub fn unit_name_from_path(path: &str) -> &str {
    let start = path.rfind('/').map_or(0, |i| i + 1);
    let end = match path.rfind('.') {
        Some(dot) if dot >= start => dot,
        _ => path.len(),
    };
    &path[start..end]
}

pub struct CompiledArtifactLoader<'e, E: ScriptEngine> {
    engine: &'e E,
}

impl<'e, E: ScriptEngine> CompiledArtifactLoader<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Defines and links the artifact through a definer scoped to `domain`,
    /// then instantiates it. Only script artifacts are accepted.
    pub fn load(
        &self,
        path: &str,
        bytes: Option<&[u8]>,
        domain: Option<&SecurityDomain>,
    ) -> Result<E::Unit, HostError> {
        let bytes = bytes.ok_or_else(|| HostError::ArtifactNotFound(path.to_string()))?;
        let name = unit_name_from_path(path);

        let context = LoaderContext {
            origin: PathBuf::from(path),
            host_version: self.engine.implementation_version(),
        };
        let mut definer = self.engine.create_definer(&context, domain);
        let loader_error = |source| HostError::Loader {
            name: name.to_string(),
            source,
        };

        let defined = definer.define(name, bytes).map_err(loader_error)?;
        definer.link(&defined).map_err(loader_error)?;

        match defined {
            DefinedArtifact::Script(template) => {
                log::debug!("artifact: instantiating {} from {}", template.name(), path);
                template.instantiate().map_err(loader_error)
            }
            DefinedArtifact::Other { name, kind } => {
                Err(HostError::ArtifactShape { name, found: kind })
            }
        }
    }
}
