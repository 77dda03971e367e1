use std::{collections::HashMap, sync::Arc};

use super::{
    MiniScript,
    ast::{FunctionDecl, Program, Statement, walk_bodies},
};
use crate::{
    artifact::format::{ArtifactClass, read_artifact},
    engine::{
        ArtifactDefiner, DefinedArtifact, EngineError, LoaderContext, ScriptTemplate,
        SecurityDomain,
    },
};

/// Loads precompiled images produced by `MiniEngine::compile_artifact`.
/// Units defined here run under the definer's security domain.
pub struct MiniDefiner {
    context: LoaderContext,
    domain: Option<SecurityDomain>,
    defined: HashMap<String, Arc<Program>>,
}

impl MiniDefiner {
    pub fn new(context: LoaderContext, domain: Option<SecurityDomain>) -> Self {
        Self {
            context,
            domain,
            defined: HashMap::new(),
        }
    }
}

impl ArtifactDefiner<MiniScript> for MiniDefiner {
    fn define(
        &mut self,
        name: &str,
        bytes: &[u8],
    ) -> Result<DefinedArtifact<MiniScript>, EngineError> {
        let image = read_artifact(bytes)?;
        let header = image.header;

        if header.host_version != self.context.host_version {
            return Err(EngineError::InvalidArtifact(format!(
                "built by {}, this host is {}",
                header.host_version, self.context.host_version
            )));
        }
        if header.name != name {
            return Err(EngineError::Link(format!(
                "{} defines `{}`, expected `{}`",
                self.context.origin.display(),
                header.name,
                name
            )));
        }

        match header.class {
            ArtifactClass::Script => {
                let program: Program = serde_json::from_slice(&image.payload)
                    .map_err(|e| EngineError::InvalidArtifact(e.to_string()))?;
                let program = Arc::new(program);
                self.defined.insert(header.name.clone(), Arc::clone(&program));
                Ok(DefinedArtifact::Script(Box::new(MiniTemplate {
                    name: header.name,
                    program,
                    domain: self.domain.clone(),
                })))
            }
            ArtifactClass::Library => {
                let _: Vec<FunctionDecl> = serde_json::from_slice(&image.payload)
                    .map_err(|e| EngineError::InvalidArtifact(e.to_string()))?;
                Ok(DefinedArtifact::Other {
                    name: header.name,
                    kind: ArtifactClass::Library.as_str().to_string(),
                })
            }
        }
    }

    fn link(&mut self, artifact: &DefinedArtifact<MiniScript>) -> Result<(), EngineError> {
        let DefinedArtifact::Script(template) = artifact else {
            return Ok(());
        };
        let program = self.defined.get(template.name()).ok_or_else(|| {
            EngineError::Link(format!("`{}` was not defined here", template.name()))
        })?;

        let mut stray_return = false;
        walk_bodies(&program.statements, false, &mut |statements, in_function| {
            if !in_function
                && statements
                    .iter()
                    .any(|s| matches!(s, Statement::Return { .. }))
            {
                stray_return = true;
            }
        });
        if stray_return {
            return Err(EngineError::Link(format!(
                "`{}` returns outside of a function",
                template.name()
            )));
        }
        Ok(())
    }
}

struct MiniTemplate {
    name: String,
    program: Arc<Program>,
    domain: Option<SecurityDomain>,
}

impl ScriptTemplate<MiniScript> for MiniTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self) -> Result<MiniScript, EngineError> {
        Ok(MiniScript {
            name: self.name.clone(),
            program: Arc::clone(&self.program),
            domain: self.domain.clone(),
        })
    }
}
