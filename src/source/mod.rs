//! Reading script content from files and URLs.
use std::{cell::RefCell, collections::HashMap, fs, io, path::Path, rc::Rc};

use crate::{config::Encoding, error::HostError};

mod shebang;

pub use shebang::{Shebang, strip_shebang};

/// How a request's content is treated, resolved once from the path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source,
    Binary,
}

impl ArtifactKind {
    /// A path is a binary artifact when it ends in `.` followed by
    /// `binary_extension`, whatever comes before the dot.
    pub fn from_path(path: &str, binary_extension: &str) -> Self {
        let is_binary = path
            .strip_suffix(binary_extension)
            .is_some_and(|rest| rest.ends_with('.'));
        if is_binary {
            ArtifactKind::Binary
        } else {
            ArtifactKind::Source
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl SourceContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SourceContent::Text(text) => text.as_bytes(),
            SourceContent::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait SourceAcquirer {
    /// Reads `location`. Binary kinds come back as bytes, everything else
    /// as decoded text.
    fn acquire(&self, location: &str, kind: ArtifactKind) -> Result<SourceContent, HostError>;
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads local files, and remote URLs when built with the `remote` feature.
#[derive(Debug, Clone)]
pub struct FsSourceAcquirer {
    encoding: Encoding,
}

impl FsSourceAcquirer {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    fn read_bytes(&self, location: &str) -> Result<Vec<u8>, HostError> {
        if is_url(location) {
            return fetch_url(location);
        }
        fs::read(Path::new(location))
            .map_err(|e| HostError::content_unavailable(location, describe_io(&e)))
    }

    fn decode(&self, location: &str, bytes: Vec<u8>) -> Result<String, HostError> {
        match self.encoding {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| {
                HostError::content_unavailable(location, format!("invalid UTF-8: {}", e))
            }),
        }
    }
}

impl Default for FsSourceAcquirer {
    fn default() -> Self {
        Self::new(Encoding::Utf8)
    }
}

impl SourceAcquirer for FsSourceAcquirer {
    fn acquire(&self, location: &str, kind: ArtifactKind) -> Result<SourceContent, HostError> {
        let bytes = self.read_bytes(location)?;
        log::trace!("read {} bytes from {}", bytes.len(), location);
        match kind {
            ArtifactKind::Binary => Ok(SourceContent::Bytes(bytes)),
            ArtifactKind::Source => self.decode(location, bytes).map(SourceContent::Text),
        }
    }
}

/// In-memory sources keyed by location. Clones share contents, so a caller
/// can change a source after handing the acquirer to a pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceAcquirer {
    sources: Rc<RefCell<HashMap<String, SourceContent>>>,
}

impl MemorySourceAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: impl Into<String>, content: SourceContent) {
        self.sources.borrow_mut().insert(location.into(), content);
    }

    pub fn insert_text(&self, location: impl Into<String>, text: impl Into<String>) {
        self.insert(location, SourceContent::Text(text.into()));
    }

    pub fn remove(&self, location: &str) -> Option<SourceContent> {
        self.sources.borrow_mut().remove(location)
    }
}

impl SourceAcquirer for MemorySourceAcquirer {
    fn acquire(&self, location: &str, kind: ArtifactKind) -> Result<SourceContent, HostError> {
        let sources = self.sources.borrow();
        let content = sources
            .get(location)
            .ok_or_else(|| HostError::content_unavailable(location, "no such file"))?;
        Ok(match (kind, content) {
            (ArtifactKind::Binary, SourceContent::Text(text)) => {
                SourceContent::Bytes(text.clone().into_bytes())
            }
            (_, content) => content.clone(),
        })
    }
}

fn describe_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "no such file".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str) -> Result<Vec<u8>, HostError> {
    let response =
        reqwest::blocking::get(url).map_err(|e| HostError::content_unavailable(url, e))?;
    if !response.status().is_success() {
        return Err(HostError::content_unavailable(
            url,
            format!("server answered {}", response.status()),
        ));
    }
    let bytes = response
        .bytes()
        .map_err(|e| HostError::content_unavailable(url, e))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote"))]
fn fetch_url(url: &str) -> Result<Vec<u8>, HostError> {
    Err(HostError::content_unavailable(
        url,
        "remote sources require the `remote` feature",
    ))
}
