//! On-disk container for precompiled units.
//!
//! Layout, all integers little endian:
//!
//! ```text
//! magic        4 bytes  "SHBC"
//! format       u16
//! host version u32 length + UTF-8
//! kind         u8       0 = script, 1 = library
//! unit name    u32 length + UTF-8
//! payload      u32 length + engine-defined bytes
//! ```
use std::io::{self, Read, Write};

use crate::engine::EngineError;

pub const MAGIC: &[u8; 4] = b"SHBC";
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactClass {
    Script,
    Library,
}

impl ArtifactClass {
    fn tag(self) -> u8 {
        match self {
            ArtifactClass::Script => 0,
            ArtifactClass::Library => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ArtifactClass::Script),
            1 => Some(ArtifactClass::Library),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactClass::Script => "script",
            ArtifactClass::Library => "library",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub host_version: String,
    pub class: ArtifactClass,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactImage {
    pub header: ArtifactHeader,
    pub payload: Vec<u8>,
}

pub fn write_artifact(
    writer: &mut impl Write,
    header: &ArtifactHeader,
    payload: &[u8],
) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    write_string(writer, &header.host_version)?;
    writer.write_all(&[header.class.tag()])?;
    write_string(writer, &header.name)?;
    write_bytes(writer, payload)
}

pub fn encode_artifact(header: &ArtifactHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 64);
    // Writing into a Vec cannot fail.
    let _ = write_artifact(&mut out, header, payload);
    out
}

pub fn read_artifact(mut bytes: &[u8]) -> Result<ArtifactImage, EngineError> {
    let reader = &mut bytes;

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| invalid("truncated header"))?;
    if &magic != MAGIC {
        return Err(invalid("bad magic number"));
    }

    let version = read_u16(reader).ok_or_else(|| invalid("truncated header"))?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let host_version = read_string(reader).ok_or_else(|| invalid("unreadable host version"))?;
    let tag = read_u8(reader).ok_or_else(|| invalid("truncated header"))?;
    let class = ArtifactClass::from_tag(tag)
        .ok_or_else(|| invalid(format!("unknown artifact kind {}", tag)))?;
    let name = read_string(reader).ok_or_else(|| invalid("unreadable unit name"))?;
    let payload = read_bytes(reader).ok_or_else(|| invalid("truncated payload"))?;
    if !reader.is_empty() {
        return Err(invalid("trailing bytes after payload"));
    }

    Ok(ArtifactImage {
        header: ArtifactHeader {
            host_version,
            class,
            name,
        },
        payload,
    })
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidArtifact(message.into())
}

fn write_string(writer: &mut impl Write, value: &str) -> io::Result<()> {
    write_bytes(writer, value.as_bytes())
}

fn write_bytes(writer: &mut impl Write, value: &[u8]) -> io::Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "section too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value)
}

fn read_u8(reader: &mut impl Read) -> Option<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf).ok()?;
    Some(buf[0])
}

fn read_u16(reader: &mut impl Read) -> Option<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).ok()?;
    Some(u16::from_le_bytes(buf))
}

fn read_u32(reader: &mut impl Read) -> Option<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn read_bytes(reader: &mut &[u8]) -> Option<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    if reader.len() < len {
        return None;
    }
    let (head, rest) = reader.split_at(len);
    *reader = rest;
    Some(head.to_vec())
}

fn read_string(reader: &mut &[u8]) -> Option<String> {
    String::from_utf8(read_bytes(reader)?).ok()
}

#[cfg(test)]
mod format_test;
