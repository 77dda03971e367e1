use super::{
    ArtifactClass, ArtifactHeader, FORMAT_VERSION, MAGIC, encode_artifact, read_artifact,
};
use crate::engine::EngineError;

fn header() -> ArtifactHeader {
    ArtifactHeader {
        host_version: "mini 0.1.0".to_string(),
        class: ArtifactClass::Script,
        name: "greet".to_string(),
    }
}

#[test]
fn encoded_image_reads_back() {
    let bytes = encode_artifact(&header(), b"{}");
    assert_eq!(&bytes[..4], MAGIC);
    let image = read_artifact(&bytes).unwrap();
    assert_eq!(image.header, header());
    assert_eq!(image.payload, b"{}");
}

#[test]
fn wrong_magic_is_rejected() {
    let mut bytes = encode_artifact(&header(), b"{}");
    bytes[0] = b'X';
    assert_eq!(
        read_artifact(&bytes).unwrap_err(),
        EngineError::InvalidArtifact("bad magic number".to_string())
    );
}

#[test]
fn future_format_version_is_rejected() {
    let mut bytes = encode_artifact(&header(), b"{}");
    bytes[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    let err = read_artifact(&bytes).unwrap_err();
    assert!(err.to_string().contains("unsupported format version"));
}

#[test]
fn truncated_payload_is_rejected() {
    let bytes = encode_artifact(&header(), b"{\"statements\":[]}");
    let err = read_artifact(&bytes[..bytes.len() - 3]).unwrap_err();
    assert_eq!(err, EngineError::InvalidArtifact("truncated payload".to_string()));
}

#[test]
fn trailing_garbage_is_rejected() {
    let mut bytes = encode_artifact(&header(), b"{}");
    bytes.push(0);
    assert!(read_artifact(&bytes).is_err());
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(
        read_artifact(&[]),
        Err(EngineError::InvalidArtifact(_))
    ));
}

#[test]
fn unknown_kind_tag_is_rejected() {
    let mut bytes = encode_artifact(&header(), b"{}");
    // magic + version + host version (len + text)
    let tag_at = 4 + 2 + 4 + header().host_version.len();
    bytes[tag_at] = 9;
    let err = read_artifact(&bytes).unwrap_err();
    assert!(err.to_string().contains("unknown artifact kind 9"));
}
