use super::ContentDigest;
use crate::source::SourceContent;

#[test]
fn digest_is_stable_for_identical_content() {
    let a = ContentDigest::of(b"print(1)\n");
    let a_again = ContentDigest::of(b"print(1)\n");
    assert_eq!(a, a_again);
}

#[test]
fn single_byte_change_changes_digest() {
    let a = ContentDigest::of(b"print(1)\n");
    let b = ContentDigest::of(b"print(2)\n");
    assert_ne!(a, b);
}

#[test]
fn text_and_bytes_with_same_content_agree() {
    let text = SourceContent::Text("var x = 1;".to_string());
    let bytes = SourceContent::Bytes(b"var x = 1;".to_vec());
    assert_eq!(
        ContentDigest::of_content(&text),
        ContentDigest::of_content(&bytes)
    );
}

#[test]
fn display_is_lower_hex_sha256() {
    let digest = ContentDigest::of(b"");
    assert_eq!(
        digest.to_string(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(format!("{:?}", digest), "ContentDigest(e3b0c44298fc)");
}
