//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

use crate::payload::SnapshotSource;

/// Fingerprint image bytes for use as a result-cache key.
///
/// Re-submitting the same image always yields the same key.
pub fn compute_image_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Default snapshot row id for a `(key, source)` pair.
pub fn snapshot_id(key: &str, source: SnapshotSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `hash` looks like a SHA-256 hex digest.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_hash_stability() {
        let hash1 = compute_image_hash(b"label-image-bytes");
        let hash2 = compute_image_hash(b"label-image-bytes");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, compute_image_hash(b"other-image"));
    }

    #[test]
    fn test_image_hash_format() {
        let hash = compute_image_hash(b"");
        assert!(is_valid_hash(&hash));
        assert_eq!(hash, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn test_snapshot_id_differs_by_source() {
        let barcode = snapshot_id("0123456789012", SnapshotSource::Barcode);
        let label = snapshot_id("0123456789012", SnapshotSource::Label);
        assert_ne!(barcode, label);
        assert_eq!(barcode, snapshot_id("0123456789012", SnapshotSource::Barcode));
    }

    #[test]
    fn test_is_valid_hash() {
        assert!(!is_valid_hash("abc"));
        assert!(!is_valid_hash(&"z".repeat(64)));
    }
}
