// Content identifier: storage keys are `<md5 hex>.<extension>` of the exact
// bytes being uploaded, so re-uploading the same payload hits the same key.

use md5::{Digest, Md5};

pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

pub fn storage_key(bytes: &[u8], extension: &str) -> String {
    format!("{}.{}", md5_hex(bytes), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_hex(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn key_is_hash_dot_extension() {
        let key = storage_key(b"hello", "webp");
        assert_eq!(key, "5d41402abc4b2a76b9719d911017c592.webp");
        assert_eq!(storage_key(b"hello", "webp"), key);
    }
}
