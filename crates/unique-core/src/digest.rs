//! Content digests: 32-byte SHA-256, keyed in the blob store as lowercase hex.

use sha2::{Digest as _, Sha256};
use std::fmt;

/// A 32-byte SHA-256 content digest.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Hash `bytes` in one shot.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = DigestHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }

    /// Lowercase hex encoding, used as the blob store's table key.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental SHA-256 hasher for streaming input (e.g. chunked `pread` loops).
#[derive(Clone)]
pub struct DigestHasher {
    inner: Sha256,
}

impl DigestHasher {
    /// Start a new incremental hash.
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    /// Feed more bytes into the running hash.
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Consume the hasher and produce the final digest.
    pub fn finish(self) -> Digest {
        let out = self.inner.finalize();
        let mut d = [0u8; 32];
        d.copy_from_slice(&out);
        Digest(d)
    }
}

impl Default for DigestHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_matches_incremental() {
        let data = b"Hello, World!\0";
        let a = Digest::of(data);
        let mut h = DigestHasher::new();
        h.update(&data[..7]);
        h.update(&data[7..]);
        let b = h.finish();
        assert_eq!(a, b);
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let d = Digest::of(b"");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_input_is_well_known_sha256() {
        let d = Digest::of(b"");
        assert_eq!(d.to_hex(), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}
