use cdir_types::HashValue;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so hashed property text and unique-value keys never collide
/// even when their input bytes are identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for `TextToHash` property input.
    pub const TEXT: Self = Self {
        domain: "cdir-text-v1",
    };
    /// Hasher for unique-value keys.
    pub const UNIQUE: Self = Self {
        domain: "cdir-unique-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> HashValue {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        HashValue::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a UTF-8 string.
    pub fn hash_text(&self, text: &str) -> HashValue {
        self.hash(text.as_bytes())
    }

    /// Hash the canonical binary encoding of a value.
    pub fn hash_encoded<T: serde::Serialize>(&self, value: &T) -> Result<HashValue, HasherError> {
        let data =
            bincode::serialize(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &HashValue) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::TEXT
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
