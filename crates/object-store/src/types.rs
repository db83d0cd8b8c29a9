//! Identifiers shared by every layer of the blob store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlobStoreError;

/// Name of the bucket holding the canonical copy of every blob.
pub const DEFAULT_BUCKET_NAME: &str = "default-bucket";

/// Opaque, content-derived identifier of a blob.
///
/// Ids end up as a single object path segment, so they may not be empty
/// and may not contain `/` or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobId(String);

impl BlobId {
    /// Derive the id of `data`: the lowercase hex BLAKE3 digest of the bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(data).as_bytes()))
    }

    /// Parse an id received from a caller or off the wire.
    pub fn parse(value: impl Into<String>) -> Result<Self, BlobStoreError> {
        let value = value.into();
        if !is_valid_segment(&value) {
            return Err(BlobStoreError::InvalidBlobId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobId {
    type Err = BlobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobId {
    type Error = BlobStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BlobId> for String {
    fn from(id: BlobId) -> Self {
        id.0
    }
}

/// Logical namespace grouping blobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    pub fn new(value: impl Into<String>) -> Result<Self, BlobStoreError> {
        let value = value.into();
        if !is_valid_segment(&value) {
            return Err(BlobStoreError::InvalidBucketName(value));
        }
        Ok(Self(value))
    }

    /// The bucket holding canonical copies under single-save mode.
    pub fn default_bucket() -> Self {
        Self(DEFAULT_BUCKET_NAME.to_string())
    }

    /// Append `suffix` to this name.
    ///
    /// The caller is responsible for `suffix` being a valid segment tail
    /// (no `/`); an empty suffix returns the same name.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BucketName {
    fn default() -> Self {
        Self::default_bucket()
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BucketName {
    type Err = BlobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BucketName {
    type Error = BlobStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

fn is_valid_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.chars().any(|c| c == '/' || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_is_content_derived() {
        let a = BlobId::of(b"hello");
        let b = BlobId::of(b"hello");
        let c = BlobId::of(b"hello!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_rejects_invalid_segments() {
        assert!(BlobId::parse("").is_err());
        assert!(BlobId::parse("a/b").is_err());
        assert!(BlobId::parse("..").is_err());
        assert!(BucketName::new("").is_err());
        assert!(BucketName::new("mail/box").is_err());
        assert!(BucketName::new("mailbox\n").is_err());

        assert!(BlobId::parse("abc-123").is_ok());
        assert!(BucketName::new("attachments").is_ok());
    }

    #[test]
    fn test_bucket_suffix() {
        let bucket = BucketName::new("messages").unwrap();
        assert_eq!(bucket.with_suffix("-replica").as_str(), "messages-replica");
        assert_eq!(bucket.with_suffix(""), bucket);
    }

    #[test]
    fn test_serde_validates() {
        let id: BlobId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(serde_json::from_str::<BucketName>("\"a/b\"").is_err());
        assert_eq!(
            serde_json::to_string(&BucketName::default_bucket()).unwrap(),
            "\"default-bucket\""
        );
    }
}
