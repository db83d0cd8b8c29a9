use object_store::{BlobStoreError, BucketName};

/// Bucket naming of the secondary object storage.
///
/// The secondary replica stores `bucket` under `bucket + suffix`, which lets
/// both replicas share one physical backend or follow different naming
/// conventions. Both the write path and the read path go through the same
/// mapping, and `to_primary` inverts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryBucketMapping {
    suffix: String,
}

impl SecondaryBucketMapping {
    pub fn new(suffix: impl Into<String>) -> Result<Self, BlobStoreError> {
        let suffix = suffix.into();
        if suffix.chars().any(|c| c == '/' || c.is_control()) {
            return Err(BlobStoreError::InvalidConfig(format!(
                "invalid secondary bucket suffix: {:?}",
                suffix
            )));
        }
        Ok(Self { suffix })
    }

    /// Same bucket names on both replicas.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn to_secondary(&self, bucket: &BucketName) -> BucketName {
        bucket.with_suffix(&self.suffix)
    }

    /// Recover the primary name of a secondary bucket, if it follows the mapping.
    pub fn to_primary(&self, secondary: &BucketName) -> Option<BucketName> {
        secondary
            .as_str()
            .strip_suffix(self.suffix.as_str())
            .and_then(|name| BucketName::new(name).ok())
    }
}
