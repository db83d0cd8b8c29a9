//! Repair events describing replication gaps between the two object storages.
//!
//! Events travel as JSON between processes, so the wire shape is fixed:
//!
//! ```json
//! { "type": "BlobAddition",
//!   "eventId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
//!   "username": "blob-replication",
//!   "bucketName": "messages",
//!   "blobId": "af13...",
//!   "failedObjectStorage": "SECONDARY" }
//! ```

use std::fmt;

use object_store::{BlobId, BucketName};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Username stamped on every event this crate emits.
pub const SYSTEM_USERNAME: &str = "blob-replication";

/// Which of the two physical stores an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectStorageIdentity {
    Primary,
    Secondary,
}

impl ObjectStorageIdentity {
    /// The replica that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

impl fmt::Display for ObjectStorageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("PRIMARY"),
            Self::Secondary => f.write_str("SECONDARY"),
        }
    }
}

/// Identifier the transport uses to deduplicate deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An operation that succeeded on one replica and must be replayed on the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RepairEvent {
    /// A blob saved on one replica only
    #[serde(rename_all = "camelCase")]
    BlobAddition {
        event_id: EventId,
        username: String,
        bucket_name: BucketName,
        blob_id: BlobId,
        failed_object_storage: ObjectStorageIdentity,
    },

    /// Blobs deleted from one replica only
    #[serde(rename_all = "camelCase")]
    BlobsDeletion {
        event_id: EventId,
        username: String,
        bucket_name: BucketName,
        blob_ids: Vec<BlobId>,
        failed_object_storage: ObjectStorageIdentity,
    },

    /// A bucket deleted from one replica only
    #[serde(rename_all = "camelCase")]
    BucketDeletion {
        event_id: EventId,
        username: String,
        bucket_name: BucketName,
        failed_object_storage: ObjectStorageIdentity,
    },
}

impl RepairEvent {
    pub fn blob_addition(
        bucket_name: &BucketName,
        blob_id: &BlobId,
        failed_object_storage: ObjectStorageIdentity,
    ) -> Self {
        Self::BlobAddition {
            event_id: EventId::random(),
            username: SYSTEM_USERNAME.to_string(),
            bucket_name: bucket_name.clone(),
            blob_id: blob_id.clone(),
            failed_object_storage,
        }
    }

    pub fn blobs_deletion(
        bucket_name: &BucketName,
        blob_ids: &[BlobId],
        failed_object_storage: ObjectStorageIdentity,
    ) -> Self {
        Self::BlobsDeletion {
            event_id: EventId::random(),
            username: SYSTEM_USERNAME.to_string(),
            bucket_name: bucket_name.clone(),
            blob_ids: blob_ids.to_vec(),
            failed_object_storage,
        }
    }

    pub fn bucket_deletion(
        bucket_name: &BucketName,
        failed_object_storage: ObjectStorageIdentity,
    ) -> Self {
        Self::BucketDeletion {
            event_id: EventId::random(),
            username: SYSTEM_USERNAME.to_string(),
            bucket_name: bucket_name.clone(),
            failed_object_storage,
        }
    }

    pub fn event_id(&self) -> EventId {
        match self {
            Self::BlobAddition { event_id, .. }
            | Self::BlobsDeletion { event_id, .. }
            | Self::BucketDeletion { event_id, .. } => *event_id,
        }
    }

    pub fn bucket_name(&self) -> &BucketName {
        match self {
            Self::BlobAddition { bucket_name, .. }
            | Self::BlobsDeletion { bucket_name, .. }
            | Self::BucketDeletion { bucket_name, .. } => bucket_name,
        }
    }

    pub fn failed_object_storage(&self) -> ObjectStorageIdentity {
        match self {
            Self::BlobAddition {
                failed_object_storage,
                ..
            }
            | Self::BlobsDeletion {
                failed_object_storage,
                ..
            }
            | Self::BucketDeletion {
                failed_object_storage,
                ..
            } => *failed_object_storage,
        }
    }

    /// The wire discriminator of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BlobAddition { .. } => "BlobAddition",
            Self::BlobsDeletion { .. } => "BlobsDeletion",
            Self::BucketDeletion { .. } => "BucketDeletion",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse an event off the wire. Unknown types and missing fields are rejected.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn bucket() -> BucketName {
        BucketName::new("messages").unwrap()
    }

    #[test]
    fn test_blob_addition_wire_format() {
        let id = BlobId::parse("blob-1").unwrap();
        let event = RepairEvent::blob_addition(&bucket(), &id, ObjectStorageIdentity::Secondary);

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "BlobAddition",
                "eventId": event.event_id().to_string(),
                "username": "blob-replication",
                "bucketName": "messages",
                "blobId": "blob-1",
                "failedObjectStorage": "SECONDARY",
            })
        );
    }

    #[test]
    fn test_blobs_deletion_wire_format() {
        let ids = vec![
            BlobId::parse("blob-1").unwrap(),
            BlobId::parse("blob-2").unwrap(),
        ];
        let event = RepairEvent::blobs_deletion(&bucket(), &ids, ObjectStorageIdentity::Primary);

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "BlobsDeletion");
        assert_eq!(value["blobIds"], json!(["blob-1", "blob-2"]));
        assert_eq!(value["failedObjectStorage"], "PRIMARY");
        assert!(value.get("blobId").is_none());
    }

    #[test]
    fn test_parses_events_from_other_workers() {
        let json = r#"{
            "type": "BucketDeletion",
            "eventId": "6e0dd9b6-6b1f-4b4e-a0c5-5a9a4d3ef1aa",
            "username": "blob-replication",
            "bucketName": "attachments",
            "blobId": "ignored",
            "failedObjectStorage": "PRIMARY"
        }"#;

        let event = RepairEvent::from_json(json).unwrap();
        assert_eq!(event.kind(), "BucketDeletion");
        assert_eq!(event.bucket_name().as_str(), "attachments");
        assert_eq!(event.failed_object_storage(), ObjectStorageIdentity::Primary);
        assert_eq!(
            event.event_id().to_string(),
            "6e0dd9b6-6b1f-4b4e-a0c5-5a9a4d3ef1aa"
        );
    }

    #[test]
    fn test_rejects_unknown_type() {
        let json = r#"{
            "type": "BlobMutation",
            "eventId": "6e0dd9b6-6b1f-4b4e-a0c5-5a9a4d3ef1aa",
            "username": "blob-replication",
            "bucketName": "attachments",
            "failedObjectStorage": "PRIMARY"
        }"#;
        assert!(RepairEvent::from_json(json).is_err());
    }

    #[test]
    fn test_rejects_missing_fields_and_bad_identities() {
        let missing_blob = r#"{
            "type": "BlobAddition",
            "eventId": "6e0dd9b6-6b1f-4b4e-a0c5-5a9a4d3ef1aa",
            "username": "blob-replication",
            "bucketName": "attachments",
            "failedObjectStorage": "PRIMARY"
        }"#;
        assert!(RepairEvent::from_json(missing_blob).is_err());

        let bad_identity = r#"{
            "type": "BucketDeletion",
            "eventId": "6e0dd9b6-6b1f-4b4e-a0c5-5a9a4d3ef1aa",
            "username": "blob-replication",
            "bucketName": "attachments",
            "failedObjectStorage": "TERTIARY"
        }"#;
        assert!(RepairEvent::from_json(bad_identity).is_err());
    }

    #[test]
    fn test_other_replica() {
        assert_eq!(
            ObjectStorageIdentity::Primary.other(),
            ObjectStorageIdentity::Secondary
        );
        assert_eq!(
            ObjectStorageIdentity::Secondary.other(),
            ObjectStorageIdentity::Primary
        );
    }
}
