use object_store::BlobStoreError;

use crate::events::ObjectStorageIdentity;

/// Joined result of one operation issued to both replicas.
#[derive(Debug)]
pub enum ReplicationOutcome {
    /// Both replicas applied the operation
    Replicated,
    /// Exactly one replica failed; the gap must be repaired asynchronously
    Degraded {
        failed: ObjectStorageIdentity,
        cause: BlobStoreError,
    },
    /// Neither replica applied the operation
    Failed {
        primary: BlobStoreError,
        secondary: BlobStoreError,
    },
}

impl ReplicationOutcome {
    pub fn from_results<P, S>(
        primary: Result<P, BlobStoreError>,
        secondary: Result<S, BlobStoreError>,
    ) -> Self {
        match (primary, secondary) {
            (Ok(_), Ok(_)) => Self::Replicated,
            (Err(cause), Ok(_)) => Self::Degraded {
                failed: ObjectStorageIdentity::Primary,
                cause,
            },
            (Ok(_), Err(cause)) => Self::Degraded {
                failed: ObjectStorageIdentity::Secondary,
                cause,
            },
            (Err(primary), Err(secondary)) => Self::Failed { primary, secondary },
        }
    }

    /// Replicas that applied the operation.
    pub fn success_count(&self) -> usize {
        match self {
            Self::Replicated => 2,
            Self::Degraded { .. } => 1,
            Self::Failed { .. } => 0,
        }
    }

    /// The replica to repair, when exactly one failed.
    pub fn failed_replica(&self) -> Option<ObjectStorageIdentity> {
        match self {
            Self::Degraded { failed, .. } => Some(*failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> Result<(), BlobStoreError> {
        Err(BlobStoreError::Unavailable("paused".to_string()))
    }

    #[test]
    fn test_outcomes() {
        let outcome = ReplicationOutcome::from_results(Ok(()), Ok(()));
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.failed_replica(), None);

        let outcome = ReplicationOutcome::from_results(unavailable(), Ok(()));
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.failed_replica(), Some(ObjectStorageIdentity::Primary));

        let outcome = ReplicationOutcome::from_results(Ok(()), unavailable());
        assert_eq!(
            outcome.failed_replica(),
            Some(ObjectStorageIdentity::Secondary)
        );

        let outcome = ReplicationOutcome::from_results(unavailable(), unavailable());
        assert_eq!(outcome.success_count(), 0);
        assert_eq!(outcome.failed_replica(), None);
    }
}
