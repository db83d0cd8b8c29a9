/// Test doubles for replica outages
///
/// `PausableBlobStore` behaves like an in-memory object storage until it is
/// paused; while paused every operation fails with
/// `BlobStoreError::Unavailable`, the way an unreachable region would.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::PausableBlobStore;
///
/// #[tokio::test]
/// async fn test_outage() {
///     let secondary = PausableBlobStore::memory("secondary");
///     secondary.pause();
///     // ... writes now degrade to the primary only
///     secondary.resume();
/// }
/// ```
mod pausable;

pub use pausable::{PausableBlobStore, UnavailableEventBus};
