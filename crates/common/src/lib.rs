/**
 * Composition of the storage decorators from
 *  configuration, innermost first.
 */
pub mod builder;
/**
 * Encryption at rest.
 *  - Password derived payload key
 *  - Encrypting blob store decorator
 */
pub mod crypto;
/**
 * Delivery of repair events: the bus contract,
 *  its retry policy and an in-process bus.
 */
pub mod event_bus;
/**
 * Repair events and their wire format.
 */
pub mod events;
/**
 * Worker replaying failed replica operations.
 */
pub mod repair;
/**
 * Dual-region replication over a primary and
 *  a secondary object storage.
 */
pub mod replication;
/**
 * Store-once guard over any blob store.
 */
pub mod single_save;
/**
 * Test doubles for exercising replica outages.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::builder::{
        BlobStoreBuilder, BuildError, ComposedBlobStore, EncryptionConfig, StorageStrategyConfig,
    };
    pub use crate::event_bus::{
        EventBus, EventBusError, EventListener, InMemoryEventBus, RetryPolicy,
    };
    pub use crate::events::{ObjectStorageIdentity, RepairEvent};
    pub use crate::repair::FailedBlobOperationListener;
    pub use crate::replication::{SecondaryBlobStoreDao, SecondaryBucketMapping};
    pub use crate::single_save::SingleSaveBlobStoreDao;
    pub use crate::version::build_info;
}
