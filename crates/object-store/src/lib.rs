//! Primitive blob storage
//!
//! This crate provides the capability every layer of the blob store speaks,
//! `BlobStoreDao`, and its primitive implementation over pluggable object
//! storage (S3/MinIO/local filesystem/memory).
//!
//! # Features
//!
//! - Content-derived `BlobId`s and validated `BucketName`s
//! - One error taxonomy shared by the primitive store and its decorators
//! - `ObjectStoreDao`: buckets as top-level prefixes of one object store
//! - `BlobIdList`: the registry of stored ids, in memory or in SQLite
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use postblob_object_store::{BlobId, BlobStoreDao, BucketName, ObjectStoreConfig, ObjectStoreDao};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), postblob_object_store::BlobStoreError> {
//! let store = ObjectStoreDao::new(ObjectStoreConfig::Local {
//!     path: PathBuf::from("/tmp/blobs"),
//! })
//! .await?;
//!
//! let data = Bytes::from("Subject: hello");
//! let id = BlobId::of(&data);
//! store.save(&BucketName::default_bucket(), &id, data).await?;
//! # Ok(())
//! # }
//! ```

mod dao;
mod database;
mod error;
mod registry;
mod storage;
mod types;

pub use dao::{bytes_stream, collect_stream, BlobStoreDao, BlobStream};
pub use database::SqliteBlobIdList;
pub use error::{BlobStoreError, Result};
pub use registry::{BlobIdList, MemoryBlobIdList};
pub use storage::{ObjectStoreConfig, ObjectStoreDao};
pub use types::{BlobId, BucketName, DEFAULT_BUCKET_NAME};
