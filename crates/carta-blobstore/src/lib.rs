//! # carta-blobstore: Encrypted, content-addressed blob storage for `Carta`
//!
//! Record content is encrypted before it leaves the process, then pushed to
//! a content-addressable store under an address derived from the ciphertext
//! bytes. The same ciphertext always lands at the same address; re-uploading
//! is idempotent.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cid`] | Content-address derivation from ciphertext bytes |
//! | [`store`] | The `BlobStore` trait and in-memory implementation |
//! | [`client`] | Encrypt-then-upload / fetch-then-decrypt client |
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use carta_blobstore::{ContentStoreClient, MemoryBlobStore};
//! use carta_crypto::random_bytes;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let client = ContentStoreClient::new(Arc::new(MemoryBlobStore::new()));
//! let data_key = random_bytes(32);
//!
//! let receipt = client
//!     .upload(Bytes::from_static(b"scan.dcm bytes"), "scan.dcm", "application/dicom", &data_key)
//!     .await
//!     .unwrap();
//!
//! let plaintext = client.download_with_key(&receipt.cid, &data_key).await.unwrap();
//! assert_eq!(&plaintext[..], b"scan.dcm bytes");
//! # });
//! ```

pub mod cid;
pub mod client;
pub mod error;
pub mod store;

pub use cid::cid_for_ciphertext;
pub use client::{ContentStoreClient, UploadReceipt};
pub use error::{BlobError, BlobResult};
pub use store::{BlobStore, MemoryBlobStore};
