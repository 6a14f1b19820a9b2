//! # carta-keys: Per-record data-key custody for `Carta`
//!
//! Every record is encrypted under its own symmetric data key. This crate
//! holds those keys: each data key is envelope-encrypted under a master key
//! before it is persisted, so the master key never touches bulk data and
//! raw data keys never touch storage.
//!
//! ```text
//!  master key (KEK)          data key (DEK)            record content
//!       │                        │                          │
//!       └── wraps ──▶ WrappedDataKey ── persisted     DEK encrypts content
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use carta_keys::{KeyCustodian, MemoryKeyStore, InMemoryMasterKey};
//! use carta_types::RecordId;
//! use std::sync::Arc;
//!
//! let custodian = KeyCustodian::new(
//!     Arc::new(InMemoryMasterKey::generate()),
//!     Arc::new(MemoryKeyStore::new()),
//! );
//!
//! let record_id = RecordId::generate();
//! let data_key = custodian.generate_data_key(32);
//! custodian.store_record_data_key(&record_id, &data_key).unwrap();
//!
//! let loaded = custodian.load_record_data_key(&record_id).unwrap();
//! assert_eq!(loaded.as_bytes(), data_key.as_bytes());
//! ```

pub mod custodian;
pub mod error;
pub mod store;

pub use custodian::{DataKey, InMemoryMasterKey, KeyCustodian, MasterKeyProvider};
pub use error::{KeyError, KeyResult};
pub use store::{KeyStore, MemoryKeyStore, WrappedDataKey};
