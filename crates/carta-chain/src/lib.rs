//! # carta-chain: Tamper-evident version history for `Carta`
//!
//! This crate builds hash trees over a record's version history and folds
//! each new version into a running root, so that any mutation to history
//! changes every subsequent root.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`merkle`] | Binary hash tree with inclusion proofs |
//! | [`version`] | Version entries chained through running roots |
//!
//! ## Quick Start
//!
//! ```
//! use carta_chain::{MerkleTree, VersionChain};
//! use carta_types::{Cid, UserId};
//!
//! // Build a tree and prove membership
//! let tree = MerkleTree::build(&["a".into(), "b".into(), "c".into()]).unwrap();
//! let proof = tree.generate_proof("b");
//! assert!(carta_chain::verify_proof("b", &proof, tree.root()));
//!
//! // Chain record versions
//! let mut chain = VersionChain::new();
//! let v1 = chain.append(Cid::new("f01..aa"), "hash-1".into(), UserId::new("doctor-a"));
//! assert_eq!(v1.version, 1);
//! ```

pub mod error;
pub mod merkle;
pub mod version;

pub use error::{ChainError, ChainResult};
pub use merkle::{InclusionProof, MerkleTree, ProofStep, Side, TreeHash, combine, leaf_hash, verify_proof};
pub use version::{VersionChain, VersionEntry, create_version_info};
