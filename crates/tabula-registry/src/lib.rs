//! # tabula-registry
//!
//! Replicated write path and content dedup for the Tabula artifact registry.
//!
//! This crate implements the registry domain, providing:
//!
//! - **Command Log**: Every write is a typed command appended to a shared
//!   partitioned journal and applied deterministically by each node
//! - **Submission Coordination**: Submitters block until their own applier
//!   has applied the command, then receive the typed outcome
//! - **Content Dedup**: Registered content is deduplicated by raw bytes and,
//!   per artifact type, by canonical form
//!
//! ## Architecture
//!
//! Nodes share nothing but the journal. A write is encoded as a
//! [`CommandEnvelope`], appended to the partition derived from its scope, and
//! applied by every node's [`applier::LogApplier`] in commit order. Commands
//! carry all generated ids and the envelope carries the timestamp, so apply
//! is a pure function of the log and replicas converge byte-for-byte.
//!
//! Partitions serialize writes per group (`{tenant}/groups/{group}`) and per
//! content identity (`{tenant}/content/{hash}`); there is no cross-partition
//! ordering and none is needed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabula_registry::{CanonicalizerRegistry, RegistryConfig, RegistryNode};
//! use tabula_core::TenantId;
//!
//! let node = RegistryNode::start(
//!     RegistryConfig::from_env()?,
//!     journal,
//!     store,
//!     CanonicalizerRegistry::builtin(),
//! )
//! .await?;
//!
//! let tenant = TenantId::new("acme-corp")?;
//! let registered = node
//!     .lookup_or_register_content(&tenant, &ArtifactType::avro(), schema_bytes)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod applier;
pub mod canon;
pub mod command;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod node;
pub mod store;

// Re-export main types at crate root
pub use canon::{CanonError, Canonicalizer, CanonicalizerRegistry};
pub use command::{Command, CommandEnvelope, CommandReturn, InitialVersion};
pub use config::RegistryConfig;
pub use content::ContentIndex;
pub use coordinator::{Resolution, SubmissionCoordinator};
pub use error::{ApplyFailure, ApplyOutcome, FailureKind, RegistryError, Result};
pub use node::{NewArtifact, RegistryNode};
pub use store::{
    ArtifactRecord, CommentRecord, ContentDisposition, ContentRecord, GroupRecord, MemoryStore,
    MetadataPatch, RegisteredContent, RegistryStore, VersionRecord,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::canon::CanonicalizerRegistry;
    pub use crate::command::{Command, CommandReturn};
    pub use crate::config::RegistryConfig;
    pub use crate::error::{RegistryError, Result};
    pub use crate::node::{NewArtifact, RegistryNode};
    pub use crate::store::{MemoryStore, RegistryStore};
}
