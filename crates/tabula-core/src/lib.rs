//! # tabula-core
//!
//! Core abstractions for the Tabula artifact registry.
//!
//! This crate provides the foundational types used across all Tabula components:
//!
//! - **Tenant Context**: Multi-tenant isolation primitives
//! - **Identifiers**: Strongly-typed IDs for content, comments, nodes, and submissions
//! - **Artifact Naming**: Group/artifact/type/version-state vocabulary
//! - **Content Hashing**: SHA-256 digests used for content identity
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `tabula-core` is the **only** crate allowed to define shared primitives.
//! All cross-component interaction happens via explicitly versioned contracts
//! defined in this crate.
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::prelude::*;
//!
//! let tenant = TenantId::new("acme-corp").unwrap();
//! let content_id = ContentId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod artifact;
pub mod content;
pub mod error;
pub mod id;
pub mod observability;
pub mod tenant;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tabula_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::artifact::{ArtifactId, ArtifactType, GroupId, VersionState};
    pub use crate::content::ContentHash;
    pub use crate::error::{Error, Result};
    pub use crate::id::{CommentId, ContentId, CorrelationId, NodeId};
    pub use crate::tenant::TenantId;
}

// Re-export key types at crate root for ergonomics
pub use artifact::{ArtifactId, ArtifactType, GroupId, VersionState};
pub use content::ContentHash;
pub use error::{Error, Result};
pub use id::{CommentId, ContentId, CorrelationId, NodeId};
pub use observability::{LogFormat, init_logging};
pub use tenant::TenantId;
