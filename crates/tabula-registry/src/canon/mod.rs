//! Per-type content canonicalization for duplicate detection.
//!
//! A canonicalizer reduces content bytes to a normal form so that
//! byte-different renditions of the same logical schema (whitespace, key
//! order, comments) hash identically. Canonicalization is best-effort:
//! content that fails to canonicalize still registers, it just only
//! deduplicates on exact bytes.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use tabula_core::ArtifactType;

mod avro;
mod json;
mod protobuf;

pub use avro::AvroCanonicalizer;
pub use json::JsonCanonicalizer;
pub use protobuf::ProtobufCanonicalizer;

/// Errors raised while canonicalizing content.
#[derive(Debug, Error)]
pub enum CanonError {
    /// Content could not be parsed under the canonicalizer's format.
    #[error("malformed content: {message}")]
    Malformed {
        /// Parser diagnostic.
        message: String,
    },

    /// Canonical form could not be rendered.
    #[error("failed to render canonical form: {message}")]
    Render {
        /// Writer diagnostic.
        message: String,
    },
}

impl CanonError {
    /// Creates a [`CanonError::Malformed`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a [`CanonError::Render`].
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

/// Reduces content bytes to a canonical form for duplicate detection.
///
/// Implementations must be deterministic: the same input bytes produce the
/// same canonical bytes on every node, in every process. Anything less
/// silently breaks cross-node dedup convergence.
pub trait Canonicalizer: Send + Sync {
    /// Artifact type this canonicalizer understands.
    fn artifact_type(&self) -> ArtifactType;

    /// Produces the canonical byte form of `content`.
    ///
    /// # Errors
    ///
    /// Returns an error when the content cannot be parsed or rendered under
    /// this canonicalizer's format.
    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError>;
}

/// Lookup table from artifact type to canonicalizer.
///
/// ## Example
///
/// ```rust
/// use tabula_registry::canon::CanonicalizerRegistry;
/// use tabula_core::ArtifactType;
///
/// let registry = CanonicalizerRegistry::builtin();
/// assert!(registry.get(&ArtifactType::avro()).is_some());
/// assert!(registry.get(&ArtifactType::openapi()).is_none());
/// ```
pub struct CanonicalizerRegistry {
    by_type: HashMap<ArtifactType, Arc<dyn Canonicalizer>>,
}

impl CanonicalizerRegistry {
    /// Creates a registry with no canonicalizers; everything deduplicates on
    /// raw bytes only.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in canonicalizers (JSON, Avro,
    /// Protobuf).
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with(Arc::new(JsonCanonicalizer))
            .with(Arc::new(AvroCanonicalizer))
            .with(Arc::new(ProtobufCanonicalizer))
    }

    /// Registers a canonicalizer, replacing any existing one for the same
    /// artifact type.
    #[must_use]
    pub fn with(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.by_type
            .insert(canonicalizer.artifact_type(), canonicalizer);
        self
    }

    /// Looks up the canonicalizer for an artifact type.
    #[must_use]
    pub fn get(&self, artifact_type: &ArtifactType) -> Option<&dyn Canonicalizer> {
        self.by_type.get(artifact_type).map(AsRef::as_ref)
    }

    /// Best-effort canonical form of `content` under `artifact_type`.
    ///
    /// Returns `None` when no canonicalizer is registered for the type or
    /// when canonicalization fails. Failures are logged and counted but never
    /// surfaced: content that will not canonicalize still registers, scoped
    /// to exact-byte dedup.
    #[must_use]
    pub fn canonical_form(&self, artifact_type: &ArtifactType, content: &[u8]) -> Option<Vec<u8>> {
        let canonicalizer = self.get(artifact_type)?;
        match canonicalizer.canonicalize(content) {
            Ok(canonical) => Some(canonical),
            Err(error) => {
                warn!(
                    artifact_type = %artifact_type,
                    %error,
                    "canonicalization failed; falling back to raw-byte dedup"
                );
                crate::metrics::record_canonicalization_failure(artifact_type);
                None
            }
        }
    }
}

impl Default for CanonicalizerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for CanonicalizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.by_type.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("CanonicalizerRegistry")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Canonicalizer for Upper {
        fn artifact_type(&self) -> ArtifactType {
            ArtifactType::new("wsdl").unwrap()
        }

        fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError> {
            Ok(content.to_ascii_uppercase())
        }
    }

    #[test]
    fn builtin_covers_json_avro_protobuf() {
        let registry = CanonicalizerRegistry::builtin();
        assert!(registry.get(&ArtifactType::json()).is_some());
        assert!(registry.get(&ArtifactType::avro()).is_some());
        assert!(registry.get(&ArtifactType::protobuf()).is_some());
        assert!(registry.get(&ArtifactType::openapi()).is_none());
    }

    #[test]
    fn with_replaces_existing_type() {
        struct Identity;
        impl Canonicalizer for Identity {
            fn artifact_type(&self) -> ArtifactType {
                ArtifactType::json()
            }
            fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>, CanonError> {
                Ok(content.to_vec())
            }
        }

        let registry = CanonicalizerRegistry::builtin().with(Arc::new(Identity));
        let out = registry
            .canonical_form(&ArtifactType::json(), b"{ \"a\" : 1 }")
            .unwrap();
        assert_eq!(out, b"{ \"a\" : 1 }");
    }

    #[test]
    fn custom_canonicalizer_is_reachable() {
        let registry = CanonicalizerRegistry::empty().with(Arc::new(Upper));
        let out = registry
            .canonical_form(&ArtifactType::new("wsdl").unwrap(), b"abc")
            .unwrap();
        assert_eq!(out, b"ABC");
    }

    #[test]
    fn canonical_form_degrades_on_failure() {
        let registry = CanonicalizerRegistry::builtin();
        // Not JSON at all: no canonical form, but no error either.
        assert!(registry
            .canonical_form(&ArtifactType::json(), b"definitely not json")
            .is_none());
    }

    #[test]
    fn canonical_form_without_registration_is_none() {
        let registry = CanonicalizerRegistry::empty();
        assert!(registry
            .canonical_form(&ArtifactType::json(), b"{}")
            .is_none());
    }
}
