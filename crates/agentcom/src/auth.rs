//! Auth gate for inbound gRPC calls
//!
//! The gate only checks that a credential is *present*. Any non-empty value
//! is accepted; no key is compared against a secret.

use thiserror::Error;
use tonic::metadata::MetadataMap;

use crate::DEFAULT_API_KEY_HEADER;

/// Why a call was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing grpc metadata")]
    MissingMetadata,

    #[error("Missing api key")]
    MissingCredential,
}

/// Presence check on the caller's credential field
#[derive(Debug, Clone)]
pub struct AuthGate {
    field: String,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new(DEFAULT_API_KEY_HEADER)
    }
}

impl AuthGate {
    /// Gate on the given metadata field. gRPC metadata keys are lowercase.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into().to_ascii_lowercase(),
        }
    }

    /// Name of the required field
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Check the call metadata before any mutation is allowed
    pub fn check(&self, metadata: &MetadataMap) -> Result<(), AuthError> {
        if metadata.is_empty() {
            tracing::warn!("No metadata found, not allowing request");
            return Err(AuthError::MissingMetadata);
        }

        let present = metadata
            .get(self.field.as_str())
            .map(|value| !value.as_bytes().is_empty())
            .unwrap_or(false);

        if !present {
            tracing::warn!(field = %self.field, "No api key found, not allowing request");
            return Err(AuthError::MissingCredential);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    fn metadata_with(key: &'static str, value: &str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(key, MetadataValue::try_from(value).unwrap());
        metadata
    }

    #[test]
    fn test_empty_metadata_rejected() {
        let gate = AuthGate::default();
        assert_eq!(
            gate.check(&MetadataMap::new()),
            Err(AuthError::MissingMetadata)
        );
    }

    #[test]
    fn test_missing_field_rejected() {
        let gate = AuthGate::default();
        let metadata = metadata_with("user-agent", "agent/1.0");
        assert_eq!(gate.check(&metadata), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_empty_field_rejected() {
        let gate = AuthGate::default();
        let metadata = metadata_with(DEFAULT_API_KEY_HEADER, "");
        assert_eq!(gate.check(&metadata), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_any_value_accepted() {
        let gate = AuthGate::default();
        assert!(gate.check(&metadata_with(DEFAULT_API_KEY_HEADER, "anything")).is_ok());
        assert!(gate.check(&metadata_with(DEFAULT_API_KEY_HEADER, "0")).is_ok());
    }

    #[test]
    fn test_non_visible_ascii_value_accepted() {
        use tonic::codegen::http::{HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert(
            DEFAULT_API_KEY_HEADER,
            HeaderValue::from_bytes(b"k\xe9y\xff").unwrap(),
        );
        let metadata = MetadataMap::from_headers(headers);

        assert!(AuthGate::default().check(&metadata).is_ok());
    }

    #[test]
    fn test_custom_field_is_lowercased() {
        let gate = AuthGate::new("X-Agent-Key");
        assert_eq!(gate.field(), "x-agent-key");
        assert!(gate.check(&metadata_with("x-agent-key", "k")).is_ok());
        assert_eq!(
            gate.check(&metadata_with(DEFAULT_API_KEY_HEADER, "k")),
            Err(AuthError::MissingCredential)
        );
    }
}
