//! Provider completion events and caller-visible results.

use serde::{Deserialize, Serialize};

use crate::error::{Fido2Error, Result};

/// What the provider reports when a ceremony ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CeremonyOutcome {
    /// A new credential was created.
    Attestation {
        #[serde(with = "serde_bytes")]
        credential_id: Vec<u8>,
        #[serde(with = "serde_bytes")]
        raw_client_data: Vec<u8>,
        #[serde(with = "serde_bytes")]
        attestation_object: Vec<u8>,
    },
    /// An existing credential signed the challenge.
    Assertion {
        #[serde(with = "serde_bytes")]
        credential_id: Vec<u8>,
        #[serde(with = "serde_bytes")]
        raw_client_data: Vec<u8>,
        #[serde(with = "serde_bytes")]
        authenticator_data: Vec<u8>,
        #[serde(with = "serde_bytes")]
        signature: Vec<u8>,
        #[serde(default, with = "serde_bytes")]
        user_handle: Option<Vec<u8>>,
        /// Serialized client extension outputs, when the provider returns any.
        #[serde(default, with = "serde_bytes")]
        extensions: Option<Vec<u8>>,
    },
    /// The authenticator reported an error.
    ProviderError { message: String },
    /// The user dismissed the platform UI.
    Cancelled,
}

impl CeremonyOutcome {
    /// Short name used in logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Attestation { .. } => "attestation",
            Self::Assertion { .. } => "assertion",
            Self::ProviderError { .. } => "provider_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Serialize the event to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| Fido2Error::UnexpectedResponse(format!("CBOR encode failed: {e}")))?;
        Ok(bytes)
    }

    /// Deserialize an event delivered by the platform as CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| Fido2Error::UnexpectedResponse(format!("Undecodable completion: {e}")))
    }
}

/// Successful registration as returned to the caller.
///
/// `id` and `raw_id` carry the same encoded credential id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationResult {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
}

/// Successful authentication as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extensions: Option<String>,
}
