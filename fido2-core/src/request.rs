//! Ceremony request model and the builder that assembles it.
//!
//! Caller input arrives loosely typed (base64 strings, free-form policy
//! strings, optional numbers). [`RequestBuilder`] validates it against the
//! current [`SessionConfig`] and produces a [`CreationRequest`] or an
//! [`AssertionRequest`] that is handed to the provider as-is.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::SessionConfig;
use crate::encoding::{self, decode_field};
use crate::error::{Fido2Error, Result};

/// Timeout applied when the caller gives none (or zero).
pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;

/// COSE algorithm identifier for ECDSA w/ SHA-256.
pub const COSE_ES256: i32 = -7;
/// COSE algorithm identifier for EdDSA.
pub const COSE_EDDSA: i32 = -8;
/// COSE algorithm identifier for RSASSA-PKCS1-v1_5 w/ SHA-256.
pub const COSE_RS256: i32 = -257;

/// Relying party identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// User account the credential is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(rename = "id", with = "encoding::transport")]
    pub handle: Vec<u8>,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    #[default]
    #[serde(rename = "public-key")]
    PublicKey,
}

impl CredentialType {
    /// Resolve a caller-supplied type string.
    ///
    /// Only `public-key` exists today. Unknown strings resolve to it instead
    /// of failing so that callers sending newer type names keep working.
    pub fn from_caller(value: Option<&str>) -> Self {
        match value {
            None | Some("public-key") => Self::PublicKey,
            Some(other) => {
                debug!(credential_type = other, "Unknown credential type, using public-key");
                Self::PublicKey
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicKey => "public-key",
        }
    }
}

/// Reference to a previously registered credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    #[serde(with = "encoding::transport")]
    pub id: Vec<u8>,
    #[serde(rename = "transports", skip_serializing_if = "Option::is_none")]
    pub transport_hints: Option<BTreeSet<String>>,
}

impl KeyDescriptor {
    pub fn public_key(id: Vec<u8>) -> Self {
        Self {
            credential_type: CredentialType::PublicKey,
            id,
            transport_hints: None,
        }
    }

    pub fn with_transports<I, S>(mut self, transports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport_hints = Some(transports.into_iter().map(Into::into).collect());
        self
    }
}

/// One entry of the ranked algorithm preference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmParameter {
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    #[serde(rename = "alg")]
    pub algorithm: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    #[default]
    None,
    Indirect,
    Direct,
}

impl AttestationPreference {
    /// Case-insensitive; empty or unrecognized input means `None`.
    pub fn from_caller(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("direct") => Self::Direct,
            Some("indirect") => Self::Indirect,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatorAttachment {
    #[serde(rename = "platform")]
    Platform,
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

impl AuthenticatorAttachment {
    /// Case-insensitive. Anything unrecognized yields no constraint at all.
    pub fn from_caller(value: Option<&str>) -> Option<Self> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("platform") => Some(Self::Platform),
            Some("crossplatform" | "cross-platform") => Some(Self::CrossPlatform),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

impl UserVerification {
    pub fn from_caller(value: Option<&str>) -> Option<Self> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("required") => Some(Self::Required),
            Some("preferred") => Some(Self::Preferred),
            Some("discouraged") => Some(Self::Discouraged),
            _ => None,
        }
    }
}

/// Policy attached to every ceremony request.
///
/// `timeout_seconds` is advisory; enforcing it is up to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CeremonyPolicy {
    pub timeout_seconds: f64,
    pub attestation: AttestationPreference,
    pub attachment: Option<AuthenticatorAttachment>,
    pub user_verification: Option<UserVerification>,
}

impl Default for CeremonyPolicy {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            attestation: AttestationPreference::None,
            attachment: None,
            user_verification: None,
        }
    }
}

impl CeremonyPolicy {
    fn timeout_millis(&self) -> u64 {
        (self.timeout_seconds * 1000.0).round() as u64
    }
}

/// Registration request handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRequest {
    pub rp: RelyingPartyConfig,
    pub user: UserConfig,
    pub challenge: Vec<u8>,
    pub exclude_list: Vec<KeyDescriptor>,
    pub algorithms: Vec<AlgorithmParameter>,
    pub policy: CeremonyPolicy,
}

impl CreationRequest {
    /// Render as a WebAuthn `PublicKeyCredentialCreationOptions` object.
    pub fn to_options_json(&self) -> serde_json::Value {
        let mut options = json!({
            "rp": self.rp,
            "user": self.user,
            "challenge": encoding::encode(&self.challenge),
            "pubKeyCredParams": self.algorithms,
            "timeout": self.policy.timeout_millis(),
            "excludeCredentials": self.exclude_list,
            "attestation": self.policy.attestation,
        });

        let mut selection = serde_json::Map::new();
        if let Some(attachment) = self.policy.attachment {
            selection.insert("authenticatorAttachment".into(), json!(attachment));
        }
        if let Some(uv) = self.policy.user_verification {
            selection.insert("userVerification".into(), json!(uv));
        }
        if !selection.is_empty() {
            options["authenticatorSelection"] = serde_json::Value::Object(selection);
        }
        options
    }
}

/// Authentication request handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionRequest {
    pub rp_id: String,
    pub challenge: Vec<u8>,
    pub allow_list: Vec<KeyDescriptor>,
    pub policy: CeremonyPolicy,
    /// Legacy U2F application id, attached as the `appid` extension.
    pub app_id_fallback: Option<String>,
}

impl AssertionRequest {
    /// Render as a WebAuthn `PublicKeyCredentialRequestOptions` object.
    pub fn to_options_json(&self) -> serde_json::Value {
        let mut options = json!({
            "rpId": self.rp_id,
            "challenge": encoding::encode(&self.challenge),
            "allowCredentials": self.allow_list,
            "timeout": self.policy.timeout_millis(),
        });
        if let Some(uv) = self.policy.user_verification {
            options["userVerification"] = json!(uv);
        }
        if let Some(app_id) = &self.app_id_fallback {
            options["extensions"] = json!({ "appid": app_id });
        }
        options
    }
}

/// Caller-supplied algorithm entry, e.g. `{"type": "public-key", "alg": -7}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlgorithmInput {
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    pub alg: i32,
}

impl AlgorithmInput {
    pub fn public_key(alg: i32) -> Self {
        Self {
            credential_type: Some(CredentialType::PublicKey.as_str().to_string()),
            alg,
        }
    }
}

/// Optional registration policy as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOptions {
    pub timeout: Option<f64>,
    pub attestation_preference: Option<String>,
    pub authenticator_type: Option<String>,
    pub user_verification: Option<String>,
}

/// Optional authentication policy as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateOptions {
    pub timeout: Option<f64>,
    /// Opt in to the legacy app id extension.
    #[serde(rename = "appId")]
    pub use_app_id: Option<bool>,
    pub user_verification: Option<String>,
}

/// Validates caller input against a session configuration.
pub struct RequestBuilder<'a> {
    config: &'a SessionConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Assemble a registration request.
    pub fn creation(
        &self,
        existing_key_handles: &[String],
        challenge: &str,
        algorithms: &[AlgorithmInput],
        options: &RegisterOptions,
    ) -> Result<CreationRequest> {
        let rp = self
            .config
            .relying_party()
            .filter(|rp| !rp.id.is_empty())
            .ok_or(Fido2Error::ConfigurationMissing("relying party"))?;
        let user = self
            .config
            .user()
            .ok_or(Fido2Error::ConfigurationMissing("user"))?;

        let policy = CeremonyPolicy {
            timeout_seconds: resolve_timeout(options.timeout)?,
            attestation: AttestationPreference::from_caller(
                options.attestation_preference.as_deref(),
            ),
            attachment: AuthenticatorAttachment::from_caller(options.authenticator_type.as_deref()),
            user_verification: UserVerification::from_caller(options.user_verification.as_deref()),
        };

        let challenge = decode_challenge(challenge)?;
        let exclude_list = key_descriptors("exclude list key handle", existing_key_handles)?;

        if algorithms.is_empty() {
            return Err(Fido2Error::InvalidRequest(
                "at least one algorithm parameter is required".into(),
            ));
        }
        let algorithms = algorithms
            .iter()
            .map(|input| AlgorithmParameter {
                credential_type: CredentialType::from_caller(input.credential_type.as_deref()),
                algorithm: input.alg,
            })
            .collect();

        debug!(
            rp_id = %rp.id,
            exclude_count = exclude_list.len(),
            timeout_secs = policy.timeout_seconds,
            "Built creation request"
        );

        Ok(CreationRequest {
            rp: rp.clone(),
            user: user.clone(),
            challenge,
            exclude_list,
            algorithms,
            policy,
        })
    }

    /// Assemble an authentication request.
    pub fn assertion(
        &self,
        allowed_key_handles: &[String],
        challenge: &str,
        options: &AuthenticateOptions,
    ) -> Result<AssertionRequest> {
        let rp_id = self.config.rp_id().ok_or(Fido2Error::MissingRelyingParty)?;

        let policy = CeremonyPolicy {
            timeout_seconds: resolve_timeout(options.timeout)?,
            user_verification: UserVerification::from_caller(options.user_verification.as_deref()),
            ..CeremonyPolicy::default()
        };

        let challenge = decode_challenge(challenge)?;
        let allow_list = key_descriptors("allow list key handle", allowed_key_handles)?;

        let app_id_fallback = match (self.config.legacy_app_id(), options.use_app_id) {
            (Some(app_id), Some(true)) => Some(app_id.to_string()),
            _ => None,
        };

        debug!(
            rp_id = rp_id,
            allow_count = allow_list.len(),
            app_id_fallback = app_id_fallback.is_some(),
            "Built assertion request"
        );

        Ok(AssertionRequest {
            rp_id: rp_id.to_string(),
            challenge,
            allow_list,
            policy,
            app_id_fallback,
        })
    }
}

fn resolve_timeout(timeout: Option<f64>) -> Result<f64> {
    match timeout {
        None => Ok(DEFAULT_TIMEOUT_SECS),
        Some(t) if t == 0.0 => Ok(DEFAULT_TIMEOUT_SECS),
        Some(t) if !t.is_finite() => Err(Fido2Error::InvalidPolicy(format!(
            "timeout must be a finite number of seconds, got {t}"
        ))),
        Some(t) if t < 0.0 => Err(Fido2Error::InvalidPolicy(format!(
            "timeout must be positive, got {t}"
        ))),
        Some(t) => Ok(t),
    }
}

fn decode_challenge(challenge: &str) -> Result<Vec<u8>> {
    let bytes = decode_field("challenge", challenge)?;
    if bytes.is_empty() {
        return Err(Fido2Error::InvalidRequest("challenge must not be empty".into()));
    }
    Ok(bytes)
}

fn key_descriptors(field: &'static str, handles: &[String]) -> Result<Vec<KeyDescriptor>> {
    handles
        .iter()
        .map(|handle| decode_field(field, handle).map(KeyDescriptor::public_key))
        .collect()
}
