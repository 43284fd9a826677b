//! Mock authenticator for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ciborium::value::Value;
use sha3::{Digest, Sha3_256};
use tracing::{debug, instrument};

use super::{GatewayError, ProviderGateway};
use crate::encoding::encode;
use crate::outcome::CeremonyOutcome;
use crate::request::{AssertionRequest, CreationRequest, UserVerification};
use crate::session::CompletionSink;

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const FLAG_ATTESTED_DATA: u8 = 0x40;

/// Not valid CBOR: a lone break code.
const MALFORMED_PAYLOAD: &[u8] = &[0xff, 0x00, 0x13];

/// How the mock answers the next submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MockBehavior {
    /// Produce a credential or signature.
    #[default]
    Approve,
    /// Act as if the user dismissed the platform UI.
    Cancel,
    /// Report an authenticator error with the given message.
    ProviderError(String),
    /// Refuse to start the ceremony.
    RejectSubmission(String),
    /// Refuse to start because no authenticator is present.
    NoAuthenticator,
    /// Deliver a payload that does not decode.
    Malformed,
    /// Answer a registration with an assertion and vice versa.
    WrongCredential,
    /// Keep the completion handle until released or dropped by the test.
    Hold,
}

/// Deterministic in-process authenticator.
///
/// Completions are delivered from a task spawned with [`tokio::spawn`], so
/// submissions must be made from within a Tokio runtime. Held ceremonies are
/// the exception: they are delivered by whoever calls [`Self::release_held`].
///
/// WARNING: Do not use in production - credentials are derived from a fixed seed!
pub struct MockAuthenticator {
    seed: u64,
    behavior: Mutex<MockBehavior>,
    duplicate_delivery: bool,
    sign_count: AtomicU32,
    /// credential id -> user handle, for credentials this mock created
    credentials: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    creations: Mutex<Vec<CreationRequest>>,
    assertions: Mutex<Vec<AssertionRequest>>,
    held: Mutex<Vec<CompletionSink>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAuthenticator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            behavior: Mutex::new(MockBehavior::Approve),
            duplicate_delivery: false,
            sign_count: AtomicU32::new(0),
            credentials: Mutex::new(BTreeMap::new()),
            creations: Mutex::new(Vec::new()),
            assertions: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with default seed for simple tests.
    pub fn default_test() -> Self {
        Self::new(0xF1D0_2C0D_E5EE_D001)
    }

    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    /// Deliver every completion twice, the way a misbehaving platform layer might.
    pub fn with_duplicate_delivery(mut self) -> Self {
        self.duplicate_delivery = true;
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn behavior(&self) -> MockBehavior {
        lock(&self.behavior).clone()
    }

    /// Creation requests received so far, oldest first.
    pub fn creations(&self) -> Vec<CreationRequest> {
        lock(&self.creations).clone()
    }

    /// Assertion requests received so far, oldest first.
    pub fn assertions(&self) -> Vec<AssertionRequest> {
        lock(&self.assertions).clone()
    }

    pub fn last_creation(&self) -> Option<CreationRequest> {
        lock(&self.creations).last().cloned()
    }

    pub fn last_assertion(&self) -> Option<AssertionRequest> {
        lock(&self.assertions).last().cloned()
    }

    /// Number of ceremonies parked by [`MockBehavior::Hold`].
    pub fn held_count(&self) -> usize {
        lock(&self.held).len()
    }

    /// Hand the held completion handles to the caller, leaving none parked.
    pub fn take_held(&self) -> Vec<CompletionSink> {
        lock(&self.held).drain(..).collect()
    }

    /// Deliver `outcome` to every held ceremony. Returns how many were resolved.
    pub fn release_held(&self, outcome: CeremonyOutcome) -> usize {
        self.take_held()
            .iter()
            .filter(|sink| sink.deliver(outcome.clone()))
            .count()
    }

    /// Forget every held ceremony without delivering anything.
    pub fn drop_held(&self) {
        lock(&self.held).clear();
    }

    /// The credential id this mock assigns to a user of a relying party.
    pub fn credential_id_for(&self, rp_id: &str, user_handle: &[u8]) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(b"fido2-mock-credential");
        hasher.update(rp_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(user_handle);
        hasher.finalize().to_vec()
    }

    fn authenticator_data(&self, rp_id: &str, flags: u8, attested: Option<&[u8]>) -> Vec<u8> {
        let counter = self.sign_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut data = Sha3_256::digest(rp_id.as_bytes()).to_vec();
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        if let Some(credential_id) = attested {
            // zero AAGUID, then the length-prefixed credential id
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(credential_id);
        }
        data
    }

    fn sign(&self, authenticator_data: &[u8], client_data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(authenticator_data);
        hasher.update(Sha3_256::digest(client_data));
        hasher.finalize().to_vec()
    }

    fn attest(&self, request: &CreationRequest) -> CeremonyOutcome {
        let credential_id = self.credential_id_for(&request.rp.id, &request.user.handle);
        let raw_client_data = client_data("webauthn.create", &request.challenge, &request.rp.id);
        let flags = FLAG_USER_PRESENT | FLAG_ATTESTED_DATA | uv_flag(request.policy.user_verification);
        let auth_data = self.authenticator_data(&request.rp.id, flags, Some(credential_id.as_slice()));

        let attestation = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(Vec::new())),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]);
        let mut attestation_object = Vec::new();
        if let Err(e) = ciborium::into_writer(&attestation, &mut attestation_object) {
            return CeremonyOutcome::ProviderError {
                message: format!("Failed to encode attestation object: {e}"),
            };
        }

        lock(&self.credentials).insert(credential_id.clone(), request.user.handle.clone());

        CeremonyOutcome::Attestation {
            credential_id,
            raw_client_data,
            attestation_object,
        }
    }

    fn assert(&self, request: &AssertionRequest) -> CeremonyOutcome {
        let credentials = lock(&self.credentials);

        // First allowed credential, or any known one for an empty allow list.
        let chosen = if request.allow_list.is_empty() {
            credentials
                .iter()
                .next()
                .map(|(id, handle)| (id.clone(), Some(handle.clone())))
        } else {
            request
                .allow_list
                .iter()
                .find(|descriptor| credentials.contains_key(&descriptor.id))
                .or_else(|| request.allow_list.first())
                .map(|descriptor| {
                    (
                        descriptor.id.clone(),
                        credentials.get(&descriptor.id).cloned(),
                    )
                })
        };
        drop(credentials);

        let Some((credential_id, user_handle)) = chosen else {
            return CeremonyOutcome::ProviderError {
                message: "No credentials available on this authenticator".into(),
            };
        };

        let raw_client_data = client_data("webauthn.get", &request.challenge, &request.rp_id);
        let flags = FLAG_USER_PRESENT | uv_flag(request.policy.user_verification);
        let authenticator_data = self.authenticator_data(&request.rp_id, flags, None);
        let signature = self.sign(&authenticator_data, &raw_client_data);

        CeremonyOutcome::Assertion {
            credential_id,
            raw_client_data,
            authenticator_data,
            signature,
            user_handle,
            extensions: None,
        }
    }

    fn respond(&self, sink: CompletionSink, outcome: impl FnOnce() -> CeremonyOutcome) {
        let behavior = self.behavior();
        let outcome = match behavior {
            MockBehavior::Approve => outcome(),
            MockBehavior::Cancel => CeremonyOutcome::Cancelled,
            MockBehavior::ProviderError(message) => CeremonyOutcome::ProviderError { message },
            MockBehavior::WrongCredential => swap_kind(outcome()),
            MockBehavior::Malformed => {
                let duplicate = self.duplicate_delivery;
                tokio::spawn(async move {
                    sink.deliver_encoded(MALFORMED_PAYLOAD);
                    if duplicate {
                        sink.deliver_encoded(MALFORMED_PAYLOAD);
                    }
                });
                return;
            }
            MockBehavior::Hold => {
                debug!(ticket = %sink.ticket(), "Holding ceremony");
                lock(&self.held).push(sink);
                return;
            }
            MockBehavior::RejectSubmission(_) | MockBehavior::NoAuthenticator => return,
        };

        // Deliver from a separate task, like a platform UI callback.
        let duplicate = self.duplicate_delivery;
        tokio::spawn(async move {
            let first = sink.deliver(outcome.clone());
            if duplicate {
                let second = sink.deliver(outcome);
                debug!(first, second, "Delivered completion twice");
            }
        });
    }

    fn check_submission(&self) -> Result<(), GatewayError> {
        match self.behavior() {
            MockBehavior::RejectSubmission(reason) => Err(GatewayError::Rejected(reason)),
            MockBehavior::NoAuthenticator => Err(GatewayError::NoAuthenticator),
            _ => Ok(()),
        }
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::default_test()
    }
}

impl std::fmt::Debug for MockAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuthenticator")
            .field("behavior", &self.behavior())
            .field("duplicate_delivery", &self.duplicate_delivery)
            .field("credentials", &lock(&self.credentials).len())
            .field("held", &self.held_count())
            .finish()
    }
}

#[async_trait]
impl ProviderGateway for MockAuthenticator {
    #[instrument(level = "info", skip_all, fields(provider = "mock", ticket = %sink.ticket()))]
    async fn submit_creation(
        &self,
        request: CreationRequest,
        sink: CompletionSink,
    ) -> Result<(), GatewayError> {
        lock(&self.creations).push(request.clone());
        self.check_submission()?;
        self.respond(sink, || self.attest(&request));
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(provider = "mock", ticket = %sink.ticket()))]
    async fn submit_assertion(
        &self,
        request: AssertionRequest,
        sink: CompletionSink,
    ) -> Result<(), GatewayError> {
        lock(&self.assertions).push(request.clone());
        self.check_submission()?;
        self.respond(sink, || self.assert(&request));
        Ok(())
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

fn client_data(kind: &str, challenge: &[u8], rp_id: &str) -> Vec<u8> {
    serde_json::json!({
        "type": kind,
        "challenge": encode(challenge),
        "origin": format!("https://{rp_id}"),
    })
    .to_string()
    .into_bytes()
}

fn uv_flag(requirement: Option<UserVerification>) -> u8 {
    match requirement {
        Some(UserVerification::Required) => FLAG_USER_VERIFIED,
        _ => 0,
    }
}

fn swap_kind(outcome: CeremonyOutcome) -> CeremonyOutcome {
    match outcome {
        CeremonyOutcome::Attestation {
            credential_id,
            raw_client_data,
            attestation_object,
        } => CeremonyOutcome::Assertion {
            credential_id,
            raw_client_data,
            authenticator_data: attestation_object,
            signature: Vec::new(),
            user_handle: None,
            extensions: None,
        },
        CeremonyOutcome::Assertion {
            credential_id,
            raw_client_data,
            authenticator_data,
            ..
        } => CeremonyOutcome::Attestation {
            credential_id,
            raw_client_data,
            attestation_object: authenticator_data,
        },
        other => other,
    }
}
