//! Turns a ceremony completion into the caller-visible result.

use tracing::warn;

use crate::encoding::encode;
use crate::error::{Fido2Error, Result};
use crate::outcome::{AssertionResult, CeremonyOutcome, CreationResult};
use crate::session::{CeremonyKind, Completion};

/// Map the completion of a registration ceremony.
pub fn map_creation(completion: Completion) -> Result<CreationResult> {
    match unwrap_outcome(CeremonyKind::Registration, completion)? {
        CeremonyOutcome::Attestation {
            credential_id,
            raw_client_data,
            attestation_object,
        } => {
            let id = encode(&credential_id);
            Ok(CreationResult {
                raw_id: id.clone(),
                id,
                client_data_json: encode(&raw_client_data),
                attestation_object: encode(&attestation_object),
            })
        }
        other => Err(unexpected(CeremonyKind::Registration, &other)),
    }
}

/// Map the completion of an authentication ceremony.
pub fn map_assertion(completion: Completion) -> Result<AssertionResult> {
    match unwrap_outcome(CeremonyKind::Authentication, completion)? {
        CeremonyOutcome::Assertion {
            credential_id,
            raw_client_data,
            authenticator_data,
            signature,
            user_handle,
            extensions,
        } => {
            let id = encode(&credential_id);
            Ok(AssertionResult {
                raw_id: id.clone(),
                id,
                client_data_json: encode(&raw_client_data),
                authenticator_data: encode(&authenticator_data),
                signature: encode(&signature),
                user_handle: user_handle.map(encode),
                extensions: extensions.map(encode),
            })
        }
        other => Err(unexpected(CeremonyKind::Authentication, &other)),
    }
}

/// Handle everything that is not a success credential.
fn unwrap_outcome(kind: CeremonyKind, completion: Completion) -> Result<CeremonyOutcome> {
    match completion {
        Completion::Outcome(CeremonyOutcome::Cancelled) => Err(Fido2Error::Cancelled(kind)),
        Completion::Outcome(CeremonyOutcome::ProviderError { message }) => {
            warn!(kind = %kind, error = %message, "Authenticator reported an error");
            Err(Fido2Error::AuthenticatorError(message))
        }
        Completion::Outcome(outcome) => Ok(outcome),
        Completion::Undecodable(reason) => Err(Fido2Error::UnexpectedResponse(reason)),
        Completion::SubmissionFailed(message) => Err(Fido2Error::SubmissionFailed(message)),
        Completion::Abandoned => Err(Fido2Error::Abandoned(kind)),
    }
}

fn unexpected(kind: CeremonyKind, outcome: &CeremonyOutcome) -> Fido2Error {
    warn!(kind = %kind, outcome = outcome.label(), "Provider returned the wrong credential type");
    Fido2Error::UnexpectedResponse(format!(
        "{} ceremony completed with {} credential",
        kind,
        outcome.label()
    ))
}
