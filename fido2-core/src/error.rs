use thiserror::Error;

use crate::session::CeremonyKind;

#[derive(Error, Debug)]
pub enum Fido2Error {
    #[error("Malformed encoding in {field}: {source}")]
    MalformedEncoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Configuration missing: {0} must be configured first")]
    ConfigurationMissing(&'static str),

    #[error("Please specify an RP ID before authenticating")]
    MissingRelyingParty,

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A {0} ceremony is already in progress")]
    CeremonyInProgress(CeremonyKind),

    #[error("{} was cancelled", .0.verb())]
    Cancelled(CeremonyKind),

    #[error("Authenticator error: {0}")]
    AuthenticatorError(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Provider submission failed: {0}")]
    SubmissionFailed(String),

    #[error("The provider abandoned the {0} ceremony without completing it")]
    Abandoned(CeremonyKind),
}

impl Fido2Error {
    /// Stable identifier surfaced to callers across the host boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEncoding { .. } => "E_MALFORMED_ENCODING",
            Self::ConfigurationMissing(_) | Self::MissingRelyingParty => "E_CONFIG_MISSING",
            Self::InvalidPolicy(_) => "E_INVALID_POLICY",
            Self::InvalidRequest(_) => "E_INVALID_REQUEST",
            Self::CeremonyInProgress(_) => "E_CEREMONY_IN_PROGRESS",
            Self::Cancelled(CeremonyKind::Registration) => "E_REGISTER_CANCELLED",
            Self::Cancelled(CeremonyKind::Authentication) => "E_SIGN_CANCELLED",
            Self::AuthenticatorError(_) => "E_AUTHENTICATOR_ERROR",
            Self::UnexpectedResponse(_) => "E_UNEXPECTED_RESPONSE",
            Self::SubmissionFailed(_) | Self::Abandoned(_) => "unknown",
        }
    }

    /// True for errors raised before anything was handed to the provider.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedEncoding { .. }
                | Self::ConfigurationMissing(_)
                | Self::MissingRelyingParty
                | Self::InvalidPolicy(_)
                | Self::InvalidRequest(_)
                | Self::CeremonyInProgress(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Fido2Error>;
