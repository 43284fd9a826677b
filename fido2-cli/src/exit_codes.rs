//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use fido2_core::Fido2Error;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (missing configuration, malformed input).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The authenticator answered with something that could not be decoded.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// No authenticator could take the ceremony.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Cancelled or busy; retrying may succeed.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TEMP_FAILURE: i32 = 75;

/// The authenticator reported an error.
/// Maps to EX_PROTOCOL from sysexits.h.
pub const PROTOCOL_ERROR: i32 = 76;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    /// Caller-facing error identifier, when the failure came from the ceremony core.
    pub error_code: Option<&'static str>,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify error by inspecting the chain
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<Fido2Error>() {
                return Self {
                    code: for_fido2_error(e),
                    error_code: Some(e.code()),
                    message: Some(message),
                };
            }
            if cause.downcast_ref::<hex::FromHexError>().is_some() {
                return Self::error(USAGE_ERROR, message);
            }
            if cause.downcast_ref::<std::io::Error>().is_some() {
                return Self::error(IO_ERROR, message);
            }
        }

        Self::error(GENERAL_ERROR, message)
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            error_code: None,
            message: Some(message.into()),
        }
    }
}

/// Exit code for a ceremony core error.
pub fn for_fido2_error(err: &Fido2Error) -> i32 {
    match err {
        Fido2Error::Cancelled(_) | Fido2Error::CeremonyInProgress(_) => TEMP_FAILURE,
        Fido2Error::UnexpectedResponse(_) => DATA_ERROR,
        Fido2Error::SubmissionFailed(_) | Fido2Error::Abandoned(_) => UNAVAILABLE,
        Fido2Error::AuthenticatorError(_) => PROTOCOL_ERROR,
        e if e.is_caller_error() => USAGE_ERROR,
        _ => GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use fido2_core::CeremonyKind;

    use super::*;

    #[test]
    fn test_core_errors_classified_through_context() {
        let err = Err::<(), _>(Fido2Error::Cancelled(CeremonyKind::Authentication))
            .context("Authentication failed")
            .unwrap_err();
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, TEMP_FAILURE);
        assert_eq!(exit.error_code, Some("E_SIGN_CANCELLED"));
        assert!(exit.message.unwrap().contains("Sign was cancelled"));
    }

    #[test]
    fn test_exit_code_per_category() {
        assert_eq!(for_fido2_error(&Fido2Error::MissingRelyingParty), USAGE_ERROR);
        assert_eq!(
            for_fido2_error(&Fido2Error::InvalidPolicy("negative".into())),
            USAGE_ERROR
        );
        assert_eq!(
            for_fido2_error(&Fido2Error::UnexpectedResponse("cbor".into())),
            DATA_ERROR
        );
        assert_eq!(
            for_fido2_error(&Fido2Error::SubmissionFailed("busy".into())),
            UNAVAILABLE
        );
        assert_eq!(
            for_fido2_error(&Fido2Error::AuthenticatorError("timeout".into())),
            PROTOCOL_ERROR
        );
        assert_eq!(
            for_fido2_error(&Fido2Error::CeremonyInProgress(CeremonyKind::Registration)),
            TEMP_FAILURE
        );
    }

    #[test]
    fn test_io_error_classified() {
        let err = anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ))
        .context("Failed to write output file");
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);
    }

    #[test]
    fn test_unclassified_error() {
        let err = anyhow::anyhow!("something else");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.error_code, None);
    }
}
