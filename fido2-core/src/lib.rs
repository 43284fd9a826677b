//! FIDO2 Core - WebAuthn ceremony orchestration
//!
//! This crate sits between an application that wants to register or use a
//! FIDO2 credential and a platform authenticator that performs the actual
//! ceremony.
//!
//! # Features
//!
//! - Strict URL-safe base64 transport encoding for every binary field
//! - Validated creation and assertion requests built from one [`SessionConfig`]
//! - One outstanding ceremony per kind, resolved exactly once
//! - Provider-agnostic [`ProviderGateway`] capability interface
//! - Structured results and stable error codes for the calling layer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fido2_core::{encode, AlgorithmInput, Fido2Client, MockAuthenticator};
//!
//! # async fn example() -> fido2_core::Result<()> {
//! // Use the mock authenticator for testing (in production, plug in a platform provider)
//! let client = Fido2Client::new(Arc::new(MockAuthenticator::default()));
//!
//! client.configure_relying_party("example.com", "Example", None);
//! client.configure_user(&encode(b"user-1"), "alice", None, "Alice")?;
//!
//! let created = client
//!     .register(&[], &encode(b"server challenge"), &[AlgorithmInput::public_key(-7)], None)
//!     .await?;
//!
//! let asserted = client
//!     .authenticate(&[created.id.clone()], &encode(b"second challenge"), None)
//!     .await?;
//! assert_eq!(asserted.id, created.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod gateway;
pub mod mapper;
pub mod outcome;
pub mod request;
pub mod session;

// Re-export main types for convenience
pub use client::Fido2Client;
pub use config::SessionConfig;
pub use encoding::{decode, encode};
pub use error::{Fido2Error, Result};
pub use gateway::{GatewayError, ProviderGateway};
pub use outcome::{AssertionResult, CeremonyOutcome, CreationResult};
pub use request::{
    AlgorithmInput, AssertionRequest, AttestationPreference, AuthenticateOptions,
    AuthenticatorAttachment, CeremonyPolicy, CreationRequest, RegisterOptions, RequestBuilder,
    UserVerification, COSE_EDDSA, COSE_ES256, COSE_RS256, DEFAULT_TIMEOUT_SECS,
};
pub use session::{CeremonyKind, CeremonySession, CeremonyTicket, Completion, CompletionSink};

#[cfg(feature = "mock")]
pub use gateway::{MockAuthenticator, MockBehavior};
