//! Platform authenticator providers.
//!
//! The core never talks to a platform SDK directly. A provider implements
//! [`ProviderGateway`]: it accepts a fully built request together with a
//! [`CompletionSink`], starts the platform ceremony, and returns. The outcome
//! arrives later through the sink, typically from the platform's UI or event
//! thread.
//!
//! - **Mock** - deterministic in-process authenticator for tests and tooling

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockAuthenticator, MockBehavior};

use async_trait::async_trait;
use thiserror::Error;

use crate::request::{AssertionRequest, CreationRequest};
use crate::session::CompletionSink;

/// Reasons a provider could not even begin a ceremony.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("No compatible authenticator available")]
    NoAuthenticator,

    #[error("Platform rejected the request: {0}")]
    Rejected(String),

    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

/// Capability interface to a platform authenticator.
///
/// Implementations must be thread-safe (`Send + Sync`).
///
/// Returning `Ok` means the ceremony was handed to the platform; the provider
/// then owes exactly one delivery on `sink` (extra deliveries are ignored,
/// and dropping every clone of the sink resolves the ceremony as abandoned).
/// Returning `Err` means nothing was started and no delivery will follow.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Start a registration ceremony.
    async fn submit_creation(
        &self,
        request: CreationRequest,
        sink: CompletionSink,
    ) -> Result<(), GatewayError>;

    /// Start an authentication ceremony.
    async fn submit_assertion(
        &self,
        request: AssertionRequest,
        sink: CompletionSink,
    ) -> Result<(), GatewayError>;

    /// Identifier used in logs.
    fn provider_id(&self) -> &str;
}
