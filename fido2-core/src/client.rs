//! Caller-facing FIDO2 client.
//!
//! [`Fido2Client`] owns the session configuration, the per-kind completion
//! slots and a provider gateway. Configuration calls are synchronous; the
//! two ceremonies are async and resolve once the provider delivers its
//! completion.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::gateway::ProviderGateway;
use crate::mapper::{map_assertion, map_creation};
use crate::outcome::{AssertionResult, CreationResult};
use crate::request::{AlgorithmInput, AuthenticateOptions, RegisterOptions, RequestBuilder};
use crate::session::{CeremonyKind, CeremonySession};

pub struct Fido2Client {
    config: RwLock<SessionConfig>,
    session: Arc<CeremonySession>,
    gateway: Arc<dyn ProviderGateway>,
}

impl Fido2Client {
    pub fn new(gateway: Arc<dyn ProviderGateway>) -> Self {
        Self::with_config(SessionConfig::default(), gateway)
    }

    pub fn with_config(config: SessionConfig, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self {
            config: RwLock::new(config),
            session: CeremonySession::new(),
            gateway,
        }
    }

    fn build<T>(&self, f: impl FnOnce(&RequestBuilder<'_>) -> Result<T>) -> Result<T> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        let builder = RequestBuilder::new(&config);
        f(&builder)
    }

    fn update<T>(&self, f: impl FnOnce(&mut SessionConfig) -> T) -> T {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config)
    }

    /// Copy of the current configuration.
    pub fn config_snapshot(&self) -> SessionConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store the default icon used by relying parties configured without one.
    pub fn configure_icon(&self, icon: &str) -> String {
        self.update(|config| config.set_icon(icon));
        icon.to_string()
    }

    pub fn configure_relying_party(&self, id: &str, display_name: &str, icon: Option<&str>) -> String {
        self.update(|config| config.set_relying_party(id, display_name, icon));
        id.to_string()
    }

    pub fn configure_legacy_app_id(&self, url: &str) -> String {
        self.update(|config| config.set_legacy_app_id(url));
        url.to_string()
    }

    /// Store the user for future registrations.
    ///
    /// Fails with [`crate::Fido2Error::MalformedEncoding`] when `handle` does
    /// not decode; the previous user is kept in that case.
    pub fn configure_user(
        &self,
        handle: &str,
        name: &str,
        icon: Option<&str>,
        display_name: &str,
    ) -> Result<bool> {
        self.update(|config| config.set_user(handle, name, icon, display_name))?;
        Ok(true)
    }

    /// Whether a ceremony of `kind` is waiting for its provider.
    pub fn is_pending(&self, kind: CeremonyKind) -> bool {
        self.session.is_pending(kind)
    }

    pub fn provider_id(&self) -> &str {
        self.gateway.provider_id()
    }

    /// Run a registration ceremony.
    #[instrument(
        level = "info",
        skip_all,
        fields(provider = %self.gateway.provider_id(), exclude_count = existing_key_handles.len())
    )]
    pub async fn register(
        &self,
        existing_key_handles: &[String],
        challenge: &str,
        algorithms: &[AlgorithmInput],
        options: Option<&RegisterOptions>,
    ) -> Result<CreationResult> {
        let defaults = RegisterOptions::default();
        let options = options.unwrap_or(&defaults);
        let request = self.build(|builder| {
            builder.creation(existing_key_handles, challenge, algorithms, options)
        })?;

        let (sink, pending) = self.session.begin(CeremonyKind::Registration)?;
        let ticket = pending.ticket();
        info!(ticket = %ticket, rp_id = %request.rp.id, "Submitting registration");

        if let Err(e) = self.gateway.submit_creation(request, sink.clone()).await {
            warn!(ticket = %ticket, error = %e, "Provider refused registration");
            sink.fail_submission(e.to_string());
        }
        drop(sink);

        let result = map_creation(pending.wait().await);
        match &result {
            Ok(created) => info!(ticket = %ticket, credential_id = %created.id, "Registration complete"),
            Err(e) => info!(ticket = %ticket, code = e.code(), "Registration failed"),
        }
        result
    }

    /// Run an authentication ceremony.
    #[instrument(
        level = "info",
        skip_all,
        fields(provider = %self.gateway.provider_id(), allow_count = allowed_key_handles.len())
    )]
    pub async fn authenticate(
        &self,
        allowed_key_handles: &[String],
        challenge: &str,
        options: Option<&AuthenticateOptions>,
    ) -> Result<AssertionResult> {
        let defaults = AuthenticateOptions::default();
        let options = options.unwrap_or(&defaults);
        let request =
            self.build(|builder| builder.assertion(allowed_key_handles, challenge, options))?;

        let (sink, pending) = self.session.begin(CeremonyKind::Authentication)?;
        let ticket = pending.ticket();
        info!(ticket = %ticket, rp_id = %request.rp_id, "Submitting authentication");

        if let Err(e) = self.gateway.submit_assertion(request, sink.clone()).await {
            warn!(ticket = %ticket, error = %e, "Provider refused authentication");
            sink.fail_submission(e.to_string());
        }
        drop(sink);

        let result = map_assertion(pending.wait().await);
        match &result {
            Ok(asserted) => info!(ticket = %ticket, credential_id = %asserted.id, "Authentication complete"),
            Err(e) => info!(ticket = %ticket, code = e.code(), "Authentication failed"),
        }
        result
    }
}

impl std::fmt::Debug for Fido2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fido2Client")
            .field("provider", &self.gateway.provider_id())
            .field("session", &self.session)
            .finish()
    }
}
