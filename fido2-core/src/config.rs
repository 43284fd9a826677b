//! Session configuration
//!
//! Relying party, user and legacy app id live in one explicit value that is
//! handed to the request builder by reference. Each setter replaces the
//! previous value outright; nothing is merged or kept as history.

use tracing::{debug, info};

use crate::encoding::decode_field;
use crate::error::{Fido2Error, Result};
use crate::request::{RelyingPartyConfig, UserConfig};

/// Mutable per-process ceremony configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    default_icon: Option<String>,
    relying_party: Option<RelyingPartyConfig>,
    user: Option<UserConfig>,
    legacy_app_id: Option<String>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FIDO2_APP_ICON` - default icon for relying parties configured without one
    /// - `FIDO2_RP_ID` - relying party id (the relying party is only set when non-empty)
    /// - `FIDO2_RP_NAME` - relying party display name (default: the RP id)
    /// - `FIDO2_RP_ICON` - relying party icon
    /// - `FIDO2_APP_ID` - legacy U2F app id
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(icon) = non_empty("FIDO2_APP_ICON") {
            config.set_icon(&icon);
        }

        if let Some(rp_id) = non_empty("FIDO2_RP_ID") {
            let name = non_empty("FIDO2_RP_NAME").unwrap_or_else(|| rp_id.clone());
            let icon = non_empty("FIDO2_RP_ICON");
            config.set_relying_party(&rp_id, &name, icon.as_deref());
            info!(rp_id = %rp_id, "Loaded relying party from environment");
        }

        if let Some(app_id) = non_empty("FIDO2_APP_ID") {
            config.set_legacy_app_id(&app_id);
        }

        config
    }

    pub fn set_icon(&mut self, icon: &str) {
        self.default_icon = Some(icon.to_string());
    }

    /// Replace the relying party. An empty or absent icon falls back to the
    /// default icon.
    pub fn set_relying_party(&mut self, id: &str, display_name: &str, icon: Option<&str>) {
        let icon = icon
            .filter(|icon| !icon.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_icon.clone());
        debug!(rp_id = id, has_icon = icon.is_some(), "Relying party configured");
        self.relying_party = Some(RelyingPartyConfig {
            id: id.to_string(),
            display_name: display_name.to_string(),
            icon,
        });
    }

    pub fn set_legacy_app_id(&mut self, url: &str) {
        self.legacy_app_id = Some(url.to_string());
    }

    /// Replace the user. `handle` arrives in the transport encoding and must
    /// decode to a non-empty byte string.
    pub fn set_user(
        &mut self,
        handle: &str,
        name: &str,
        icon: Option<&str>,
        display_name: &str,
    ) -> Result<()> {
        let handle = decode_field("user.handle", handle)?;
        if handle.is_empty() {
            return Err(Fido2Error::InvalidRequest(
                "user handle must not be empty".into(),
            ));
        }
        self.user = Some(UserConfig {
            handle,
            name: name.to_string(),
            display_name: display_name.to_string(),
            icon: icon.filter(|icon| !icon.is_empty()).map(str::to_string),
        });
        debug!(user = name, "User configured");
        Ok(())
    }

    pub fn default_icon(&self) -> Option<&str> {
        self.default_icon.as_deref()
    }

    pub fn relying_party(&self) -> Option<&RelyingPartyConfig> {
        self.relying_party.as_ref()
    }

    /// The configured relying party id, treating an empty id as unset.
    pub fn rp_id(&self) -> Option<&str> {
        self.relying_party
            .as_ref()
            .map(|rp| rp.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn user(&self) -> Option<&UserConfig> {
        self.user.as_ref()
    }

    /// The legacy app id, treating an empty value as unset.
    pub fn legacy_app_id(&self) -> Option<&str> {
        self.legacy_app_id.as_deref().filter(|id| !id.is_empty())
    }
}
