//! Common utility functions shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fido2_core::{encode, MockAuthenticator, SessionConfig};
use tracing::debug;
use uuid::Uuid;

use crate::{MockArgs, OutputFormat, RelyingPartyArgs};

/// Build the session configuration from the environment, then apply flags.
pub fn build_config(rp: &RelyingPartyArgs) -> SessionConfig {
    let mut config = SessionConfig::from_env();

    if let Some(icon) = &rp.icon {
        config.set_icon(icon);
    }

    let flags_given = rp.rp_id.is_some() || rp.rp_name.is_some() || rp.rp_icon.is_some();
    if flags_given {
        // A new id starts from scratch; otherwise flags patch the environment's relying party.
        let current = match rp.rp_id {
            Some(_) => None,
            None => config.relying_party().cloned(),
        };
        let id = rp
            .rp_id
            .clone()
            .or_else(|| current.as_ref().map(|c| c.id.clone()))
            .unwrap_or_default();
        let name = rp
            .rp_name
            .clone()
            .or_else(|| current.as_ref().map(|c| c.display_name.clone()))
            .unwrap_or_else(|| id.clone());
        let icon = rp
            .rp_icon
            .clone()
            .or_else(|| current.and_then(|c| c.icon));
        config.set_relying_party(&id, &name, icon.as_deref());
    }

    debug!(rp_id = ?config.rp_id(), "Session configuration ready");
    config
}

pub fn mock_authenticator(args: &MockArgs) -> Arc<MockAuthenticator> {
    let mock = match args.seed {
        Some(seed) => MockAuthenticator::new(seed),
        None => MockAuthenticator::default(),
    };
    Arc::new(mock.with_behavior(args.mock_behavior.to_mock()))
}

/// The caller's challenge, or a fresh random one.
pub fn challenge_or_random(challenge: Option<&str>) -> String {
    match challenge {
        Some(challenge) => challenge.to_string(),
        None => encode(Uuid::new_v4().as_bytes()),
    }
}

/// Render a JSON value in the requested format.
pub fn render_json(value: &serde_json::Value, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value),
        OutputFormat::Json => serde_json::to_string(value),
    };
    rendered.context("Failed to serialize result")
}

/// Print `value` to stdout, or write it to `output` when given.
///
/// Returns `true` when the value went to a file.
pub fn emit_json(
    value: &serde_json::Value,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<bool> {
    let rendered = render_json(value, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            debug!(path = %path.display(), "Result written");
            Ok(true)
        }
        None => {
            println!("{rendered}");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fido2_core::decode;

    #[test]
    fn test_random_challenge_is_sixteen_bytes() {
        let challenge = challenge_or_random(None);
        assert_eq!(decode(&challenge).unwrap().len(), 16);
        assert_ne!(challenge, challenge_or_random(None));
        assert_eq!(challenge_or_random(Some("YzE=")), "YzE=");
    }

    #[test]
    fn test_render_json_formats() {
        let value = serde_json::json!({ "id": "AQID" });
        assert_eq!(
            render_json(&value, OutputFormat::Json).unwrap(),
            r#"{"id":"AQID"}"#
        );
        assert!(render_json(&value, OutputFormat::Pretty)
            .unwrap()
            .contains('\n'));
    }

    #[test]
    fn test_flags_override_relying_party() {
        let args = RelyingPartyArgs {
            rp_id: Some("example.com".into()),
            rp_name: Some("Example".into()),
            rp_icon: None,
            icon: Some("icon.png".into()),
        };
        let config = build_config(&args);
        let rp = config.relying_party().unwrap();
        assert_eq!(rp.id, "example.com");
        assert_eq!(rp.display_name, "Example");
        assert_eq!(rp.icon.as_deref(), Some("icon.png"));
    }

    #[test]
    fn test_emit_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let value = serde_json::json!({ "id": "AQID" });
        assert!(emit_json(&value, OutputFormat::Json, Some(&path)).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"id\":\"AQID\"}\n"
        );
    }
}
