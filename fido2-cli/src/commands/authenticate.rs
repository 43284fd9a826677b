//! Authenticate command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use fido2_core::{AuthenticateOptions, Fido2Client, RequestBuilder};
use tracing::info;

use crate::utils::{build_config, challenge_or_random, emit_json, mock_authenticator};
use crate::AuthenticateArgs;

/// Execute the authenticate command.
pub async fn execute(args: AuthenticateArgs, quiet: bool) -> Result<()> {
    let mut config = build_config(&args.rp);
    if let Some(app_id) = &args.app_id {
        config.set_legacy_app_id(app_id);
    }

    let challenge = challenge_or_random(args.challenge.as_deref());
    let options = AuthenticateOptions {
        timeout: args.timeout,
        use_app_id: Some(args.use_app_id),
        user_verification: args.user_verification.clone(),
    };

    if args.output.dry_run {
        let request = RequestBuilder::new(&config)
            .assertion(&args.allow, &challenge, &options)
            .context("Invalid authentication request")?;
        if !quiet {
            eprintln!("{}", "[DRY RUN] Authentication request options:".cyan());
        }
        emit_json(
            &request.to_options_json(),
            args.output.format,
            args.output.output.as_deref(),
        )?;
        return Ok(());
    }

    let client = Fido2Client::with_config(config, mock_authenticator(&args.mock));
    let asserted = client
        .authenticate(&args.allow, &challenge, Some(&options))
        .await
        .context("Authentication failed")?;

    info!(credential_id = %asserted.id, "Challenge signed");

    let value = serde_json::to_value(&asserted).context("Failed to serialize result")?;
    let to_file = emit_json(&value, args.output.format, args.output.output.as_deref())?;

    if !quiet {
        eprintln!();
        eprintln!("{}", "Challenge signed".green().bold());
        eprintln!("   {} {}", "Credential id:".dimmed(), asserted.id);
        match &asserted.user_handle {
            Some(handle) => eprintln!("   {} {}", "User handle:".dimmed(), handle),
            None => eprintln!("   {} {}", "User handle:".dimmed(), "not returned".yellow()),
        }
        if let (true, Some(path)) = (to_file, &args.output.output) {
            eprintln!("   {} {}", "Result saved:".dimmed(), path.display());
        }
    }

    Ok(())
}
