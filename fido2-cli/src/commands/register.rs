//! Register command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use fido2_core::{AlgorithmInput, Fido2Client, RegisterOptions, RequestBuilder};
use tracing::{info, warn};

use crate::utils::{build_config, challenge_or_random, emit_json, mock_authenticator};
use crate::{Behavior, RegisterArgs};

/// Execute the register command.
pub async fn execute(args: RegisterArgs, quiet: bool) -> Result<()> {
    let mut config = build_config(&args.rp);
    let display_name = args
        .user_display_name
        .clone()
        .unwrap_or_else(|| args.user_name.clone());
    config
        .set_user(
            &args.user_handle,
            &args.user_name,
            args.user_icon.as_deref(),
            &display_name,
        )
        .context("Invalid user")?;

    let challenge = challenge_or_random(args.challenge.as_deref());
    let algorithms: Vec<AlgorithmInput> = args
        .algorithms
        .iter()
        .copied()
        .map(AlgorithmInput::public_key)
        .collect();
    let options = RegisterOptions {
        timeout: args.timeout,
        attestation_preference: args.attestation.clone(),
        authenticator_type: args.authenticator_type.clone(),
        user_verification: args.user_verification.clone(),
    };

    if args.output.dry_run {
        let request = RequestBuilder::new(&config)
            .creation(&args.exclude, &challenge, &algorithms, &options)
            .context("Invalid registration request")?;
        if !quiet {
            eprintln!("{}", "[DRY RUN] Registration request options:".cyan());
        }
        emit_json(
            &request.to_options_json(),
            args.output.format,
            args.output.output.as_deref(),
        )?;
        return Ok(());
    }

    if args.mock.mock_behavior != Behavior::Approve {
        warn!(behavior = ?args.mock.mock_behavior, "Mock authenticator will not approve");
    }

    let client = Fido2Client::with_config(config, mock_authenticator(&args.mock));
    let created = client
        .register(&args.exclude, &challenge, &algorithms, Some(&options))
        .await
        .context("Registration failed")?;

    info!(credential_id = %created.id, "Credential created");

    let value = serde_json::to_value(&created).context("Failed to serialize result")?;
    let to_file = emit_json(&value, args.output.format, args.output.output.as_deref())?;

    if !quiet {
        eprintln!();
        eprintln!("{}", "Credential registered".green().bold());
        eprintln!("   {} {}", "Credential id:".dimmed(), created.id);
        eprintln!("   {} {}", "Provider:".dimmed(), client.provider_id());
        if let (true, Some(path)) = (to_file, &args.output.output) {
            eprintln!("   {} {}", "Result saved:".dimmed(), path.display());
        }
    }

    Ok(())
}
