//! FIDO2 CLI - drive WebAuthn ceremonies from the command line.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use fido2_core::{MockBehavior, COSE_ES256};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (missing configuration, malformed base64, invalid policy)
  65  Unexpected response from the authenticator
  69  Authenticator unavailable or ceremony abandoned
  74  I/O error (cannot write output file)
  75  Ceremony cancelled or already in progress
  76  Authenticator reported an error";

#[derive(Parser)]
#[command(name = "fido2")]
#[command(author, version, about = "FIDO2 / WebAuthn ceremony harness", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress status messages (results are still printed)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging for the ceremony core
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new credential with the mock authenticator
    Register(RegisterArgs),

    /// Sign a challenge with an existing credential
    Authenticate(AuthenticateArgs),

    /// Encode bytes into the transport encoding (URL-safe base64)
    Encode {
        /// Text to encode (UTF-8, or hex with --hex)
        #[arg(value_name = "INPUT")]
        input: String,

        /// Treat INPUT as hex
        #[arg(long)]
        hex: bool,
    },

    /// Decode transport-encoded text
    Decode {
        /// URL-safe base64 text
        #[arg(value_name = "INPUT")]
        input: String,

        /// Print the decoded bytes as hex
        #[arg(long)]
        hex: bool,
    },
}

/// Relying party flags. Unset flags fall back to `FIDO2_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct RelyingPartyArgs {
    /// Relying party id (default: $FIDO2_RP_ID)
    #[arg(long, value_name = "ID")]
    pub rp_id: Option<String>,

    /// Relying party display name (default: the RP id)
    #[arg(long, value_name = "NAME")]
    pub rp_name: Option<String>,

    /// Relying party icon URL
    #[arg(long, value_name = "URL")]
    pub rp_icon: Option<String>,

    /// Default icon for relying parties configured without one
    #[arg(long, value_name = "URL")]
    pub icon: Option<String>,
}

/// Mock authenticator flags.
#[derive(Args, Debug, Clone)]
pub struct MockArgs {
    /// How the mock authenticator answers
    #[arg(long, value_enum, default_value_t = Behavior::Approve)]
    pub mock_behavior: Behavior,

    /// Seed for the mock authenticator's deterministic credentials
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

/// Output flags shared by the ceremony commands.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format for the result
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the request options that would be sent and exit
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub rp: RelyingPartyArgs,

    /// User handle (URL-safe base64)
    #[arg(long, value_name = "BASE64")]
    pub user_handle: String,

    /// User name
    #[arg(long, value_name = "NAME")]
    pub user_name: String,

    /// User display name (default: the user name)
    #[arg(long, value_name = "NAME")]
    pub user_display_name: Option<String>,

    /// User icon URL
    #[arg(long, value_name = "URL")]
    pub user_icon: Option<String>,

    /// Challenge (URL-safe base64; random when omitted)
    #[arg(long, value_name = "BASE64")]
    pub challenge: Option<String>,

    /// Key handle of an existing credential to exclude (repeatable)
    #[arg(long = "exclude", value_name = "BASE64")]
    pub exclude: Vec<String>,

    /// COSE algorithm identifier, in preference order (repeatable)
    #[arg(
        long = "alg",
        value_name = "COSE_ALG",
        default_values_t = [COSE_ES256],
        allow_negative_numbers = true
    )]
    pub algorithms: Vec<i32>,

    /// Ceremony timeout in seconds (0 or unset: 60)
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// Attestation preference: none, indirect or direct
    #[arg(long, value_name = "PREFERENCE")]
    pub attestation: Option<String>,

    /// Authenticator attachment: platform or cross-platform
    #[arg(long, value_name = "TYPE")]
    pub authenticator_type: Option<String>,

    /// User verification: required, preferred or discouraged
    #[arg(long, value_name = "REQUIREMENT")]
    pub user_verification: Option<String>,

    #[command(flatten)]
    pub mock: MockArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AuthenticateArgs {
    #[command(flatten)]
    pub rp: RelyingPartyArgs,

    /// Challenge (URL-safe base64; random when omitted)
    #[arg(long, value_name = "BASE64")]
    pub challenge: Option<String>,

    /// Key handle of a credential allowed to sign (repeatable)
    #[arg(long = "allow", value_name = "BASE64")]
    pub allow: Vec<String>,

    /// Ceremony timeout in seconds (0 or unset: 60)
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// User verification: required, preferred or discouraged
    #[arg(long, value_name = "REQUIREMENT")]
    pub user_verification: Option<String>,

    /// Legacy U2F app id (default: $FIDO2_APP_ID)
    #[arg(long, value_name = "URL")]
    pub app_id: Option<String>,

    /// Attach the app id extension to the request
    #[arg(long)]
    pub use_app_id: bool,

    #[command(flatten)]
    pub mock: MockArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Output format for ceremony results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    Pretty,
    /// Single-line JSON
    Json,
}

/// Mock authenticator behaviors selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Behavior {
    /// Create or sign normally
    Approve,
    /// User dismissed the platform UI
    Cancel,
    /// Authenticator reports an error
    Error,
    /// Platform refuses to start the ceremony
    Reject,
    /// No authenticator present
    NoAuthenticator,
    /// Authenticator returns an undecodable payload
    Malformed,
}

impl Behavior {
    pub fn to_mock(self) -> MockBehavior {
        match self {
            Self::Approve => MockBehavior::Approve,
            Self::Cancel => MockBehavior::Cancel,
            Self::Error => MockBehavior::ProviderError(
                "The operation either timed out or was not allowed.".into(),
            ),
            Self::Reject => MockBehavior::RejectSubmission("Platform is busy".into()),
            Self::NoAuthenticator => MockBehavior::NoAuthenticator,
            Self::Malformed => MockBehavior::Malformed,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fido2_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register(args) => commands::register::execute(args, cli.quiet).await,
        Commands::Authenticate(args) => commands::authenticate::execute(args, cli.quiet).await,
        Commands::Encode { input, hex } => commands::encode::encode(&input, hex),
        Commands::Decode { input, hex } => commands::encode::decode(&input, hex),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            match exit.error_code {
                Some(code) => eprintln!("{} [{}] {}", "Error:".red().bold(), code, message),
                None => eprintln!("{} {}", "Error:".red().bold(), message),
            }
        }
        process::exit(exit.code);
    }
}
