//! Example demonstrating ceremony tracing instrumentation.
//!
//! Run with: cargo run -p fido2-core --example mock_ceremony

use std::sync::Arc;

use fido2_core::{encode, AlgorithmInput, Fido2Client, MockAuthenticator, COSE_ES256};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("fido2_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== FIDO2 Mock Ceremony Demo ===\n");

    let mock = Arc::new(MockAuthenticator::default());
    let client = Fido2Client::new(mock);

    client.configure_relying_party("example.com", "Example", None);
    if let Err(e) = client.configure_user(&encode(b"user-1"), "alice", None, "Alice") {
        eprintln!("Failed to configure user: {}", e);
        return;
    }

    println!("Registering...\n");

    let created = match client
        .register(
            &[],
            &encode(b"registration challenge"),
            &[AlgorithmInput::public_key(COSE_ES256)],
            None,
        )
        .await
    {
        Ok(created) => created,
        Err(e) => {
            println!("\n❌ Registration failed [{}]: {}", e.code(), e);
            return;
        }
    };

    println!("\n✅ Registered");
    println!("   Credential: {}", created.id);

    println!("\nAuthenticating...\n");

    match client
        .authenticate(&[created.id.clone()], &encode(b"login challenge"), None)
        .await
    {
        Ok(asserted) => {
            println!("\n✅ Authenticated");
            println!("   Credential:  {}", asserted.id);
            println!("   User handle: {:?}", asserted.user_handle);
            match fido2_core::decode(&asserted.signature) {
                Ok(signature) => println!("   Signature:   {}", hex::encode(signature)),
                Err(e) => println!("   Signature:   <{}>", e),
            }
        }
        Err(e) => {
            println!("\n❌ Authentication failed [{}]: {}", e.code(), e);
        }
    }
}
