//! Encode and decode command implementations.

use anyhow::{Context, Result};

/// Execute the encode command.
pub fn encode(input: &str, is_hex: bool) -> Result<()> {
    let bytes = if is_hex {
        hex::decode(input.trim()).context("Invalid hex input")?
    } else {
        input.as_bytes().to_vec()
    };
    println!("{}", fido2_core::encode(bytes));
    Ok(())
}

/// Execute the decode command.
pub fn decode(input: &str, as_hex: bool) -> Result<()> {
    let bytes = fido2_core::decode(input.trim()).context("Invalid transport encoding")?;
    if as_hex {
        println!("{}", hex::encode(bytes));
    } else {
        let text = String::from_utf8(bytes)
            .context("Decoded bytes are not UTF-8 (use --hex to print them)")?;
        println!("{text}");
    }
    Ok(())
}
