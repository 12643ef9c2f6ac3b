//! Fingerprint command - prints the exact-match key of a specification

use clap::Args;
use serde_json::json;

use crate::domain::FingerprintComputer;

/// Arguments for the fingerprint command
#[derive(Args, Clone, Debug)]
pub struct FingerprintArgs {
    /// Specification text
    #[arg(long)]
    pub spec: String,
}

/// Run the fingerprint command
pub fn run(args: FingerprintArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let request = FingerprintComputer::new(config.fingerprint).request(&args.spec)?;

    let output = json!({
        "normalized": request.normalized(),
        "fingerprint": request.fingerprint().to_hex(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
