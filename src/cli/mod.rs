//! CLI module for PMP Testgen Cache
//!
//! - `resolve`: resolve a specification through the cache, generating on a miss
//! - `fingerprint`: print the normalized text and fingerprint of a specification

pub mod fingerprint;
pub mod resolve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// PMP Testgen Cache - cached, multi-backend test case generation
#[derive(Parser)]
#[command(name = "pmp-testgen-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a specification to test cases
    Resolve(resolve::ResolveArgs),

    /// Print the fingerprint of a specification
    Fingerprint(fingerprint::FingerprintArgs),
}

/// Loads `.env` and configuration, then installs logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
