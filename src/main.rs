use clap::Parser;
use pmp_testgen_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve(args) => cli::resolve::run(args).await,
        Command::Fingerprint(args) => cli::fingerprint::run(args),
    }
}
