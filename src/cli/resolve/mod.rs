//! Resolve command - runs specifications through the cache orchestrator

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::domain::AggregatedResult;

/// Arguments for the resolve command
#[derive(Args, Clone, Debug)]
#[command(group = clap::ArgGroup::new("input").required(true).args(["spec", "file"]))]
pub struct ResolveArgs {
    /// Specification text
    #[arg(long)]
    pub spec: Option<String>,

    /// Read the specification from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Resolve the same specification this many times
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl ResolveArgs {
    fn specification(&self) -> anyhow::Result<String> {
        match (&self.spec, &self.file) {
            (Some(spec), _) => Ok(spec.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read specification from {}", path.display())),
            (None, None) => anyhow::bail!("Either --spec or --file is required"),
        }
    }
}

/// Run the resolve command, printing one JSON result per line
pub async fn run(args: ResolveArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let specification = args.specification()?;

    let orchestrator = crate::create_orchestrator_with_config(&config).await?;

    for round in 1..=args.repeat.max(1) {
        let result = orchestrator.resolve(&specification).await?;

        info!(
            round,
            source = %result.source,
            items = result.items.len(),
            failed_backends = result.errors.len(),
            "Resolved specification"
        );

        println!("{}", render(&result, args.pretty)?);
    }

    Ok(())
}

fn render(result: &AggregatedResult, pretty: bool) -> anyhow::Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(rendered)
}
