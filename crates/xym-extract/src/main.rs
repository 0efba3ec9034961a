mod cli;
mod extract;
mod query;

use clap::Parser;
use eyre::WrapErr;
use serde::Serialize;

use cli::Command;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    let default_filter = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    match args.command {
        Command::Extract(extract_args) => {
            let report = extract::run(extract_args).await?;
            tracing::info!(
                blocks = report.stats.blocks,
                statement_groups = report.stats.statement_groups,
                receipts = report.stats.receipts,
                skipped = report.stats.statement_groups_skipped,
                accounts = report.accounts,
                "extraction finished"
            );
            Ok(())
        }
        Command::Balance(balance_args) => print_json(&query::balance(&balance_args)?),
        Command::Harvesters(graph_args) => print_json(&query::harvesters(&graph_args)?),
        Command::Bubbles(bubble_args) => print_json(&query::bubbles(&bubble_args)?),
    }
}

fn print_json(value: &impl Serialize) -> eyre::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}
