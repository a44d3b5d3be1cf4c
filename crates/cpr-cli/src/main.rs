use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cpr_core::{decompose_wrapper, parse_dimensions, parse_price, parse_price_range};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "cpr-cli")]
#[command(about = "Cigar pricing & rating scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Traverse every enabled source in sources.yaml.
    Sync {
        /// Run only this source_id, even if it is disabled.
        #[arg(long)]
        source: Option<String>,
    },
    /// Print what the normalizers make of a raw string.
    Normalize {
        #[arg(value_enum)]
        kind: NormalizeKind,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NormalizeKind {
    Size,
    Price,
    Wrapper,
}

fn normalize(kind: NormalizeKind, text: &str) -> Value {
    match kind {
        NormalizeKind::Size => json!(parse_dimensions(text)),
        NormalizeKind::Price => json!({
            "price": parse_price(text),
            "range": parse_price_range(text),
        }),
        NormalizeKind::Wrapper => json!(decompose_wrapper(text)),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync { source: None }) {
        Commands::Sync { source } => {
            init_tracing();
            let outcome = cpr_sync::run_sync_from_env(source.as_deref()).await?;
            let summary = &outcome.summary;
            println!(
                "sync complete: run_id={} sources={} records={} failures={} report={}",
                summary.run_id,
                summary.sources.len(),
                summary.records,
                summary.failures,
                outcome.report_path.display()
            );
        }
        Commands::Normalize { kind, text } => {
            println!("{}", serde_json::to_string_pretty(&normalize(kind, &text))?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_output() {
        let value = normalize(NormalizeKind::Size, "6 1/2 x 52 (Torpedo)");
        assert_eq!(value["length_inches"], 6.5);
        assert_eq!(value["ring_gauge"], 52);
        assert_eq!(value["shape"], "Torpedo");
    }

    #[test]
    fn price_output_keeps_high_bound_separate() {
        let value = normalize(NormalizeKind::Price, "$8.53 - $10.89");
        assert_eq!(value["price"], 8.53);
        assert_eq!(value["range"]["high"], 10.89);

        let value = normalize(NormalizeKind::Price, "Contact for price");
        assert!(value["price"].is_null());
    }

    #[test]
    fn wrapper_output() {
        let value = normalize(NormalizeKind::Wrapper, "Connecticut Broadleaf Maduro (USA)");
        assert_eq!(value["color"], "Maduro");
        assert_eq!(value["leaf"], "Connecticut Broadleaf");
        assert_eq!(value["origin"], "USA");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["cpr-cli", "sync", "--source", "gotham-cigars"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Sync { source: Some(ref id) }) if id == "gotham-cigars"));

        let cli = Cli::try_parse_from(["cpr-cli", "normalize", "wrapper", "Habano Oscuro"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Normalize {
                kind: NormalizeKind::Wrapper,
                ..
            })
        ));
    }
}
