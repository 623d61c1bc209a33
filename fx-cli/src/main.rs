//! FX CLI
//!
//! Command-line interface for the Currency Conversion API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use fx_client::FxClient;
use fx_types::{CurrencyCode, parse_date};

#[derive(Parser)]
#[command(name = "fx")]
#[command(author, version, about = "Currency Conversion API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Currency API
    #[arg(long, env = "FX_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest exchange rates
    Latest {
        /// Base currency (provider default when omitted)
        #[arg(long)]
        base: Option<String>,
    },
    /// Convert an amount between currencies
    Convert {
        /// Source currency
        from: String,
        /// Target currency
        to: String,
        /// Amount of the source currency
        amount: Decimal,
    },
    /// Historical rates for a date range
    Historical {
        /// Base currency
        base: String,
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },
    /// Show the upstream circuit breaker state
    Circuit,
    /// Check API health
    Health,
}

fn parse_currency(s: &str) -> Result<CurrencyCode> {
    Ok(CurrencyCode::parse(s)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = FxClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Latest { base } => {
            let base = base.as_deref().map(parse_currency).transpose()?;
            let snapshot = client
                .latest(base.as_ref().map(CurrencyCode::as_str))
                .await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Commands::Convert { from, to, amount } => {
            let from = parse_currency(&from)?;
            let to = parse_currency(&to)?;
            let result = client.convert(from.as_str(), to.as_str(), amount).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Historical {
            base,
            start,
            end,
            page,
            page_size,
        } => {
            let base = parse_currency(&base)?;
            parse_date(&start, "start date")?;
            parse_date(&end, "end date")?;
            let series = client
                .historical(base.as_str(), &start, &end, page, page_size)
                .await?;
            println!("{}", serde_json::to_string_pretty(&series)?);
        }

        Commands::Circuit => {
            let status = client.circuit().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
