use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use token_forensics::pipeline::AnalysisRequest;
use token_forensics::{analyze, config, ProviderChoice};

#[derive(Debug, Parser)]
#[command(about = "Forensic risk analysis of an ERC20 token")]
struct Options {
    /// Token contract address, e.g. 0x1234...
    token_address: String,

    /// Chain the token lives on (ethereum, bsc, polygon, base, arbitrum, optimism)
    #[arg(long, default_value = "ethereum")]
    chain: String,

    /// Path to a TOML config file; falls back to FGA__ environment variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lock ingestion to a single provider instead of the default fallback chain
    #[arg(long, value_enum, default_value = "auto")]
    provider: ProviderChoice,

    /// Cap on transfer events fetched, overriding the configured limit
    #[arg(long)]
    max_transactions: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = Options::parse();

    let config = match config::load_config(options.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(error) => {
            eprintln!("failed to load configuration: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut request = AnalysisRequest::new(options.token_address)
        .with_chain(options.chain)
        .with_provider(options.provider);
    if let Some(max_transactions) = options.max_transactions {
        request = request.with_max_transactions(max_transactions);
    }

    match analyze(config, request).await {
        Ok(outcome) => {
            let json = serde_json::to_string_pretty(&outcome.result).expect("result is serializable");
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("analysis failed: {error}");
            ExitCode::FAILURE
        }
    }
}
