use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::analyzer::{self, AnalyzerResult};
use crate::community::CommunityMode;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::fetcher::{Fetcher, ProviderChoice};
use crate::graph::WalletGraph;
use crate::mixer;
use crate::result::{self, AnalysisResult};
use crate::risk;
use crate::wash_trade;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub token_address: String,
    pub chain: String,
    pub community_mode: CommunityMode,
    pub timeout: Option<Duration>,
    pub provider: ProviderChoice,
    pub max_transactions: Option<usize>,
}

impl AnalysisRequest {
    pub fn new(token_address: impl Into<String>) -> Self {
        Self {
            token_address: token_address.into(),
            chain: "ethereum".to_owned(),
            community_mode: CommunityMode::Auto,
            timeout: None,
            provider: ProviderChoice::Auto,
            max_transactions: None,
        }
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn with_provider(mut self, provider: ProviderChoice) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_max_transactions(mut self, max_transactions: usize) -> Self {
        self.max_transactions = Some(max_transactions);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub elapsed: Duration,
}

/// Runs the full pipeline for one token: fetch transfer history, build the
/// wallet graph, run graph analysis and wash-trade detection concurrently,
/// flag mixer exposure, and fold everything into a weighted risk score.
#[instrument(skip(config), fields(token = %request.token_address, chain = %request.chain))]
pub async fn analyze(
    config: Arc<Config>,
    request: AnalysisRequest,
) -> Result<AnalysisOutcome, AnalysisError> {
    let deadline = request.timeout.unwrap_or(config.limits.timeout);
    tokio::time::timeout(deadline, run(config, request))
        .await
        .map_err(|_| AnalysisError::Timeout)?
}

async fn run(config: Arc<Config>, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
    let start = Instant::now();

    if !is_valid_address(&request.token_address) {
        return Err(AnalysisError::InvalidAddress(request.token_address));
    }

    let fetcher = Fetcher::new(&config)?;
    let token_data = fetcher
        .fetch_token_data(
            &request.token_address,
            &request.chain,
            request.provider,
            request.max_transactions,
        )
        .await?;

    let wallet_graph = WalletGraph::build(&token_data);
    let max_holders = config.limits.max_holders;
    let burst_window = config.wash_trade.burst_window;
    let whitelist = config.protocol_whitelist.clone();

    let (analyzer_result, wash_trade_pairs): (AnalyzerResult, Vec<wash_trade::WashTradePair>) = tokio::join!(
        async { analyzer::analyze(&wallet_graph, request.community_mode, max_holders) },
        async { wash_trade::detect(&wallet_graph, &whitelist, burst_window) }
    );

    let mixer_flags = mixer::flag(&token_data.all_wallets, &config.known_mixers);

    let risk_assessment = risk::score(
        &config.risk_weights,
        &analyzer_result,
        &mixer_flags,
        &wash_trade_pairs,
        config.wash_trade.volume_normalizer,
        &token_data,
    );

    let result = result::build(
        &token_data.token_address,
        &token_data.chain,
        &wallet_graph,
        analyzer_result,
        mixer_flags,
        wash_trade_pairs,
        risk_assessment,
        token_data.provider_used,
    );

    let elapsed = start.elapsed();
    info!(risk_score = result.risk_score, elapsed_ms = elapsed.as_millis() as u64, "analysis complete");

    Ok(AnalysisOutcome { result, elapsed })
}

fn is_valid_address(address: &str) -> bool {
    address.parse::<ethers::types::Address>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_address("not-an-address"));
        assert!(!is_valid_address("0x123"));
        assert!(is_valid_address("0x1234567890123456789012345678901234567890"));
    }

    #[tokio::test]
    async fn unconfigured_provider_surfaces_configuration_error() {
        let config = Arc::new(Config::default());
        let request = AnalysisRequest::new("0x1234567890123456789012345678901234567890");
        let result = analyze(config, request).await;
        assert!(matches!(result, Err(AnalysisError::Configuration(_))));
    }
}
