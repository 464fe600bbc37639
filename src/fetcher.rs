use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::TokenCache;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::providers::alchemy::AlchemyProvider;
use crate::providers::bitquery::BitqueryProvider;
use crate::providers::etherscan::EtherscanProvider;
use crate::providers::Provider;
use crate::transfer::{Holder, TokenData, TokenMetadata, Transfer};

/// Which provider a caller wants the fetcher to use. `Auto` tries every
/// configured provider in priority order; the others lock the fetcher to a
/// single provider and fail with a configuration error if it isn't set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProviderChoice {
    #[default]
    Auto,
    Alchemy,
    Bitquery,
    Etherscan,
}

impl ProviderChoice {
    fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Alchemy => "alchemy",
            Self::Bitquery => "bitquery",
            Self::Etherscan => "etherscan",
        }
    }
}

/// Fetches transfer history and metadata for a token, trying each configured
/// provider in priority order (Alchemy, then BitQuery, then Etherscan) and
/// falling back to the next one whenever a provider comes back empty. A
/// caller may instead lock the fetch to a single provider.
pub struct Fetcher {
    alchemy: Option<AlchemyProvider>,
    bitquery: Option<BitqueryProvider>,
    etherscan: Option<Arc<EtherscanProvider>>,
    cache: TokenCache,
    max_holders: usize,
    max_transactions: usize,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, AnalysisError> {
        config.validate()?;

        let alchemy = config
            .credentials
            .alchemy_api_key
            .clone()
            .map(|key| AlchemyProvider::new(key, config.limits.clone()));
        let bitquery = config
            .credentials
            .bitquery_access_token
            .clone()
            .map(|key| BitqueryProvider::new(key, config.limits.clone()));
        let etherscan = config
            .credentials
            .etherscan_api_key
            .clone()
            .map(|key| Arc::new(EtherscanProvider::new(key, config.limits.clone())));

        Ok(Self {
            alchemy,
            bitquery,
            etherscan,
            cache: TokenCache::new(config.cache.ttl, config.cache.max_items),
            max_holders: config.limits.max_holders,
            max_transactions: config.limits.max_transactions_to_fetch,
        })
    }

    pub async fn fetch_token_data(
        &self,
        token_address: &str,
        chain: &str,
        provider: ProviderChoice,
        max_transactions: Option<usize>,
    ) -> Result<TokenData, AnalysisError> {
        let key = TokenCache::key(chain, token_address);
        if provider == ProviderChoice::Auto {
            if let Some(cached) = self.cache.get(&key).await {
                info!(token = token_address, "cache hit for token data");
                return Ok(cached);
            }
        }

        let limit = max_transactions.unwrap_or(self.max_transactions);
        let (transactions, provider_used) =
            self.fetch_transactions(token_address, chain, provider, limit).await?;
        let wallets = extract_wallets(&transactions);

        let mut sorted_wallets: Vec<(&String, &WalletStats)> = wallets.iter().collect();
        sorted_wallets.sort_by(|a, b| b.1.balance.partial_cmp(&a.1.balance).unwrap());

        let top_holders = sorted_wallets
            .iter()
            .take(self.max_holders)
            .map(|(address, stats)| Holder {
                address: (*address).clone(),
                balance: stats.balance,
                transaction_count: stats.transaction_count,
            })
            .collect();

        let metadata = self.fetch_metadata(token_address, chain).await;

        let result = TokenData {
            token_address: token_address.to_owned(),
            chain: chain.to_owned(),
            metadata,
            top_holders,
            transactions,
            all_wallets: wallets.keys().cloned().collect(),
            provider_used,
        };

        if provider == ProviderChoice::Auto {
            self.cache.set(key, result.clone()).await;
        }
        Ok(result)
    }

    async fn fetch_transactions(
        &self,
        token_address: &str,
        chain: &str,
        provider: ProviderChoice,
        limit: usize,
    ) -> Result<(Vec<Transfer>, Option<&'static str>), AnalysisError> {
        if provider != ProviderChoice::Auto {
            return self.fetch_from_forced_provider(token_address, chain, provider, limit).await;
        }

        let mut attempted = Vec::new();

        if let Some(provider) = &self.alchemy {
            attempted.push("alchemy");
            match provider.fetch_transfers(token_address, chain, limit).await {
                Ok(transfers) if !transfers.is_empty() => return Ok((transfers, Some("alchemy"))),
                Ok(_) => info!("alchemy returned no transfers, falling back"),
                Err(error) => warn!(%error, "alchemy fetch failed, falling back"),
            }
        }

        if let Some(provider) = &self.bitquery {
            attempted.push("bitquery");
            match provider.fetch_transfers(token_address, chain, limit).await {
                Ok(transfers) if !transfers.is_empty() => return Ok((transfers, Some("bitquery"))),
                Ok(_) => info!("bitquery returned no transfers, falling back"),
                Err(error) => warn!(%error, "bitquery fetch failed, falling back"),
            }
        }

        if let Some(provider) = &self.etherscan {
            attempted.push("etherscan");
            match provider.fetch_transfers(token_address, chain, limit).await {
                Ok(transfers) if !transfers.is_empty() => return Ok((transfers, Some("etherscan"))),
                Ok(_) => info!("etherscan returned no transfers"),
                Err(error) => warn!(%error, "etherscan fetch failed"),
            }
        }

        if attempted.is_empty() {
            return Err(AnalysisError::Configuration(
                "no provider is configured".to_owned(),
            ));
        }

        warn!(providers = %attempted.join(", "), "all configured providers returned no transfers");
        Ok((Vec::new(), None))
    }

    async fn fetch_from_forced_provider(
        &self,
        token_address: &str,
        chain: &str,
        provider: ProviderChoice,
        limit: usize,
    ) -> Result<(Vec<Transfer>, Option<&'static str>), AnalysisError> {
        let available: Vec<&str> = [
            self.alchemy.is_some().then_some("alchemy"),
            self.bitquery.is_some().then_some("bitquery"),
            self.etherscan.is_some().then_some("etherscan"),
        ]
        .into_iter()
        .flatten()
        .collect();

        match provider {
            ProviderChoice::Alchemy => match &self.alchemy {
                Some(p) => Ok((p.fetch_transfers(token_address, chain, limit).await?, Some("alchemy"))),
                None => Err(unavailable_provider(provider, &available)),
            },
            ProviderChoice::Bitquery => match &self.bitquery {
                Some(p) => Ok((p.fetch_transfers(token_address, chain, limit).await?, Some("bitquery"))),
                None => Err(unavailable_provider(provider, &available)),
            },
            ProviderChoice::Etherscan => match &self.etherscan {
                Some(p) => Ok((p.fetch_transfers(token_address, chain, limit).await?, Some("etherscan"))),
                None => Err(unavailable_provider(provider, &available)),
            },
            ProviderChoice::Auto => unreachable!("caller already routed Auto to fetch_transactions"),
        }
    }

    async fn fetch_metadata(&self, token_address: &str, chain: &str) -> TokenMetadata {
        if let Some(provider) = &self.alchemy {
            if let Ok(metadata) = provider.fetch_metadata(token_address, chain).await {
                if is_informative(&metadata) {
                    return metadata;
                }
            }
        }
        if let Some(provider) = &self.bitquery {
            if let Ok(metadata) = provider.fetch_metadata(token_address, chain).await {
                if is_informative(&metadata) {
                    return metadata;
                }
            }
        }
        if let Some(provider) = &self.etherscan {
            if let Ok(metadata) = provider.fetch_metadata(token_address, chain).await {
                if is_informative(&metadata) {
                    return metadata;
                }
            }
        }
        TokenMetadata::default()
    }
}

/// BitQuery reports a `UNKNOWN`/`Token` placeholder when it has no currency
/// record for a token; that result carries no information and should not
/// stop the fetcher from trying the next provider in the metadata chain.
fn is_informative(metadata: &TokenMetadata) -> bool {
    metadata.symbol.as_deref() != Some("UNKNOWN")
}

fn unavailable_provider(provider: ProviderChoice, available: &[&str]) -> AnalysisError {
    let message = if available.is_empty() {
        format!(
            "provider '{}' was requested but no provider is configured",
            provider.name()
        )
    } else {
        format!(
            "provider '{}' was requested but is not configured (credential missing); available: {}",
            provider.name(),
            available.join(", ")
        )
    };
    AnalysisError::Configuration(message)
}

#[derive(Default, Clone)]
struct WalletStats {
    sent: f64,
    received: f64,
    balance: f64,
    transaction_count: u64,
}

/// Approximates holder balances from observed transfer volume: `received -
/// sent`, clamped at zero. This is not an on-chain balance query, only a
/// cheap proxy derived from the fetched transfer window.
fn extract_wallets(transactions: &[Transfer]) -> HashMap<String, WalletStats> {
    let mut wallets: HashMap<String, WalletStats> = HashMap::new();

    for tx in transactions {
        if !tx.from.is_empty() {
            let entry = wallets.entry(tx.from.clone()).or_default();
            entry.sent += tx.value;
            entry.transaction_count += 1;
        }
        if !tx.to.is_empty() {
            let entry = wallets.entry(tx.to.clone()).or_default();
            entry.received += tx.value;
            entry.transaction_count += 1;
        }
    }

    for stats in wallets.values_mut() {
        stats.balance = (stats.received - stats.sent).max(0.0);
    }

    wallets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, value: f64) -> Transfer {
        Transfer {
            hash: format!("{from}{to}{value}"),
            from: from.to_owned(),
            to: to.to_owned(),
            value,
            timestamp: 0,
            block: 0,
        }
    }

    #[test]
    fn balance_is_received_minus_sent_clamped_at_zero() {
        let txs = vec![transfer("a", "b", 10.0), transfer("b", "c", 4.0)];
        let wallets = extract_wallets(&txs);
        assert_eq!(wallets["a"].balance, 0.0);
        assert_eq!(wallets["b"].balance, 6.0);
        assert_eq!(wallets["c"].balance, 4.0);
    }

    #[test]
    fn transaction_count_counts_both_sides() {
        let txs = vec![transfer("a", "b", 1.0)];
        let wallets = extract_wallets(&txs);
        assert_eq!(wallets["a"].transaction_count, 1);
        assert_eq!(wallets["b"].transaction_count, 1);
    }

    #[test]
    fn unavailable_provider_lists_configured_alternatives() {
        let error = unavailable_provider(ProviderChoice::Alchemy, &["bitquery", "etherscan"]);
        let message = error.to_string();
        assert!(message.contains("alchemy"));
        assert!(message.contains("bitquery"));
        assert!(message.contains("etherscan"));
    }

    #[test]
    fn unavailable_provider_with_no_alternatives_says_so() {
        let error = unavailable_provider(ProviderChoice::Etherscan, &[]);
        assert!(error.to_string().contains("no provider is configured"));
    }

    #[test]
    fn unknown_bitquery_placeholder_is_not_informative() {
        let placeholder = TokenMetadata {
            name: Some("Token".to_owned()),
            symbol: Some("UNKNOWN".to_owned()),
            decimals: Some(18),
            total_supply: None,
        };
        assert!(!is_informative(&placeholder));
    }

    #[test]
    fn real_metadata_is_informative() {
        let metadata = TokenMetadata {
            name: Some("USD Coin".to_owned()),
            symbol: Some("USDC".to_owned()),
            decimals: Some(6),
            total_supply: None,
        };
        assert!(is_informative(&metadata));
    }
}
