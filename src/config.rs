use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secret::SecretString;

pub fn load_config(config_file_path: Option<&Path>) -> anyhow::Result<Config> {
    let mut settings = config::Config::builder();

    if let Some(path) = config_file_path {
        settings = settings.add_source(config::File::from(path).required(true));
    }

    let settings = settings
        .add_source(
            config::Environment::with_prefix("FGA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize::<Config>()?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: ApiCredentials,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub wash_trade: WashTradeConfig,
    #[serde(default)]
    pub risk_weights: RiskWeights,
    #[serde(default = "default::known_mixers")]
    pub known_mixers: HashSet<String>,
    #[serde(default = "default::protocol_whitelist")]
    pub protocol_whitelist: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: ApiCredentials::default(),
            limits: Limits::default(),
            cache: CacheConfig::default(),
            wash_trade: WashTradeConfig::default(),
            risk_weights: RiskWeights::default(),
            known_mixers: default::known_mixers(),
            protocol_whitelist: default::protocol_whitelist(),
        }
    }
}

impl Config {
    /// At least one provider credential must be configured, or every
    /// analysis request fails at the fetch stage anyway.
    pub fn validate(&self) -> Result<(), crate::error::AnalysisError> {
        if self.credentials.alchemy_api_key.is_none()
            && self.credentials.bitquery_access_token.is_none()
            && self.credentials.etherscan_api_key.is_none()
        {
            return Err(crate::error::AnalysisError::Configuration(
                "at least one provider credential must be configured (alchemy_api_key, \
                 bitquery_access_token, or etherscan_api_key)"
                    .to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCredentials {
    #[serde(default)]
    pub alchemy_api_key: Option<SecretString>,
    #[serde(default)]
    pub bitquery_access_token: Option<SecretString>,
    #[serde(default)]
    pub etherscan_api_key: Option<SecretString>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Number of top holders reported in the result, ranked by balance.
    #[serde(default = "default::max_holders")]
    pub max_holders: usize,

    /// Cap on transfers fetched for a single analysis.
    #[serde(default = "default::max_transactions_to_fetch")]
    pub max_transactions_to_fetch: usize,

    /// Soft deadline for a whole analysis run; individual requests may
    /// override this.
    #[serde(with = "humantime_serde")]
    #[serde(default = "default::timeout")]
    pub timeout: Duration,

    /// Bound on in-flight requests inside the explorer provider's
    /// block-range fan-out.
    #[serde(default = "default::max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Approximate global issuance rate for the explorer provider's
    /// windowed fetches.
    #[serde(default = "default::requests_per_second")]
    pub requests_per_second: u32,

    /// Per-HTTP-call timeout.
    #[serde(with = "humantime_serde")]
    #[serde(default = "default::request_timeout")]
    pub request_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_holders: default::max_holders(),
            max_transactions_to_fetch: default::max_transactions_to_fetch(),
            timeout: default::timeout(),
            max_concurrent_requests: default::max_concurrent_requests(),
            requests_per_second: default::requests_per_second(),
            request_timeout: default::request_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(with = "humantime_serde")]
    #[serde(default = "default::cache_ttl")]
    pub ttl: Duration,

    #[serde(default = "default::max_cache_items")]
    pub max_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default::cache_ttl(),
            max_items: default::max_cache_items(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashTradeConfig {
    #[serde(with = "humantime_serde")]
    #[serde(default = "default::burst_window")]
    pub burst_window: Duration,

    #[serde(default = "default::volume_normalizer")]
    pub volume_normalizer: f64,
}

impl Default for WashTradeConfig {
    fn default() -> Self {
        Self {
            burst_window: default::burst_window(),
            volume_normalizer: default::volume_normalizer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    #[serde(default = "default::weight_gini")]
    pub gini: f64,
    #[serde(default = "default::weight_mixer")]
    pub mixer: f64,
    #[serde(default = "default::weight_wash_trade")]
    pub wash_trade: f64,
    #[serde(default = "default::weight_cluster")]
    pub cluster: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            gini: default::weight_gini(),
            mixer: default::weight_mixer(),
            wash_trade: default::weight_wash_trade(),
            cluster: default::weight_cluster(),
        }
    }
}

pub mod default {
    use std::collections::HashSet;
    use std::time::Duration;

    pub fn max_holders() -> usize {
        50
    }

    pub fn max_transactions_to_fetch() -> usize {
        10_000
    }

    pub fn timeout() -> Duration {
        Duration::from_secs(25)
    }

    pub fn max_concurrent_requests() -> usize {
        8
    }

    pub fn requests_per_second() -> u32 {
        4
    }

    pub fn request_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn cache_ttl() -> Duration {
        Duration::from_secs(300)
    }

    pub fn max_cache_items() -> usize {
        100
    }

    pub fn burst_window() -> Duration {
        Duration::from_secs(2 * 60 * 60)
    }

    pub fn volume_normalizer() -> f64 {
        100_000.0
    }

    pub fn weight_gini() -> f64 {
        0.30
    }

    pub fn weight_mixer() -> f64 {
        0.25
    }

    pub fn weight_wash_trade() -> f64 {
        0.25
    }

    pub fn weight_cluster() -> f64 {
        0.20
    }

    pub fn known_mixers() -> HashSet<String> {
        [
            "0x12d66f87a04a9e220743712ce6d9bb1b5616b8fc", // Tornado Cash 0.1 ETH
            "0x47ce0c6ed5b0ce3d3a51fdb1c52dc66a7c3c2936", // Tornado Cash 1 ETH
            "0x910cbd523d972eb0a6f4cae4618ad62622b39dbf", // Tornado Cash 10 ETH
            "0xa160cdab225685da1d56aa342ad8841c3b53f291", // Tornado Cash 100 ETH
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }

    pub fn protocol_whitelist() -> HashSet<String> {
        [
            "0x7a250d5630b4cf539739df2c5dacb4c659f2488d", // Uniswap V2 Router
            "0xe592427a0aece92de3edee1f18e0157c05861564", // Uniswap V3 Router
            "0xef1c6e67703c7bd7107f31af8ee2b014445c8c73", // Uniswap Universal Router
            "0xd9e1ce17f2641f24ae83637ab66a2cca9c378b9f", // SushiSwap Router
            "0x1111111254fb6c44bac0bed2854e76f90643097d", // 1inch Router v5
            "0xdef171fe48cf0115b1d80b88dc8eab59176fee57", // ParaSwap Augustus
            "0x000000000022d473030f116ddee9f6b43ac78ba3", // Uniswap Permit2
            "0xba12222222228d8ba445958a75a0704d566bf2c8", // Balancer V2 Vault
            "0x28c6c06298d514db089934071355e0e4dc0bff89", // Binance 14
            "0x21a31ee1afc51d94c2efccaa2092ab7cbf6fd64",  // Binance 8
            "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be", // Binance hot wallet
            "0x503828976d22510aad0201ac7ec88293211d23da", // Coinbase hot wallet
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }
}
