/// Maps a loosely-typed chain name to the identifiers each provider expects.
///
/// Unknown chains fall back to Ethereum mainnet, matching how the explorer
/// API behaves when handed a `chainid` it can still resolve sensibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTokens {
    pub etherscan_chain_id: u64,
    pub bitquery_v2_network: &'static str,
    pub bitquery_v1_network: &'static str,
}

pub fn resolve(chain: &str) -> ChainTokens {
    match chain.to_ascii_lowercase().as_str() {
        "bsc" | "binance-smart-chain" => ChainTokens {
            etherscan_chain_id: 56,
            bitquery_v2_network: "bsc",
            bitquery_v1_network: "bsc",
        },
        "polygon" | "matic" => ChainTokens {
            etherscan_chain_id: 137,
            bitquery_v2_network: "polygon",
            bitquery_v1_network: "polygon",
        },
        "base" => ChainTokens {
            etherscan_chain_id: 8453,
            bitquery_v2_network: "base",
            bitquery_v1_network: "base",
        },
        "arbitrum" => ChainTokens {
            etherscan_chain_id: 42161,
            bitquery_v2_network: "arbitrum",
            bitquery_v1_network: "arbitrum",
        },
        "optimism" => ChainTokens {
            etherscan_chain_id: 10,
            bitquery_v2_network: "optimism",
            bitquery_v1_network: "optimism",
        },
        _ => ChainTokens {
            etherscan_chain_id: 1,
            bitquery_v2_network: "eth",
            bitquery_v1_network: "ethereum",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_chain_defaults_to_mainnet() {
        let tokens = resolve("not-a-real-chain");
        assert_eq!(tokens.etherscan_chain_id, 1);
    }

    #[test]
    fn recognizes_polygon_aliases() {
        assert_eq!(resolve("polygon").etherscan_chain_id, 137);
        assert_eq!(resolve("matic").etherscan_chain_id, 137);
    }
}
