pub mod alchemy;
pub mod bitquery;
pub mod etherscan;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::transfer::{TokenMetadata, Transfer};

/// A source of on-chain ERC20 transfer history and token metadata.
///
/// The fetcher tries providers in priority order and falls back to the next
/// one whenever a provider returns zero transfers, matching the behavior of
/// the original multi-API ingestion pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_transfers(
        &self,
        token_address: &str,
        chain: &str,
        limit: usize,
    ) -> Result<Vec<Transfer>, ProviderError>;

    async fn fetch_metadata(
        &self,
        token_address: &str,
        chain: &str,
    ) -> Result<TokenMetadata, ProviderError>;
}

pub(crate) fn dedup_sort_truncate(mut transfers: Vec<Transfer>, limit: usize) -> Vec<Transfer> {
    let mut seen = std::collections::HashSet::with_capacity(transfers.len());
    transfers.retain(|t| !t.hash.is_empty() && seen.insert(t.hash.clone()));
    transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    transfers.truncate(limit);
    transfers
}

pub(crate) const TRANSFER_TOPIC0: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub(crate) fn decimals_from_eth_call_hex(hex_result: &str) -> Option<u8> {
    let stripped = hex_result.strip_prefix("0x")?;
    u8::try_from(u64::from_str_radix(stripped, 16).ok()?).ok()
}

pub(crate) fn address_from_topic(topic: &str) -> String {
    let stripped = topic.trim_start_matches("0x");
    let tail = if stripped.len() >= 40 {
        &stripped[stripped.len() - 40..]
    } else {
        stripped
    };
    format!("0x{}", tail.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_from_topic_takes_last_40_hex_chars() {
        let topic = "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        assert_eq!(
            address_from_topic(topic),
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn dedup_sort_truncate_keeps_newest_first() {
        let transfers = vec![
            Transfer {
                hash: "0x1".into(),
                from: "a".into(),
                to: "b".into(),
                value: 1.0,
                timestamp: 10,
                block: 1,
            },
            Transfer {
                hash: "0x2".into(),
                from: "a".into(),
                to: "b".into(),
                value: 1.0,
                timestamp: 20,
                block: 2,
            },
            Transfer {
                hash: "0x1".into(),
                from: "a".into(),
                to: "b".into(),
                value: 1.0,
                timestamp: 10,
                block: 1,
            },
        ];
        let result = dedup_sort_truncate(transfers, 10);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].hash, "0x2");
    }
}
