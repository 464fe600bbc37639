use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{decimals_from_eth_call_hex, dedup_sort_truncate, Provider};
use crate::config::Limits;
use crate::error::ProviderError;
use crate::secret::SecretString;
use crate::transfer::{TokenMetadata, Transfer};

const NAME: &str = "alchemy";

/// Alchemy's `alchemy_getAssetTransfers` JSON-RPC endpoint.
pub struct AlchemyProvider {
    client: Client,
    api_key: SecretString,
    limits: Limits,
}

impl AlchemyProvider {
    pub fn new(api_key: SecretString, limits: Limits) -> Self {
        Self {
            client: Client::new(),
            api_key,
            limits,
        }
    }

    fn endpoint(&self) -> String {
        format!("https://eth-mainnet.g.alchemy.com/v2/{}", self.api_key.expose())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .timeout(self.limits.request_timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: NAME,
                source,
            })?;

        response.json::<Value>().await.map_err(|source| ProviderError::Request {
            provider: NAME,
            source,
        })
    }

    async fn decimals(&self, token_address: &str) -> u8 {
        let params = json!([{"to": token_address, "data": "0x313ce567"}, "latest"]);
        self.call("eth_call", params)
            .await
            .ok()
            .and_then(|data| data.get("result").and_then(Value::as_str).map(str::to_owned))
            .and_then(|hex| decimals_from_eth_call_hex(&hex))
            .unwrap_or(18)
    }

    async fn token_metadata_rpc(&self, token_address: &str) -> Option<(Option<String>, Option<String>, Option<u8>)> {
        let data = self
            .call("alchemy_getTokenMetadata", json!([token_address]))
            .await
            .ok()?;
        let result = data.get("result")?;
        let name = result.get("name").and_then(Value::as_str).map(str::to_owned);
        let symbol = result.get("symbol").and_then(Value::as_str).map(str::to_owned);
        let decimals = result.get("decimals").and_then(Value::as_u64).map(|d| d as u8);
        Some((name, symbol, decimals))
    }

    async fn total_supply(&self, token_address: &str, decimals: u8) -> Option<f64> {
        let params = json!([{"to": token_address, "data": "0x18160ddd"}, "latest"]);
        let hex = self
            .call("eth_call", params)
            .await
            .ok()?
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_owned)?;
        let raw = ethers::types::U256::from_str_radix(hex.trim_start_matches("0x"), 16).ok()?;
        Some(raw.low_u128() as f64 / 10f64.powi(decimals as i32))
    }
}

#[async_trait]
impl Provider for AlchemyProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_transfers(
        &self,
        token_address: &str,
        _chain: &str,
        limit: usize,
    ) -> Result<Vec<Transfer>, ProviderError> {
        let token_address = token_address.to_ascii_lowercase();
        let decimals = self.decimals(&token_address).await;
        let per_page = limit.min(1000);

        let mut transfers = Vec::new();
        let mut page_key: Option<String> = None;

        while transfers.len() < limit {
            let mut params_obj = json!({
                "fromBlock": "0x0",
                "toBlock": "latest",
                "order": "desc",
                "category": ["erc20"],
                "contractAddresses": [token_address],
                "excludeZeroValue": true,
                "withMetadata": true,
                "maxCount": format!("0x{:x}", per_page),
            });
            if let Some(key) = &page_key {
                params_obj["pageKey"] = json!(key);
            }

            let data = self.call("alchemy_getAssetTransfers", json!([params_obj])).await?;
            if data.get("error").is_some() {
                break;
            }

            let result = data.get("result").cloned().unwrap_or(Value::Null);
            let page = result
                .get("transfers")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            page_key = result
                .get("pageKey")
                .and_then(Value::as_str)
                .map(str::to_owned);

            let page_len = page.len();
            for item in &page {
                if let Some(transfer) = parse_transfer(item, decimals) {
                    transfers.push(transfer);
                }
            }

            if page_key.is_none() || page_len == 0 {
                break;
            }
        }

        Ok(dedup_sort_truncate(transfers, limit))
    }

    async fn fetch_metadata(
        &self,
        token_address: &str,
        _chain: &str,
    ) -> Result<TokenMetadata, ProviderError> {
        let token_address = token_address.to_ascii_lowercase();
        let (name, symbol, decimals) = match self.token_metadata_rpc(&token_address).await {
            Some((name, symbol, decimals)) => (name, symbol, decimals),
            None => (None, None, None),
        };
        let decimals = match decimals {
            Some(decimals) => decimals,
            None => self.decimals(&token_address).await,
        };
        let total_supply = self.total_supply(&token_address, decimals).await;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals: Some(decimals),
            total_supply,
        })
    }
}

fn parse_transfer(item: &Value, decimals: u8) -> Option<Transfer> {
    let from = item.get("from")?.as_str()?.to_ascii_lowercase();
    let to = item.get("to")?.as_str()?.to_ascii_lowercase();
    let hash = item.get("hash")?.as_str()?.to_owned();

    let block = item
        .get("blockNum")
        .and_then(Value::as_str)
        .and_then(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0);

    let raw_value_hex = item.get("rawContract")?.get("value")?.as_str()?;
    let raw_value = ethers::types::U256::from_str_radix(raw_value_hex.trim_start_matches("0x"), 16).ok()?;
    let value = raw_value.low_u128() as f64 / 10f64.powi(decimals as i32);

    let timestamp = item
        .get("metadata")
        .and_then(|m| m.get("blockTimestamp"))
        .and_then(Value::as_str)
        .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0);

    Some(Transfer {
        hash,
        from,
        to,
        value,
        timestamp,
        block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_transfer_with_metadata_timestamp() {
        let item = json!({
            "from": "0xAAA",
            "to": "0xBBB",
            "hash": "0x1",
            "blockNum": "0xa",
            "rawContract": {"value": "0xde0b6b3a7640000"},
            "metadata": {"blockTimestamp": "2024-01-01T00:00:00Z"},
        });
        let transfer = parse_transfer(&item, 18).unwrap();
        assert_eq!(transfer.value, 1.0);
        assert_eq!(transfer.block, 10);
        assert!(transfer.timestamp > 0);
    }
}
