use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{address_from_topic, decimals_from_eth_call_hex, dedup_sort_truncate, Provider, TRANSFER_TOPIC0};
use crate::chain;
use crate::config::Limits;
use crate::error::ProviderError;
use crate::secret::SecretString;
use crate::transfer::{TokenMetadata, Transfer};

const NAME: &str = "etherscan";

/// Etherscan-family block-explorer API (also covers BscScan, PolygonScan,
/// etc. through the v2 unified `chainid` parameter).
pub struct EtherscanProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    limits: Limits,
}

impl EtherscanProvider {
    pub fn new(api_key: SecretString, limits: Limits) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.etherscan.io/v2/api".to_owned(),
            limits,
        }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .timeout(self.limits.request_timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: NAME,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider: NAME,
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|source| ProviderError::Request {
            provider: NAME,
            source,
        })
    }

    async fn latest_block(&self, chain_id: u64) -> u64 {
        let result = self
            .get(&[
                ("module", "proxy".to_owned()),
                ("action", "eth_blockNumber".to_owned()),
                ("chainid", chain_id.to_string()),
                ("apikey", self.api_key.expose().to_owned()),
            ])
            .await
            .ok()
            .and_then(|v| v.get("result").and_then(Value::as_str).map(str::to_owned));

        let block = result
            .as_deref()
            .and_then(|hex| hex.strip_prefix("0x"))
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .unwrap_or(0);

        if block == 0 || block > 100_000_000 {
            20_000_000
        } else {
            block
        }
    }

    /// The `tokeninfo` endpoint's first result row, if the call succeeded
    /// and returned at least one row. Carries name/symbol/decimals/
    /// totalSupply together, the same way the eth_call decimals fallback
    /// carries only decimals.
    async fn tokeninfo_row(&self, token_address: &str, chain_id: u64) -> Option<Value> {
        let info = self
            .get(&[
                ("module", "token".to_owned()),
                ("action", "tokeninfo".to_owned()),
                ("contractaddress", token_address.to_owned()),
                ("chainid", chain_id.to_string()),
                ("apikey", self.api_key.expose().to_owned()),
            ])
            .await
            .ok()?;

        if info.get("status").and_then(Value::as_str) != Some("1") {
            return None;
        }
        info.get("result").and_then(Value::as_array)?.first().cloned()
    }

    async fn decimals_via_eth_call(&self, token_address: &str, chain_id: u64) -> Option<u8> {
        let result = self
            .get(&[
                ("module", "proxy".to_owned()),
                ("action", "eth_call".to_owned()),
                ("to", token_address.to_owned()),
                ("data", "0x313ce567".to_owned()),
                ("tag", "latest".to_owned()),
                ("chainid", chain_id.to_string()),
                ("apikey", self.api_key.expose().to_owned()),
            ])
            .await
            .ok()?;
        let hex_result = result.get("result").and_then(Value::as_str)?;
        decimals_from_eth_call_hex(hex_result)
    }

    async fn decimals(&self, token_address: &str, chain_id: u64) -> u8 {
        if let Some(decimals) = self
            .tokeninfo_row(token_address, chain_id)
            .await
            .and_then(|row| row.get("decimals").and_then(Value::as_str).and_then(|s| s.parse::<u8>().ok()))
        {
            return decimals;
        }

        self.decimals_via_eth_call(token_address, chain_id).await.unwrap_or(18)
    }

    #[allow(clippy::too_many_arguments)]
    fn fetch_window<'a>(
        self: &'a Arc<Self>,
        token_address: &'a str,
        chain_id: u64,
        decimals: u8,
        semaphore: Arc<Semaphore>,
        issue_index: u64,
        start_block: u64,
        end_block: u64,
        depth: u8,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<Transfer>> + Send + 'a>> {
        Box::pin(async move {
            let rps = self.limits.requests_per_second.max(1);
            tokio::time::sleep(Duration::from_secs_f64(issue_index as f64 / rps as f64)).await;

            let _permit = semaphore.acquire_owned().await.ok();

            let mut tries = 0u32;
            let mut backoff = Duration::from_millis(500);

            loop {
                let response = self
                    .get(&[
                        ("module", "logs".to_owned()),
                        ("action", "getLogs".to_owned()),
                        ("address", token_address.to_owned()),
                        ("fromBlock", start_block.to_string()),
                        ("toBlock", end_block.to_string()),
                        ("topic0", TRANSFER_TOPIC0.to_owned()),
                        ("chainid", chain_id.to_string()),
                        ("apikey", self.api_key.expose().to_owned()),
                    ])
                    .await;

                let data = match response {
                    Ok(data) => data,
                    Err(_) if tries < 3 => {
                        tries += 1;
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                        continue;
                    }
                    Err(_) => return Vec::new(),
                };

                let status_ok = data.get("status").and_then(Value::as_str) == Some("1");
                let result = data.get("result");

                if status_ok {
                    let Some(logs) = result.and_then(Value::as_array) else {
                        return Vec::new();
                    };

                    if logs.len() >= 1000 && depth < 6 {
                        let mid = (start_block + end_block) / 2;
                        let (left, right) = tokio::join!(
                            self.fetch_window(
                                token_address,
                                chain_id,
                                decimals,
                                semaphore.clone(),
                                issue_index,
                                start_block,
                                mid,
                                depth + 1
                            ),
                            self.fetch_window(
                                token_address,
                                chain_id,
                                decimals,
                                semaphore.clone(),
                                issue_index,
                                mid + 1,
                                end_block,
                                depth + 1
                            )
                        );
                        return left.into_iter().chain(right).collect();
                    }

                    return logs
                        .iter()
                        .filter_map(|log| parse_log(log, decimals))
                        .collect();
                }

                let message = result.and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
                if message.contains("invalid api key") {
                    return Vec::new();
                }
                if (message.contains("log response size exceeded") || message.contains("exceeded"))
                    && depth < 6
                {
                    let mid = (start_block + end_block) / 2;
                    let (left, right) = tokio::join!(
                        self.fetch_window(
                            token_address,
                            chain_id,
                            decimals,
                            semaphore.clone(),
                            issue_index,
                            start_block,
                            mid,
                            depth + 1
                        ),
                        self.fetch_window(
                            token_address,
                            chain_id,
                            decimals,
                            semaphore.clone(),
                            issue_index,
                            mid + 1,
                            end_block,
                            depth + 1
                        )
                    );
                    return left.into_iter().chain(right).collect();
                }
                if message.contains("rate limit") || message.contains("too many") {
                    if tries >= 3 {
                        return Vec::new();
                    }
                    let jitter = rand::thread_rng().gen_range(0.0..0.25);
                    tokio::time::sleep(backoff + Duration::from_secs_f64(jitter)).await;
                    backoff *= 2;
                    tries += 1;
                    continue;
                }

                return Vec::new();
            }
        })
    }

    /// Fallback for when `getLogs` comes back empty: the account-level
    /// transfer-list endpoint, paginated by page number instead of block
    /// range. Used when the chain's log index doesn't cover this token.
    async fn fetch_transfer_list(&self, token_address: &str, chain_id: u64, limit: usize) -> Vec<Transfer> {
        let mut transfers = Vec::new();
        let mut page = 1u32;
        const OFFSET: u32 = 1000;

        loop {
            let response = self
                .get(&[
                    ("module", "account".to_owned()),
                    ("action", "tokentx".to_owned()),
                    ("contractaddress", token_address.to_owned()),
                    ("page", page.to_string()),
                    ("offset", OFFSET.to_string()),
                    ("sort", "desc".to_owned()),
                    ("chainid", chain_id.to_string()),
                    ("apikey", self.api_key.expose().to_owned()),
                ])
                .await;

            let Ok(data) = response else {
                return transfers;
            };

            let message = data.get("result").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
            if message.contains("invalid api key") {
                return transfers;
            }

            let Some(rows) = data.get("result").and_then(Value::as_array) else {
                return transfers;
            };

            let rows_len = rows.len();
            for row in rows {
                if let Some(transfer) = parse_tokentx_row(row) {
                    transfers.push(transfer);
                }
            }

            if rows_len < OFFSET as usize || transfers.len() >= limit {
                return transfers;
            }
            page += 1;
        }
    }
}

fn parse_log(log: &Value, decimals: u8) -> Option<Transfer> {
    let topics = log.get("topics")?.as_array()?;
    if topics.len() < 3 {
        return None;
    }
    let from = address_from_topic(topics[1].as_str()?);
    let to = address_from_topic(topics[2].as_str()?);

    let raw_value_hex = log.get("data")?.as_str()?;
    let raw_value = ethers::types::U256::from_str_radix(raw_value_hex.trim_start_matches("0x"), 16).ok()?;
    let value = raw_value.low_u128() as f64 / 10f64.powi(decimals as i32);

    let timestamp = log
        .get("timeStamp")
        .and_then(Value::as_str)
        .and_then(|ts| {
            ts.strip_prefix("0x")
                .and_then(|hex| i64::from_str_radix(hex, 16).ok())
                .or_else(|| ts.parse::<i64>().ok())
        })
        .unwrap_or(0);

    let block = log
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0);

    Some(Transfer {
        hash: log.get("transactionHash")?.as_str()?.to_owned(),
        from,
        to,
        value,
        timestamp,
        block,
    })
}

fn parse_tokentx_row(row: &Value) -> Option<Transfer> {
    let decimals: u8 = row
        .get("tokenDecimal")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(18);

    let raw_value: u128 = row.get("value")?.as_str()?.parse().ok()?;
    let value = raw_value as f64 / 10f64.powi(decimals as i32);

    let timestamp = row
        .get("timeStamp")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    let block = row
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Some(Transfer {
        hash: row.get("hash")?.as_str()?.to_owned(),
        from: row.get("from")?.as_str()?.to_ascii_lowercase(),
        to: row.get("to")?.as_str()?.to_ascii_lowercase(),
        value,
        timestamp,
        block,
    })
}

/// Builds metadata from a `tokeninfo` result row, given the already-resolved
/// decimals (the row's own `decimals` field, or the eth_call fallback).
fn metadata_from_tokeninfo_row(row: &Value, decimals: u8) -> TokenMetadata {
    TokenMetadata {
        name: row.get("name").and_then(Value::as_str).map(str::to_owned),
        symbol: row.get("symbol").and_then(Value::as_str).map(str::to_owned),
        decimals: Some(decimals),
        total_supply: row
            .get("totalSupply")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u128>().ok())
            .map(|raw| raw as f64 / 10f64.powi(decimals as i32)),
    }
}

#[async_trait]
impl Provider for Arc<EtherscanProvider> {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_transfers(
        &self,
        token_address: &str,
        chain_name: &str,
        limit: usize,
    ) -> Result<Vec<Transfer>, ProviderError> {
        let chain_id = chain::resolve(chain_name).etherscan_chain_id;
        let latest_block = self.latest_block(chain_id).await;
        let decimals = self.decimals(token_address, chain_id).await;

        let max_pages = (limit.div_ceil(1000)).clamp(1, 10) as u64;
        let window = (latest_block / (max_pages * 12).max(1)).clamp(2_000, 10_000);
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent_requests));

        let mut cursor = latest_block;
        let mut tasks = Vec::new();
        for i in 0..max_pages {
            let start = cursor.saturating_sub(window - 1);
            let end = cursor;
            tasks.push(self.fetch_window(
                token_address,
                chain_id,
                decimals,
                semaphore.clone(),
                i + 1,
                start,
                end,
                0,
            ));
            if start == 0 {
                break;
            }
            cursor = start - 1;
        }

        let pages = futures::future::join_all(tasks).await;
        let mut all: Vec<Transfer> = pages.into_iter().flatten().collect();

        if all.is_empty() {
            all = self.fetch_transfer_list(token_address, chain_id, limit).await;
        }

        Ok(dedup_sort_truncate(all, limit))
    }

    async fn fetch_metadata(
        &self,
        token_address: &str,
        chain_name: &str,
    ) -> Result<TokenMetadata, ProviderError> {
        let chain_id = chain::resolve(chain_name).etherscan_chain_id;

        if let Some(row) = self.tokeninfo_row(token_address, chain_id).await {
            let decimals = match row.get("decimals").and_then(Value::as_str).and_then(|s| s.parse::<u8>().ok()) {
                Some(d) => d,
                None => self.decimals_via_eth_call(token_address, chain_id).await.unwrap_or(18),
            };
            return Ok(metadata_from_tokeninfo_row(&row, decimals));
        }

        Ok(TokenMetadata {
            name: None,
            symbol: None,
            decimals: Some(self.decimals(token_address, chain_id).await),
            total_supply: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_transfer_log() {
        let log = json!({
            "topics": [
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "0x000000000000000000000000bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            ],
            "data": "0x0de0b6b3a7640000",
            "timeStamp": "0x64000000",
            "blockNumber": "0x10",
            "transactionHash": "0xdeadbeef",
        });
        let transfer = parse_log(&log, 18).unwrap();
        assert_eq!(transfer.value, 1.0);
        assert_eq!(transfer.block, 16);
    }

    #[test]
    fn rejects_log_missing_topics() {
        let log = json!({"topics": [], "data": "0x0"});
        assert!(parse_log(&log, 18).is_none());
    }

    #[test]
    fn parses_tokentx_row_with_its_own_decimals() {
        let row = json!({
            "hash": "0xabc",
            "from": "0xAAA",
            "to": "0xBBB",
            "value": "1000000",
            "tokenDecimal": "6",
            "timeStamp": "1700000000",
            "blockNumber": "19000000",
        });
        let transfer = parse_tokentx_row(&row).unwrap();
        assert_eq!(transfer.value, 1.0);
        assert_eq!(transfer.block, 19_000_000);
        assert_eq!(transfer.timestamp, 1_700_000_000);
    }

    #[test]
    fn rejects_tokentx_row_missing_value() {
        let row = json!({"hash": "0xabc", "from": "0xAAA", "to": "0xBBB"});
        assert!(parse_tokentx_row(&row).is_none());
    }

    #[test]
    fn metadata_from_tokeninfo_row_extracts_all_fields() {
        let row = json!({
            "symbol": "USDC",
            "name": "USD Coin",
            "decimals": "6",
            "totalSupply": "25000000000000",
        });
        let metadata = metadata_from_tokeninfo_row(&row, 6);
        assert_eq!(metadata.name.as_deref(), Some("USD Coin"));
        assert_eq!(metadata.symbol.as_deref(), Some("USDC"));
        assert_eq!(metadata.decimals, Some(6));
        assert_eq!(metadata.total_supply, Some(25_000_000.0));
    }

    #[test]
    fn metadata_from_tokeninfo_row_tolerates_missing_total_supply() {
        let row = json!({"symbol": "FOO", "name": "Foo Token"});
        let metadata = metadata_from_tokeninfo_row(&row, 18);
        assert_eq!(metadata.total_supply, None);
    }
}
