use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{dedup_sort_truncate, Provider};
use crate::chain;
use crate::config::Limits;
use crate::error::ProviderError;
use crate::secret::SecretString;
use crate::transfer::{TokenMetadata, Transfer};

const NAME: &str = "bitquery";
const V2_ENDPOINT: &str = "https://streaming.bitquery.io/graphql";
const V1_ENDPOINT: &str = "https://graphql.bitquery.io";

const QUERY_V2: &str = r#"
query ($token_address: String!, $limit: Int!) {
  EVM(dataset: combined, network: %NETWORK%) {
    Transfers(
      limit: {count: $limit}
      orderBy: {descending: Block_Time}
      where: {Transfer: {Currency: {SmartContract: {is: $token_address}}}}
    ) {
      Block { Time }
      Transaction { Hash }
      Transfer { Sender Receiver Amount Currency { Symbol SmartContract Decimals } }
    }
  }
}
"#;

const QUERY_V1: &str = r#"
query ($token_address: String!, $limit: Int!) {
  ethereum(network: %NETWORK%) {
    transfers(
      options: {desc: "block.timestamp.unixtime", limit: $limit}
      currency: {is: $token_address}
    ) {
      block { timestamp { unixtime } height }
      transaction { hash }
      sender { address }
      receiver { address }
      amount
      currency { symbol decimals }
    }
  }
}
"#;

const METADATA_QUERY_V1: &str = r#"
query ($token_address: String!) {
  ethereum(network: %NETWORK%) {
    address(address: {is: $token_address}) {
      smartContract {
        currency { name symbol decimals }
      }
    }
  }
}
"#;

/// BitQuery's GraphQL API, tried in V2 (streaming) then V1 form.
pub struct BitqueryProvider {
    client: Client,
    access_token: SecretString,
    limits: Limits,
}

impl BitqueryProvider {
    pub fn new(access_token: SecretString, limits: Limits) -> Self {
        Self {
            client: Client::new(),
            access_token,
            limits,
        }
    }

    async fn query(&self, endpoint: &str, query: &str, variables: Value) -> Result<Value, ProviderError> {
        let payload = json!({"query": query, "variables": variables});
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(self.access_token.expose())
            .header("X-API-KEY", self.access_token.expose())
            .json(&payload)
            .timeout(self.limits.request_timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: NAME,
                source,
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Api {
                provider: NAME,
                message: "authentication failed".to_owned(),
            });
        }

        let data: Value = response.json().await.map_err(|source| ProviderError::Request {
            provider: NAME,
            source,
        })?;

        if let Some(errors) = data.get("errors") {
            return Err(ProviderError::Api {
                provider: NAME,
                message: errors.to_string(),
            });
        }

        Ok(data)
    }
}

#[async_trait]
impl Provider for BitqueryProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_transfers(
        &self,
        token_address: &str,
        chain_name: &str,
        limit: usize,
    ) -> Result<Vec<Transfer>, ProviderError> {
        let tokens = chain::resolve(chain_name);
        let variables = json!({"token_address": token_address, "limit": limit.min(10_000)});

        let v2_query = QUERY_V2.replace("%NETWORK%", tokens.bitquery_v2_network);
        if let Ok(data) = self.query(V2_ENDPOINT, &v2_query, variables.clone()).await {
            let raw = data
                .pointer("/data/EVM/Transfers")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if !raw.is_empty() {
                let transfers: Vec<Transfer> = raw.iter().filter_map(parse_v2).collect();
                return Ok(dedup_sort_truncate(transfers, limit));
            }
        }

        let v1_query = QUERY_V1.replace("%NETWORK%", tokens.bitquery_v1_network);
        let data = self.query(V1_ENDPOINT, &v1_query, variables).await?;
        let raw = data
            .pointer("/data/ethereum/transfers")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let transfers: Vec<Transfer> = raw.iter().filter_map(parse_v1).collect();
        Ok(dedup_sort_truncate(transfers, limit))
    }

    async fn fetch_metadata(
        &self,
        token_address: &str,
        chain_name: &str,
    ) -> Result<TokenMetadata, ProviderError> {
        let tokens = chain::resolve(chain_name);
        let query = METADATA_QUERY_V1.replace("%NETWORK%", tokens.bitquery_v1_network);
        let variables = json!({"token_address": token_address});

        let Ok(data) = self.query(V1_ENDPOINT, &query, variables).await else {
            return Ok(unknown_metadata());
        };

        let currency = data.pointer("/data/ethereum/address/0/smartContract/currency");
        let Some(currency) = currency else {
            return Ok(unknown_metadata());
        };

        let name = currency.get("name").and_then(Value::as_str).map(str::to_owned);
        let symbol = currency.get("symbol").and_then(Value::as_str).map(str::to_owned);
        let decimals = currency.get("decimals").and_then(Value::as_u64).map(|d| d as u8);

        if name.is_none() && symbol.is_none() && decimals.is_none() {
            return Ok(unknown_metadata());
        }

        Ok(TokenMetadata {
            name,
            symbol,
            decimals: Some(decimals.unwrap_or(18)),
            total_supply: None,
        })
    }
}

/// Placeholder returned when BitQuery has no currency record for this
/// token, so the fetcher's metadata fallback chain can move on to the
/// next configured provider instead of treating this as informative.
fn unknown_metadata() -> TokenMetadata {
    TokenMetadata {
        name: Some("Token".to_owned()),
        symbol: Some("UNKNOWN".to_owned()),
        decimals: Some(18),
        total_supply: None,
    }
}

fn parse_v2(item: &Value) -> Option<Transfer> {
    let block_time = item.pointer("/Block/Time")?.as_str()?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(block_time)
        .map(|dt| dt.timestamp())
        .unwrap_or(0);

    let decimals = item
        .pointer("/Transfer/Currency/Decimals")
        .and_then(Value::as_u64)
        .unwrap_or(18) as i32;

    let amount_raw: f64 = item
        .pointer("/Transfer/Amount")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .or_else(|| item.pointer("/Transfer/Amount").and_then(Value::as_f64))
        .unwrap_or(0.0);
    let value = amount_raw / 10f64.powi(decimals);

    let from = item.pointer("/Transfer/Sender")?.as_str()?.to_ascii_lowercase();
    let to = item.pointer("/Transfer/Receiver")?.as_str()?.to_ascii_lowercase();
    if from.is_empty() || to.is_empty() {
        return None;
    }

    Some(Transfer {
        hash: item
            .pointer("/Transaction/Hash")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned(),
        from,
        to,
        value,
        timestamp,
        block: 0,
    })
}

fn parse_v1(item: &Value) -> Option<Transfer> {
    let timestamp = item
        .pointer("/block/timestamp/unixtime")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let block = item.pointer("/block/height").and_then(Value::as_u64).unwrap_or(0);
    let decimals = item.pointer("/currency/decimals").and_then(Value::as_u64).unwrap_or(18) as i32;
    let amount = item.get("amount").and_then(Value::as_f64).unwrap_or(0.0);

    let from = item.pointer("/sender/address")?.as_str()?.to_ascii_lowercase();
    let to = item.pointer("/receiver/address")?.as_str()?.to_ascii_lowercase();
    if from.is_empty() || to.is_empty() {
        return None;
    }

    Some(Transfer {
        hash: item
            .pointer("/transaction/hash")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned(),
        from,
        to,
        value: amount / 10f64.powi(decimals),
        timestamp,
        block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_v2_transfer() {
        let item = json!({
            "Block": {"Time": "2024-01-01T00:00:00Z"},
            "Transaction": {"Hash": "0x1"},
            "Transfer": {
                "Sender": "0xAAA",
                "Receiver": "0xBBB",
                "Amount": "1000000000000000000",
                "Currency": {"Decimals": 18},
            },
        });
        let transfer = parse_v2(&item).unwrap();
        assert_eq!(transfer.value, 1.0);
    }

    #[test]
    fn rejects_v1_transfer_without_addresses() {
        let item = json!({"sender": {"address": ""}, "receiver": {"address": "0xBBB"}});
        assert!(parse_v1(&item).is_none());
    }
}
