use serde::{Deserialize, Serialize};

/// A single ERC20 `Transfer` event, normalized across providers.
///
/// `value` is already scaled by the token's decimals (i.e. a human-readable
/// amount, not a raw integer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub timestamp: i64,
    pub block: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holder {
    pub address: String,
    pub balance: f64,
    pub transaction_count: u64,
}

/// Everything ingested for one token before graph construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenData {
    pub token_address: String,
    pub chain: String,
    pub metadata: TokenMetadata,
    pub top_holders: Vec<Holder>,
    pub transactions: Vec<Transfer>,
    pub all_wallets: Vec<String>,
    pub provider_used: Option<&'static str>,
}

impl TokenData {
    pub fn total_transactions_fetched(&self) -> usize {
        self.transactions.len()
    }
}
