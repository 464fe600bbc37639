use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::transfer::TokenData;

struct Entry {
    value: TokenData,
    inserted_at: Instant,
}

/// LRU + TTL cache for fetched token data, keyed by `"{chain}:{address}"`.
///
/// A cached entry whose `transactions` list is empty is treated as a miss on
/// lookup, so a prior failed fetch never sticks around and blocks a retry.
pub struct TokenCache {
    entries: Mutex<IndexMap<String, Entry>>,
    ttl: Duration,
    max_items: usize,
}

impl TokenCache {
    pub fn new(ttl: Duration, max_items: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl,
            max_items,
        }
    }

    pub fn key(chain: &str, token_address: &str) -> String {
        format!("{}:{}", chain, token_address.to_ascii_lowercase())
    }

    pub async fn get(&self, key: &str) -> Option<TokenData> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(key) else {
            return None;
        };

        if entry.inserted_at.elapsed() > self.ttl {
            entries.shift_remove(key);
            return None;
        }

        if entry.value.transactions.is_empty() {
            return None;
        }

        let value = entry.value.clone();
        entries.shift_remove(key);
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.clone(),
                inserted_at: Instant::now(),
            },
        );
        Some(value)
    }

    pub async fn set(&self, key: String, value: TokenData) {
        let mut entries = self.entries.lock().await;
        entries.shift_remove(&key);
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        while entries.len() > self.max_items {
            entries.shift_remove_index(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TokenMetadata;

    fn sample(transactions: Vec<crate::transfer::Transfer>) -> TokenData {
        TokenData {
            token_address: "0xabc".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions,
            all_wallets: vec![],
            provider_used: None,
        }
    }

    fn transfer() -> crate::transfer::Transfer {
        crate::transfer::Transfer {
            hash: "0x1".to_owned(),
            from: "0xa".to_owned(),
            to: "0xb".to_owned(),
            value: 1.0,
            timestamp: 0,
            block: 1,
        }
    }

    #[tokio::test]
    async fn hit_returns_cached_value() {
        let cache = TokenCache::new(Duration::from_secs(60), 10);
        let key = TokenCache::key("ethereum", "0xABC");
        cache.set(key.clone(), sample(vec![transfer()])).await;

        let hit = cache.get(&key).await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn empty_result_is_treated_as_a_miss() {
        let cache = TokenCache::new(Duration::from_secs(60), 10);
        let key = TokenCache::key("ethereum", "0xabc");
        cache.set(key.clone(), sample(vec![])).await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_evicted() {
        let cache = TokenCache::new(Duration::from_millis(1), 10);
        let key = TokenCache::key("ethereum", "0xabc");
        cache.set(key.clone(), sample(vec![transfer()])).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn oldest_entry_is_evicted_past_capacity() {
        let cache = TokenCache::new(Duration::from_secs(60), 1);
        cache
            .set("a".to_owned(), sample(vec![transfer()]))
            .await;
        cache
            .set("b".to_owned(), sample(vec![transfer()]))
            .await;

        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }
}
