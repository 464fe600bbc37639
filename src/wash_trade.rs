use std::collections::HashSet;
use std::time::Duration;

use petgraph::visit::EdgeRef;

use crate::graph::WalletGraph;

#[derive(Debug, Clone)]
pub struct WashTradePair {
    pub from: String,
    pub to: String,
    pub transaction_count: u64,
    pub total_volume: f64,
    pub avg_value: f64,
    pub window_seconds: i64,
    pub is_bidirectional: bool,
    pub reverse_count: u64,
    pub reverse_total_volume: f64,
    pub suspicion_reasons: Vec<String>,
    pub risk_level: &'static str,
}

/// Flags wallet pairs whose transfer pattern looks like wash trading:
/// repeated transfers, a bidirectional back-and-forth, or a burst of
/// activity concentrated in a short time window. Pairs touching a
/// whitelisted protocol address (a DEX router, bridge, or known exchange
/// hot wallet) are skipped, since that traffic is routine liquidity flow.
pub fn detect(
    wallet_graph: &WalletGraph,
    protocol_whitelist: &HashSet<String>,
    burst_window: Duration,
) -> Vec<WashTradePair> {
    let graph = &wallet_graph.graph;
    let burst_window_seconds = burst_window.as_secs() as i64;
    let mut pairs = Vec::new();

    for edge in graph.edge_references() {
        let from = &graph[edge.source()].address;
        let to = &graph[edge.target()].address;

        if protocol_whitelist.contains(&from.to_ascii_lowercase())
            || protocol_whitelist.contains(&to.to_ascii_lowercase())
        {
            continue;
        }

        let data = edge.weight();
        let count = data.count;
        let weight = data.weight;
        let window_seconds = (data.max_timestamp - data.min_timestamp).max(0);

        let mut is_suspicious = false;
        let mut reasons = Vec::new();

        if count >= 5 {
            is_suspicious = true;
            reasons.push(format!("{count} repeated transactions"));
        }

        let mut is_bidirectional = false;
        let mut reverse_count = 0u64;
        let mut reverse_weight = 0.0;
        if let Some(reverse_idx) = graph.find_edge(edge.target(), edge.source()) {
            let reverse = &graph[reverse_idx];
            reverse_count = reverse.count;
            reverse_weight = reverse.weight;
            if reverse_count >= 3 && count >= 3 {
                is_suspicious = true;
                is_bidirectional = true;
                reasons.push("bidirectional transfer pattern".to_owned());
            }
        }

        if count >= 3 && window_seconds > 0 && window_seconds <= burst_window_seconds {
            is_suspicious = true;
            let minutes = (window_seconds / 60).max(1);
            if minutes < 120 {
                reasons.push(format!("burst: {count} tx in {minutes} min"));
            } else {
                let hours = window_seconds as f64 / 3600.0;
                reasons.push(format!("burst: {count} tx in {hours:.1} h"));
            }
        }

        if is_suspicious {
            let risk_level = if count >= 10 || (count >= 5 && window_seconds <= burst_window_seconds) {
                "high"
            } else {
                "medium"
            };
            pairs.push(WashTradePair {
                from: from.clone(),
                to: to.clone(),
                transaction_count: count,
                total_volume: weight,
                avg_value: weight / count.max(1) as f64,
                window_seconds,
                is_bidirectional,
                reverse_count,
                reverse_total_volume: reverse_weight,
                suspicion_reasons: reasons,
                risk_level,
            });
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{TokenData, TokenMetadata, Transfer};

    fn burst_graph() -> WalletGraph {
        let transactions = (0..5)
            .map(|i| Transfer {
                hash: format!("tx{i}"),
                from: "a".to_owned(),
                to: "b".to_owned(),
                value: 10.0,
                timestamp: i * 60,
                block: i as u64,
            })
            .collect();
        WalletGraph::build(&TokenData {
            token_address: "0x0".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions,
            all_wallets: vec!["a".to_owned(), "b".to_owned()],
            provider_used: None,
        })
    }

    #[test]
    fn flags_repeated_and_bursty_transfers() {
        let wallet_graph = burst_graph();
        let pairs = detect(&wallet_graph, &HashSet::new(), Duration::from_secs(7200));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].transaction_count, 5);
        assert_eq!(pairs[0].risk_level, "high");
    }

    #[test]
    fn whitelisted_addresses_are_skipped() {
        let wallet_graph = burst_graph();
        let mut whitelist = HashSet::new();
        whitelist.insert("a".to_owned());
        let pairs = detect(&wallet_graph, &whitelist, Duration::from_secs(7200));
        assert!(pairs.is_empty());
    }

    #[test]
    fn bidirectional_pattern_is_flagged() {
        let mut transactions: Vec<Transfer> = (0..3)
            .map(|i| Transfer {
                hash: format!("ab{i}"),
                from: "a".to_owned(),
                to: "b".to_owned(),
                value: 1.0,
                timestamp: i * 10_000,
                block: i as u64,
            })
            .collect();
        transactions.extend((0..3).map(|i| Transfer {
            hash: format!("ba{i}"),
            from: "b".to_owned(),
            to: "a".to_owned(),
            value: 1.0,
            timestamp: i * 10_000,
            block: i as u64,
        }));
        let wallet_graph = WalletGraph::build(&TokenData {
            token_address: "0x0".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions,
            all_wallets: vec!["a".to_owned(), "b".to_owned()],
            provider_used: None,
        });
        let pairs = detect(&wallet_graph, &HashSet::new(), Duration::from_secs(1));
        assert!(pairs.iter().any(|p| p.is_bidirectional));
    }
}
