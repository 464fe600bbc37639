use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::transfer::TokenData;

#[derive(Debug, Clone, Default)]
pub struct WalletNode {
    pub address: String,
    pub balance: f64,
    pub transaction_count: u64,
    pub is_top_holder: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TransferEdge {
    pub weight: f64,
    pub count: u64,
    pub tx_hash: String,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

/// Directed wallet graph: nodes are addresses involved in the fetched
/// transfer window, edges aggregate every transfer between a pair of
/// addresses (summed volume, count, and the timestamp span covered).
pub struct WalletGraph {
    pub graph: DiGraph<WalletNode, TransferEdge>,
    pub index_of: HashMap<String, NodeIndex>,
}

impl WalletGraph {
    pub fn build(token_data: &TokenData) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        let top_holders: HashMap<&str, &crate::transfer::Holder> = token_data
            .top_holders
            .iter()
            .map(|h| (h.address.as_str(), h))
            .collect();

        for wallet in &token_data.all_wallets {
            let holder = top_holders.get(wallet.as_str());
            let node = WalletNode {
                address: wallet.clone(),
                balance: holder.map_or(0.0, |h| h.balance),
                transaction_count: holder.map_or(0, |h| h.transaction_count),
                is_top_holder: holder.is_some(),
            };
            let idx = graph.add_node(node);
            index_of.insert(wallet.clone(), idx);
        }

        let mut ensure_node = |graph: &mut DiGraph<WalletNode, TransferEdge>,
                                index_of: &mut HashMap<String, NodeIndex>,
                                address: &str| {
            *index_of.entry(address.to_owned()).or_insert_with(|| {
                graph.add_node(WalletNode {
                    address: address.to_owned(),
                    ..Default::default()
                })
            })
        };

        for tx in &token_data.transactions {
            if tx.from.is_empty() || tx.to.is_empty() {
                continue;
            }

            let from_idx = ensure_node(&mut graph, &mut index_of, &tx.from);
            let to_idx = ensure_node(&mut graph, &mut index_of, &tx.to);

            if let Some(edge_idx) = graph.find_edge(from_idx, to_idx) {
                let edge = &mut graph[edge_idx];
                edge.weight += tx.value;
                edge.count += 1;
                edge.min_timestamp = edge.min_timestamp.min(tx.timestamp);
                edge.max_timestamp = edge.max_timestamp.max(tx.timestamp);
            } else {
                graph.add_edge(
                    from_idx,
                    to_idx,
                    TransferEdge {
                        weight: tx.value,
                        count: 1,
                        tx_hash: tx.hash.clone(),
                        min_timestamp: tx.timestamp,
                        max_timestamp: tx.timestamp,
                    },
                );
            }
        }

        Self { graph, index_of }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn density(&self) -> f64 {
        let n = self.node_count() as f64;
        if n <= 1.0 {
            return 0.0;
        }
        self.edge_count() as f64 / (n * (n - 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{Holder, TokenMetadata, Transfer};

    fn sample_data() -> TokenData {
        TokenData {
            token_address: "0xtoken".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![Holder {
                address: "a".to_owned(),
                balance: 100.0,
                transaction_count: 2,
            }],
            transactions: vec![
                Transfer {
                    hash: "0x1".to_owned(),
                    from: "a".to_owned(),
                    to: "b".to_owned(),
                    value: 10.0,
                    timestamp: 100,
                    block: 1,
                },
                Transfer {
                    hash: "0x2".to_owned(),
                    from: "a".to_owned(),
                    to: "b".to_owned(),
                    value: 5.0,
                    timestamp: 200,
                    block: 2,
                },
            ],
            all_wallets: vec!["a".to_owned(), "b".to_owned()],
            provider_used: Some("alchemy"),
        }
    }

    #[test]
    fn repeated_transfers_aggregate_into_one_edge() {
        let wallet_graph = WalletGraph::build(&sample_data());
        assert_eq!(wallet_graph.node_count(), 2);
        assert_eq!(wallet_graph.edge_count(), 1);

        let a = wallet_graph.index_of["a"];
        let b = wallet_graph.index_of["b"];
        let edge = wallet_graph.graph[wallet_graph.graph.find_edge(a, b).unwrap()].clone();
        assert_eq!(edge.count, 2);
        assert_eq!(edge.weight, 15.0);
        assert_eq!(edge.min_timestamp, 100);
        assert_eq!(edge.max_timestamp, 200);
    }

    #[test]
    fn top_holder_flag_is_set_from_holder_list() {
        let wallet_graph = WalletGraph::build(&sample_data());
        let a = wallet_graph.graph[wallet_graph.index_of["a"]].clone();
        assert!(a.is_top_holder);
        assert_eq!(a.balance, 100.0);
    }
}
