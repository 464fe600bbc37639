use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::warn;

use crate::graph::WalletGraph;

/// Community-detection mode requested by the caller. Leiden is not
/// available anywhere in this dependency stack, so both modes run the same
/// greedy-modularity (Louvain-style) optimizer; `Auto` only changes which
/// label is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityMode {
    Auto,
    Leiden,
    Louvain,
}

impl CommunityMode {
    pub fn label(self, node_count: usize, edge_count: usize) -> &'static str {
        match self {
            Self::Leiden => "leiden",
            Self::Louvain => "louvain",
            Self::Auto if node_count < 400 && edge_count < 2000 => "louvain",
            Self::Auto => "leiden",
        }
    }
}

/// Detects communities via single-level greedy modularity optimization
/// (the core move of the Louvain method, without the coarsening/aggregation
/// phase): each node starts in its own community and repeatedly moves to
/// whichever neighboring community yields the largest modularity gain,
/// until a full pass makes no move.
pub fn detect(wallet_graph: &WalletGraph) -> HashMap<usize, Vec<String>> {
    let graph = &wallet_graph.graph;
    let n = graph.node_count();
    if n < 2 {
        return HashMap::new();
    }

    let mut degree: HashMap<NodeIndex, f64> = HashMap::new();
    let mut total_weight = 0.0;

    for edge in graph.edge_references() {
        let w = edge.weight().count as f64;
        *degree.entry(edge.source()).or_insert(0.0) += w;
        *degree.entry(edge.target()).or_insert(0.0) += w;
        total_weight += w;
    }
    if total_weight == 0.0 {
        warn!(
            node_count = n,
            edge_count = graph.edge_count(),
            "no weighted edges in wallet graph, degrading to singleton communities"
        );
        return singleton_communities(wallet_graph);
    }
    let m2 = 2.0 * total_weight;

    let mut community: HashMap<NodeIndex, usize> =
        graph.node_indices().enumerate().map(|(i, idx)| (idx, i)).collect();
    let mut community_degree: HashMap<usize, f64> = HashMap::new();
    for (&node, &community_id) in &community {
        *community_degree.entry(community_id).or_insert(0.0) += *degree.get(&node).unwrap_or(&0.0);
    }

    let mut improved = true;
    let mut passes = 0;
    while improved && passes < 50 {
        improved = false;
        passes += 1;

        for node in graph.node_indices() {
            let current_community = community[&node];
            let node_degree = *degree.get(&node).unwrap_or(&0.0);

            let mut weight_to: HashMap<usize, f64> = HashMap::new();
            for edge in graph.edges(node) {
                let neighbor = edge.target();
                let neighbor_community = community[&neighbor];
                *weight_to.entry(neighbor_community).or_insert(0.0) += edge.weight().count as f64;
            }
            for edge in graph.edges_directed(node, petgraph::Direction::Incoming) {
                let neighbor = edge.source();
                let neighbor_community = community[&neighbor];
                *weight_to.entry(neighbor_community).or_insert(0.0) += edge.weight().count as f64;
            }

            *community_degree.get_mut(&current_community).unwrap() -= node_degree;

            let mut best_community = current_community;
            let mut best_gain = weight_to.get(&current_community).copied().unwrap_or(0.0)
                - node_degree * community_degree.get(&current_community).copied().unwrap_or(0.0) / m2;

            for (&candidate, &w) in &weight_to {
                if candidate == current_community {
                    continue;
                }
                let gain = w
                    - node_degree * community_degree.get(&candidate).copied().unwrap_or(0.0) / m2;
                if gain > best_gain {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            *community_degree.entry(best_community).or_insert(0.0) += node_degree;
            if best_community != current_community {
                community.insert(node, best_community);
                improved = true;
            }
        }
    }

    let mut out: HashMap<usize, Vec<String>> = HashMap::new();
    for (node, community_id) in community {
        out.entry(community_id)
            .or_default()
            .push(graph[node].address.clone());
    }
    out
}

fn singleton_communities(wallet_graph: &WalletGraph) -> HashMap<usize, Vec<String>> {
    wallet_graph
        .graph
        .node_indices()
        .enumerate()
        .map(|(i, idx)| (i, vec![wallet_graph.graph[idx].address.clone()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{TokenData, TokenMetadata, Transfer};

    fn two_tight_clusters() -> TokenData {
        let mut transactions = Vec::new();
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "a")] {
            transactions.push(Transfer {
                hash: format!("{from}{to}"),
                from: from.to_owned(),
                to: to.to_owned(),
                value: 1.0,
                timestamp: 0,
                block: 0,
            });
        }
        for (from, to) in [("x", "y"), ("y", "z"), ("z", "x")] {
            transactions.push(Transfer {
                hash: format!("{from}{to}"),
                from: from.to_owned(),
                to: to.to_owned(),
                value: 1.0,
                timestamp: 0,
                block: 0,
            });
        }
        transactions.push(Transfer {
            hash: "bridge".to_owned(),
            from: "a".to_owned(),
            to: "x".to_owned(),
            value: 0.01,
            timestamp: 0,
            block: 0,
        });

        TokenData {
            token_address: "0xtoken".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions,
            all_wallets: vec!["a", "b", "c", "x", "y", "z"].into_iter().map(str::to_owned).collect(),
            provider_used: None,
        }
    }

    #[test]
    fn tightly_connected_triangles_land_in_separate_communities() {
        let wallet_graph = WalletGraph::build(&two_tight_clusters());
        let communities = detect(&wallet_graph);

        let mut membership: HashMap<&str, usize> = HashMap::new();
        for (&community_id, wallets) in &communities {
            for wallet in wallets {
                membership.insert(wallet.as_str(), community_id);
            }
        }

        assert_eq!(membership["a"], membership["b"]);
        assert_eq!(membership["b"], membership["c"]);
        assert_ne!(membership["a"], membership["x"]);
    }

    #[test]
    fn empty_graph_has_no_communities() {
        let empty = TokenData {
            token_address: "0x0".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions: vec![],
            all_wallets: vec![],
            provider_used: None,
        };
        let wallet_graph = WalletGraph::build(&empty);
        assert!(detect(&wallet_graph).is_empty());
    }

    #[test]
    fn label_picks_louvain_for_small_graphs() {
        assert_eq!(CommunityMode::Auto.label(10, 10), "louvain");
        assert_eq!(CommunityMode::Auto.label(1000, 5000), "leiden");
    }
}
