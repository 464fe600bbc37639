use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::analyzer::AnalyzerResult;
use crate::graph::WalletGraph;
use crate::mixer::MixerFlag;
use crate::risk::RiskAssessment;
use crate::wash_trade::WashTradePair;

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub group: usize,
    pub pagerank: f64,
    pub is_mixer: bool,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub count: u64,
    pub is_wash_trade: bool,
}

/// Force-directed-graph-shaped view of the wallet graph, for downstream
/// visualization (React Force Graph or similar consumers).
#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

pub fn to_graph_data(
    wallet_graph: &WalletGraph,
    analyzer: &AnalyzerResult,
    mixer_flags: &[MixerFlag],
    wash_trade_pairs: &[WashTradePair],
) -> GraphData {
    let mut community_of: HashMap<&str, usize> = HashMap::new();
    for (&cluster_id, wallets) in &analyzer.communities {
        for wallet in wallets {
            community_of.insert(wallet.as_str(), cluster_id);
        }
    }

    let mixer_of: HashMap<&str, bool> = mixer_flags
        .iter()
        .map(|f| (f.address.as_str(), f.is_mixer))
        .collect();

    let nodes = wallet_graph
        .graph
        .node_weights()
        .map(|node| GraphNode {
            id: node.address.clone(),
            group: community_of.get(node.address.as_str()).copied().unwrap_or(0),
            pagerank: round4(analyzer.pagerank.get(&node.address).copied().unwrap_or(0.0)),
            is_mixer: mixer_of.get(node.address.as_str()).copied().unwrap_or(false),
            balance: node.balance,
        })
        .collect();

    let wash_trade_set: HashSet<(&str, &str)> = wash_trade_pairs
        .iter()
        .map(|p| (p.from.as_str(), p.to.as_str()))
        .collect();

    let links = wallet_graph
        .graph
        .edge_indices()
        .map(|edge_idx| {
            let (source_idx, target_idx) = wallet_graph.graph.edge_endpoints(edge_idx).unwrap();
            let source = &wallet_graph.graph[source_idx].address;
            let target = &wallet_graph.graph[target_idx].address;
            let edge = &wallet_graph.graph[edge_idx];
            GraphLink {
                source: source.clone(),
                target: target.clone(),
                value: edge.weight,
                count: edge.count,
                is_wash_trade: wash_trade_set.contains(&(source.as_str(), target.as_str())),
            }
        })
        .collect();

    GraphData { nodes, links }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Full result of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub token_address: String,
    pub chain: String,
    pub risk_score: f64,
    pub risk_components: RiskComponentsView,
    pub reasoning: Vec<String>,
    pub confidence: String,
    pub data_quality: DataQualityView,
    pub gini: f64,
    pub community_algorithm: &'static str,
    pub communities: HashMap<usize, Vec<String>>,
    pub top_holders: Vec<TopHolderView>,
    pub suspicious_clusters: Vec<SuspiciousClusterView>,
    pub wash_trade_pairs: Vec<WashTradePairView>,
    pub mixer_flags: Vec<MixerFlagView>,
    pub graph: GraphData,
    pub provider_used: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskComponentsView {
    pub gini: f64,
    pub mixer: f64,
    pub wash_trade: f64,
    pub cluster: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataQualityView {
    pub transaction_count: usize,
    pub time_span_days: f64,
    pub wallet_count: usize,
    pub sufficient_data: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopHolderView {
    pub address: String,
    pub balance: f64,
    pub pagerank: f64,
    pub degree: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousClusterView {
    pub cluster_id: usize,
    pub wallets: Vec<String>,
    pub size: usize,
    pub density: f64,
    pub external_connections: usize,
    pub risk_level: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WashTradePairView {
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

#[derive(Debug, Clone, Serialize)]
pub struct MixerFlagView {
    pub address: String,
    pub is_mixer: bool,
    pub mixer_type: Option<&'static str>,
}

pub fn build(
    token_address: &str,
    chain: &str,
    wallet_graph: &WalletGraph,
    analyzer: AnalyzerResult,
    mixer_flags: Vec<MixerFlag>,
    wash_trade_pairs: Vec<WashTradePair>,
    risk: RiskAssessment,
    provider_used: Option<&'static str>,
) -> AnalysisResult {
    let graph = to_graph_data(wallet_graph, &analyzer, &mixer_flags, &wash_trade_pairs);

    AnalysisResult {
        token_address: token_address.to_owned(),
        chain: chain.to_owned(),
        risk_score: round3(risk.risk_score),
        risk_components: RiskComponentsView {
            gini: risk.components.gini,
            mixer: risk.components.mixer,
            wash_trade: risk.components.wash_trade,
            cluster: risk.components.cluster,
        },
        reasoning: risk.reasoning,
        confidence: risk.confidence.to_string(),
        data_quality: DataQualityView {
            transaction_count: risk.data_quality.transaction_count,
            time_span_days: risk.data_quality.time_span_days,
            wallet_count: risk.data_quality.wallet_count,
            sufficient_data: risk.data_quality.sufficient_data,
        },
        gini: analyzer.gini,
        community_algorithm: analyzer.community_algorithm,
        communities: analyzer.communities,
        top_holders: analyzer
            .top_holders
            .into_iter()
            .map(|h| TopHolderView {
                address: h.address,
                balance: h.balance,
                pagerank: round4(h.pagerank),
                degree: h.degree,
            })
            .collect(),
        suspicious_clusters: analyzer
            .suspicious_clusters
            .into_iter()
            .map(|c| SuspiciousClusterView {
                cluster_id: c.cluster_id,
                wallets: c.wallets,
                size: c.size,
                density: round3(c.density),
                external_connections: c.external_connections,
                risk_level: c.risk_level,
            })
            .collect(),
        wash_trade_pairs: wash_trade_pairs
            .into_iter()
            .map(|p| WashTradePairView {
                from: p.from,
                to: p.to,
                transaction_count: p.transaction_count,
                total_volume: p.total_volume,
                avg_value: p.avg_value,
                window_seconds: p.window_seconds,
                is_bidirectional: p.is_bidirectional,
                reverse_count: p.reverse_count,
                reverse_total_volume: p.reverse_total_volume,
                suspicion_reasons: p.suspicion_reasons,
                risk_level: p.risk_level,
            })
            .collect(),
        mixer_flags: mixer_flags
            .into_iter()
            .map(|f| MixerFlagView {
                address: f.address,
                is_mixer: f.is_mixer,
                mixer_type: f.mixer_type,
            })
            .collect(),
        graph,
        provider_used,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::community::CommunityMode;
    use crate::config::RiskWeights;
    use crate::transfer::{TokenData, TokenMetadata};
    use crate::{analyzer, mixer, risk, wash_trade};

    /// Scenario 1: a token with zero fetched transfers should still produce
    /// a successful, near-empty result rather than an error.
    #[test]
    fn empty_transfers_produce_a_zero_valued_success_result() {
        let token_data = TokenData {
            token_address: "0xtoken".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions: vec![],
            all_wallets: vec![],
            provider_used: None,
        };

        let wallet_graph = WalletGraph::build(&token_data);
        let analyzer_result = analyzer::analyze(&wallet_graph, CommunityMode::Auto, 50);
        let wash_trade_pairs = wash_trade::detect(&wallet_graph, &HashSet::new(), std::time::Duration::from_secs(7200));
        let mixer_flags = mixer::flag(&token_data.all_wallets, &HashSet::new());
        let risk_assessment = risk::score(
            &RiskWeights::default(),
            &analyzer_result,
            &mixer_flags,
            &wash_trade_pairs,
            100_000.0,
            &token_data,
        );

        let result = build(
            &token_data.token_address,
            &token_data.chain,
            &wallet_graph,
            analyzer_result,
            mixer_flags,
            wash_trade_pairs,
            risk_assessment,
            None,
        );

        assert!(result.top_holders.is_empty());
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.gini, 0.0);
        assert_eq!(result.confidence, "low");
        assert!(!result.data_quality.sufficient_data);
    }
}
