use crate::analyzer::AnalyzerResult;
use crate::config::RiskWeights;
use crate::mixer::MixerFlag;
use crate::transfer::TokenData;
use crate::wash_trade::WashTradePair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DataQuality {
    pub transaction_count: usize,
    pub time_span_days: f64,
    pub wallet_count: usize,
    pub sufficient_data: bool,
}

#[derive(Debug, Clone)]
pub struct RiskComponents {
    pub gini: f64,
    pub mixer: f64,
    pub wash_trade: f64,
    pub cluster: f64,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub components: RiskComponents,
    pub reasoning: Vec<String>,
    pub confidence: Confidence,
    pub data_quality: DataQuality,
}

/// Weighted risk score in `[0.0, 1.0]`, combining holder concentration
/// (Gini), mixer exposure, wash-trade volume, and suspicious-cluster size.
pub fn score(
    weights: &RiskWeights,
    analyzer: &AnalyzerResult,
    mixer_flags: &[MixerFlag],
    wash_trade_pairs: &[WashTradePair],
    volume_normalizer: f64,
    token_data: &TokenData,
) -> RiskAssessment {
    let mut reasoning = Vec::new();

    let gini_score = analyzer.gini.min(1.0);
    reasoning.push(format!("centralization (gini): {:.3}", analyzer.gini));
    if analyzer.gini > 0.9 {
        reasoning.push("dangerously centralized (gini > 0.9)".to_owned());
    }

    let mixer_score = mixer_score(mixer_flags);
    if mixer_score > 0.0 {
        let count = mixer_flags.iter().filter(|f| f.is_mixer).count();
        reasoning.push(format!("mixer connections: {count} addresses linked"));
    }

    let (wash_trade_score, wash_context) =
        wash_trade_score(wash_trade_pairs, token_data, volume_normalizer);
    if wash_trade_score > 0.0 {
        reasoning.push(wash_context);
    }

    let cluster_score = cluster_score(analyzer);
    if cluster_score > 0.0 {
        let total_wallets: usize = analyzer.suspicious_clusters.iter().map(|c| c.size).sum();
        reasoning.push(format!("suspicious clusters: {total_wallets} wallets involved"));
    }

    let risk_score = (weights.gini * gini_score
        + weights.mixer * mixer_score
        + weights.wash_trade * wash_trade_score
        + weights.cluster * cluster_score)
        .min(1.0);

    let (confidence, data_quality) = compute_confidence(token_data);

    RiskAssessment {
        risk_score,
        components: RiskComponents {
            gini: gini_score,
            mixer: mixer_score,
            wash_trade: wash_trade_score,
            cluster: cluster_score,
        },
        reasoning,
        confidence,
        data_quality,
    }
}

fn mixer_score(mixer_flags: &[MixerFlag]) -> f64 {
    if mixer_flags.is_empty() {
        return 0.0;
    }
    let count = mixer_flags.iter().filter(|f| f.is_mixer).count();
    (count as f64 / mixer_flags.len() as f64).min(1.0)
}

fn wash_trade_score(
    pairs: &[WashTradePair],
    token_data: &TokenData,
    volume_normalizer: f64,
) -> (f64, String) {
    if pairs.is_empty() {
        return (0.0, String::new());
    }

    let pair_count = pairs.len();
    let total_suspicious_volume: f64 = pairs.iter().map(|p| p.total_volume).sum();
    let high_burst_pairs = pairs
        .iter()
        .filter(|p| p.window_seconds > 0 && p.transaction_count >= 5)
        .count();

    let total_transferred_volume: f64 = token_data.transactions.iter().map(|t| t.value).sum();
    let wallet_count = token_data.all_wallets.len();

    let normalizer = if total_transferred_volume > 0.0 {
        total_transferred_volume
    } else {
        volume_normalizer.max(1.0)
    };
    let volume_component = (total_suspicious_volume / normalizer).min(1.0);

    let denom_pairs = (wallet_count as f64 / 50.0).max(10.0);
    let count_component = (pair_count as f64 / denom_pairs).min(1.0);

    let burst_bonus = (high_burst_pairs as f64 / 10.0).min(0.3);
    let raw_score = (0.3 * count_component + 0.7 * volume_component + burst_bonus).min(1.0);

    let diversity_scale = if wallet_count >= 5000 {
        0.5
    } else if wallet_count >= 2000 {
        0.7
    } else if wallet_count >= 1000 {
        0.85
    } else {
        1.0
    };
    let score = (raw_score * diversity_scale).min(1.0);

    let mut context = format!(
        "wash trading: {pair_count} suspicious pairs, suspicious volume ~{:.0}",
        total_suspicious_volume
    );
    if total_transferred_volume > 0.0 {
        context.push_str(&format!(" of {total_transferred_volume:.0} total"));
    }
    if high_burst_pairs > 0 {
        context.push_str(&format!(", {high_burst_pairs} pairs in burst"));
    }
    if wallet_count > 0 {
        context.push_str(&format!(", diversity-normalized (wallets={wallet_count})"));
    }

    (score, context)
}

fn cluster_score(analyzer: &AnalyzerResult) -> f64 {
    if analyzer.suspicious_clusters.is_empty() {
        return 0.0;
    }
    let total_wallets: usize = analyzer.suspicious_clusters.iter().map(|c| c.size).sum();
    (total_wallets as f64 / 20.0).min(1.0)
}

fn compute_confidence(token_data: &TokenData) -> (Confidence, DataQuality) {
    let transactions = &token_data.transactions;
    let wallets = &token_data.all_wallets;

    let timestamps: Vec<i64> = transactions.iter().map(|t| t.timestamp).filter(|&t| t > 0).collect();
    let time_span_days = match (timestamps.iter().min(), timestamps.iter().max()) {
        (Some(&min), Some(&max)) => ((max - min).max(0) as f64) / 86_400.0,
        _ => 0.0,
    };

    let sufficient_data = transactions.len() >= 100 && time_span_days >= 7.0;
    let confidence = if transactions.len() >= 1000 && time_span_days >= 30.0 {
        Confidence::High
    } else if sufficient_data {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    (
        confidence,
        DataQuality {
            transaction_count: transactions.len(),
            time_span_days,
            wallet_count: wallets.len(),
            sufficient_data,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TokenMetadata;

    fn empty_token_data() -> TokenData {
        TokenData {
            token_address: "0x0".to_owned(),
            chain: "ethereum".to_owned(),
            metadata: TokenMetadata::default(),
            top_holders: vec![],
            transactions: vec![],
            all_wallets: vec![],
            provider_used: None,
        }
    }

    fn empty_analyzer() -> AnalyzerResult {
        AnalyzerResult {
            pagerank: Default::default(),
            gini: 0.0,
            communities: Default::default(),
            community_algorithm: "louvain",
            suspicious_clusters: vec![],
            top_holders: vec![],
        }
    }

    #[test]
    fn score_is_zero_with_no_signals() {
        let weights = RiskWeights::default();
        let assessment = score(&weights, &empty_analyzer(), &[], &[], 100_000.0, &empty_token_data());
        assert_eq!(assessment.risk_score, 0.0);
        assert_eq!(assessment.confidence, Confidence::Low);
    }

    #[test]
    fn mixer_exposure_raises_the_score() {
        let weights = RiskWeights::default();
        let flags = vec![MixerFlag {
            address: "0xa".to_owned(),
            is_mixer: true,
            mixer_type: Some("Tornado Cash"),
        }];
        let assessment = score(&weights, &empty_analyzer(), &flags, &[], 100_000.0, &empty_token_data());
        assert!(assessment.risk_score > 0.0);
        assert_eq!(assessment.components.mixer, 1.0);
    }

    #[test]
    fn score_is_capped_at_one() {
        let mut weights = RiskWeights::default();
        weights.gini = 1.0;
        weights.mixer = 1.0;
        weights.wash_trade = 1.0;
        weights.cluster = 1.0;
        let mut analyzer = empty_analyzer();
        analyzer.gini = 1.0;
        let flags = vec![MixerFlag {
            address: "0xa".to_owned(),
            is_mixer: true,
            mixer_type: Some("Tornado Cash"),
        }];
        let assessment = score(&weights, &analyzer, &flags, &[], 100_000.0, &empty_token_data());
        assert!(assessment.risk_score <= 1.0);
    }
}
