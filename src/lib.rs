pub mod analyzer;
pub mod cache;
pub mod chain;
pub mod community;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod graph;
pub mod mixer;
pub mod pipeline;
pub mod providers;
pub mod result;
pub mod risk;
pub mod secret;
pub mod transfer;
pub mod wash_trade;

pub use config::Config;
pub use error::AnalysisError;
pub use fetcher::ProviderChoice;
pub use pipeline::{analyze, AnalysisOutcome, AnalysisRequest};
pub use result::AnalysisResult;
