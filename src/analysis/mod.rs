pub mod analyzer;
pub mod result;

pub use analyzer::{Analyze, ChatAnalyzer};
pub use result::{
    extract_analysis, AnalysisResult, FEEDING_KEYS, MEASUREMENT_KEYS, RELATIONSHIP_KEYS,
};
