//! Strategy classifiers
//!
//! Each strategy turns the analysis text into candidate
//! [`ClassificationResult`]s independently of the others. The classifier
//! runs them in a fixed order and wraps each output in a
//! [`StrategyVote`](crate::types::StrategyVote).
//!
//! # Strategies
//! - [`KeywordStrategy`]: per-token store search with weighted field hits
//! - [`DescriptionStrategy`]: Jaccard similarity against code descriptions
//! - [`BusinessNameStrategy`]: fixed category trigger table on the name
//! - [`ExactCodeStrategy`]: literal code lookups for code-shaped tokens

mod business_name;
mod description;
mod exact_code;
mod keyword;

pub use business_name::BusinessNameStrategy;
pub use description::DescriptionStrategy;
pub use exact_code::ExactCodeStrategy;
pub use keyword::KeywordStrategy;

use async_trait::async_trait;
use indclass_common::{CodeType, RequestContext, Result};
use serde::{Deserialize, Serialize};

use crate::text::normalize_text;
use crate::types::ClassificationResult;

/// Normalized input shared by every strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyInput {
    /// Normalized business name (may be empty)
    pub business_name: String,
    /// Normalized concatenation of name, description, website and keywords
    pub analysis_text: String,
    /// Code types the caller wants; never empty
    pub preferred_types: Vec<CodeType>,
}

impl StrategyInput {
    pub fn new(business_name: &str, analysis_text: &str, preferred_types: &[CodeType]) -> Self {
        let preferred_types = if preferred_types.is_empty() {
            CodeType::ALL.to_vec()
        } else {
            preferred_types.to_vec()
        };

        Self {
            business_name: normalize_text(business_name),
            analysis_text: normalize_text(analysis_text),
            preferred_types,
        }
    }

    pub fn prefers(&self, code_type: CodeType) -> bool {
        self.preferred_types.contains(&code_type)
    }
}

/// Output of one strategy run
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    pub results: Vec<ClassificationResult>,
    /// Raw candidates inspected before thresholding
    pub candidates_found: usize,
}

/// Prior weight of each strategy in the consensus stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub keyword: f64,
    pub description: f64,
    pub business_name: f64,
    pub exact_code: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            keyword: 0.9,
            description: 0.7,
            business_name: 0.8,
            exact_code: 1.0,
        }
    }
}

/// A single classification strategy
///
/// Implementations read from the code store only; they never write.
/// Errors are store or context errors; the classifier logs them and
/// treats the strategy as having cast no votes.
#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    /// Stable strategy name, used as the vote name and performance key
    fn name(&self) -> &'static str;

    /// Prior weight of this strategy's vote
    fn weight(&self) -> f64;

    async fn classify(&self, ctx: &RequestContext, input: &StrategyInput) -> Result<StrategyOutput>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_normalizes_and_defaults_types() {
        let input = StrategyInput::new("Joe's Pizza", "Joe's Pizza, family-run!", &[]);
        assert_eq!(input.business_name, "joe s pizza");
        assert_eq!(input.analysis_text, "joe s pizza family run");
        assert_eq!(input.preferred_types, CodeType::ALL.to_vec());
        assert!(input.prefers(CodeType::Mcc));
    }

    #[test]
    fn test_input_respects_preferred_types() {
        let input = StrategyInput::new("", "pizza", &[CodeType::Sic]);
        assert!(input.prefers(CodeType::Sic));
        assert!(!input.prefers(CodeType::Naics));
    }
}
