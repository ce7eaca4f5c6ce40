//! Description similarity strategy
//!
//! Compares the keyword set of the request with the keyword set of every
//! code description of each preferred type (Jaccard). Confidence is
//! `similarity * 0.8`; only similarities above 0.2 are kept.

use async_trait::async_trait;
use indclass_common::{CodeStore, RequestContext, Result};
use std::sync::Arc;
use tracing::debug;

use super::{ClassificationStrategy, StrategyInput, StrategyOutput};
use crate::text::{extract_keywords, jaccard_similarity};
use crate::types::{merge_results, ClassificationResult};

/// Codes pulled per type
const CODES_PER_TYPE: usize = 1000;
const MIN_SIMILARITY: f64 = 0.2;
const SIMILARITY_SCALE: f64 = 0.8;

pub struct DescriptionStrategy {
    store: Arc<dyn CodeStore>,
    weight: f64,
}

impl DescriptionStrategy {
    pub fn new(store: Arc<dyn CodeStore>, weight: f64) -> Self {
        Self { store, weight }
    }
}

#[async_trait]
impl ClassificationStrategy for DescriptionStrategy {
    fn name(&self) -> &'static str {
        "description"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn classify(&self, ctx: &RequestContext, input: &StrategyInput) -> Result<StrategyOutput> {
        let query_tokens = extract_keywords(&input.analysis_text);
        if query_tokens.is_empty() {
            return Ok(StrategyOutput::default());
        }

        let mut results = Vec::new();
        let mut candidates_found = 0;

        for &code_type in &input.preferred_types {
            let codes = self
                .store
                .get_codes_by_type(ctx, code_type, CODES_PER_TYPE, 0)
                .await?;
            candidates_found += codes.len();

            for code in codes {
                let description_tokens = extract_keywords(&code.description);
                let similarity = jaccard_similarity(&query_tokens, &description_tokens);
                if similarity <= MIN_SIMILARITY {
                    continue;
                }

                let shared: Vec<&String> = description_tokens
                    .iter()
                    .filter(|t| query_tokens.contains(t))
                    .collect();
                let mut result = ClassificationResult::new(
                    code,
                    similarity * SIMILARITY_SCALE,
                    "description",
                    self.weight,
                )
                .with_reason(format!("description similarity {:.2}", similarity));
                for token in shared {
                    result.add_matched_on(token.clone());
                }
                results.push(result);
            }
        }

        let results = merge_results(results);
        debug!(
            candidates_found,
            results = results.len(),
            "Description strategy complete"
        );

        Ok(StrategyOutput {
            results,
            candidates_found,
        })
    }
}
