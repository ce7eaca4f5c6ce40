//! Exact code strategy
//!
//! Code-shaped tokens in the request ("5812", "541100") are looked up
//! directly. A trailing one- or two-zero suffix is also tried stripped, so
//! "541100" finds SIC 5411 as well as any NAICS 541100.

use async_trait::async_trait;
use indclass_common::{CodeStore, RequestContext, Result};
use std::sync::Arc;
use tracing::debug;

use super::{ClassificationStrategy, StrategyInput, StrategyOutput};
use crate::text::{is_exact_code_match, looks_like_code, tokenize};
use crate::types::{merge_results, ClassificationResult};

/// Exact matches keep most of the code's intrinsic confidence
const EXACT_CONFIDENCE: f64 = 0.95;

/// Codes a token could denote: itself plus zero-suffix-stripped prefixes
pub fn code_candidates(token: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    if !looks_like_code(token) {
        return candidates;
    }

    candidates.push(token.to_string());
    for strip in 1..=2 {
        if token.len() < strip + 2 {
            break;
        }
        let prefix = &token[..token.len() - strip];
        if is_exact_code_match(prefix, token) {
            candidates.push(prefix.to_string());
        }
    }
    candidates
}

pub struct ExactCodeStrategy {
    store: Arc<dyn CodeStore>,
    weight: f64,
}

impl ExactCodeStrategy {
    pub fn new(store: Arc<dyn CodeStore>, weight: f64) -> Self {
        Self { store, weight }
    }
}

#[async_trait]
impl ClassificationStrategy for ExactCodeStrategy {
    fn name(&self) -> &'static str {
        "exact_code"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn classify(&self, ctx: &RequestContext, input: &StrategyInput) -> Result<StrategyOutput> {
        let mut lookups: Vec<(String, String)> = Vec::new();
        for token in tokenize(&input.analysis_text) {
            for candidate in code_candidates(&token) {
                if !lookups.iter().any(|(c, _)| *c == candidate) {
                    lookups.push((candidate, token.clone()));
                }
            }
        }

        let mut results = Vec::new();
        let mut candidates_found = 0;

        for (candidate, token) in &lookups {
            for &code_type in &input.preferred_types {
                let code = match self
                    .store
                    .get_code_by_code_and_type(ctx, candidate, code_type)
                    .await
                {
                    Ok(code) => code,
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => return Err(e),
                };
                candidates_found += 1;

                let confidence = EXACT_CONFIDENCE * code.confidence;
                results.push(
                    ClassificationResult::new(code, confidence, "exact", self.weight)
                        .with_matched_on(token.clone())
                        .with_reason(format!(
                            "exact {} code match on '{}'",
                            code_type.label(),
                            token
                        )),
                );
            }
        }

        let results = merge_results(results);
        debug!(
            lookups = lookups.len(),
            results = results.len(),
            "Exact code strategy complete"
        );

        Ok(StrategyOutput {
            results,
            candidates_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support;
    use indclass_common::CodeType;

    #[test]
    fn test_code_candidates() {
        assert_eq!(code_candidates("5812"), vec!["5812"]);
        assert_eq!(code_candidates("541100"), vec!["541100", "54110", "5411"]);
        assert_eq!(code_candidates("58120"), vec!["58120", "5812"]);
        assert!(code_candidates("pizza").is_empty());
        assert!(code_candidates("7").is_empty());
    }

    #[tokio::test]
    async fn test_code_in_text_is_exact_match() {
        let strategy = ExactCodeStrategy::new(test_support::store(), 1.0);
        let input = StrategyInput::new("", "registered under sic 5812", &[CodeType::Sic, CodeType::Mcc]);
        let output = strategy.classify(&RequestContext::new(), &input).await.unwrap();

        assert_eq!(output.results.len(), 2);
        let sic = &output.results[0];
        assert_eq!(sic.key(), ("5812".to_string(), CodeType::Sic));
        assert_eq!(sic.match_type, "exact");
        assert!((sic.confidence - 0.95 * 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_zero_suffix_resolves_base_code() {
        let strategy = ExactCodeStrategy::new(test_support::store(), 1.0);
        let input = StrategyInput::new("", "code 5812-00", &[CodeType::Sic]);
        let output = strategy.classify(&RequestContext::new(), &input).await.unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].code.code, "5812");
    }

    #[tokio::test]
    async fn test_unknown_codes_are_skipped() {
        let strategy = ExactCodeStrategy::new(test_support::store(), 1.0);
        let input = StrategyInput::new("", "9999 and 123456", &[]);
        let output = strategy.classify(&RequestContext::new(), &input).await.unwrap();
        assert!(output.results.is_empty());
    }
}
