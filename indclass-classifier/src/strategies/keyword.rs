//! Keyword matching strategy
//!
//! Searches the store once per extracted keyword and scores each hit by
//! where the keyword appears on the code.
//!
//! # Scoring
//! - Description word match: +0.3
//! - Substring match against a code keyword (first match only): +0.4
//! - Category word match: +0.2
//! - Frequency bonus: `min(freq * 0.1, 0.3)`
//!
//! The sum is multiplied by the code's intrinsic confidence and clamped.
//! Candidates below 0.1 are discarded.

use async_trait::async_trait;
use indclass_common::{CodeStore, IndustryCode, RequestContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{ClassificationStrategy, StrategyInput, StrategyOutput};
use crate::text::{clamp_unit, extract_keywords, token_frequencies, WordMatcher};
use crate::types::{merge_results, ClassificationResult};

/// Store hits fetched per keyword
const SEARCH_LIMIT: usize = 50;
const MIN_CONFIDENCE: f64 = 0.1;

pub struct KeywordStrategy {
    store: Arc<dyn CodeStore>,
    weight: f64,
}

impl KeywordStrategy {
    pub fn new(store: Arc<dyn CodeStore>, weight: f64) -> Self {
        Self { store, weight }
    }

    /// Score one code against one keyword, or `None` when below threshold
    fn score(
        &self,
        code: &IndustryCode,
        matcher: &WordMatcher,
        frequencies: &HashMap<String, usize>,
    ) -> Option<ClassificationResult> {
        let keyword = matcher.needle();
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if matcher.is_match(&code.description) {
            score += 0.3;
            reasons.push(format!("keyword '{}' found in description", keyword));
        }

        let keyword_hit = code.keywords.iter().find(|k| {
            let k = k.to_lowercase();
            !k.is_empty() && (k.contains(keyword) || keyword.contains(k.as_str()))
        });
        if let Some(hit) = keyword_hit {
            score += 0.4;
            reasons.push(format!("keyword '{}' matches code keyword '{}'", keyword, hit));
        }

        if matcher.is_match(&code.category) {
            score += 0.2;
            reasons.push(format!("keyword '{}' found in category", keyword));
        }

        let freq = frequencies.get(keyword).copied().unwrap_or(0);
        score += (freq as f64 * 0.1).min(0.3);

        let confidence = clamp_unit(score * code.confidence);
        if confidence < MIN_CONFIDENCE {
            return None;
        }

        let mut result = ClassificationResult::new(code.clone(), confidence, "keyword", self.weight)
            .with_matched_on(keyword);
        for reason in reasons {
            result.add_reason(reason);
        }
        Some(result)
    }
}

#[async_trait]
impl ClassificationStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn classify(&self, ctx: &RequestContext, input: &StrategyInput) -> Result<StrategyOutput> {
        let keywords = extract_keywords(&input.analysis_text);
        let frequencies = token_frequencies(&input.analysis_text);

        let mut candidates = Vec::new();
        let mut candidates_found = 0;

        for keyword in &keywords {
            let codes = self.store.search_codes(ctx, keyword, None, SEARCH_LIMIT).await?;
            candidates_found += codes.len();

            let matcher = WordMatcher::new(keyword);
            candidates.extend(
                codes
                    .iter()
                    .filter(|c| input.prefers(c.code_type))
                    .filter_map(|c| self.score(c, &matcher, &frequencies)),
            );
        }

        let results = merge_results(candidates);
        debug!(
            keywords = keywords.len(),
            candidates_found,
            results = results.len(),
            "Keyword strategy complete"
        );

        Ok(StrategyOutput {
            results,
            candidates_found,
        })
    }
}
