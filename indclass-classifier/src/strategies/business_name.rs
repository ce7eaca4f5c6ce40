//! Business-name pattern strategy
//!
//! Matches the business name against a fixed table of category triggers.
//! Each hit contributes two indicators, the category tag and the trigger
//! word itself. Every indicator is searched in the store and scored by
//! word-boundary hits on description (0.4), category (0.3) and keywords
//! (0.2), multiplied by the code's intrinsic confidence.

use async_trait::async_trait;
use indclass_common::{CodeStore, IndustryCode, RequestContext, Result};
use std::sync::Arc;
use tracing::debug;

use super::{ClassificationStrategy, StrategyInput, StrategyOutput};
use crate::text::{clamp_unit, contains_word, WordMatcher};
use crate::types::{merge_results, ClassificationResult};

/// Store hits fetched per indicator
const SEARCH_LIMIT: usize = 20;
/// Candidates must score strictly above this
const MIN_CONFIDENCE: f64 = 0.15;
/// Triggers shorter than this must match a whole word ("inn" not in "dinner")
const SUBSTRING_TRIGGER_LEN: usize = 4;

/// Category tag and the name fragments that trigger it
const NAME_PATTERNS: &[(&str, &[&str])] = &[
    (
        "restaurant",
        &[
            "restaurant", "cafe", "diner", "pizza", "pizzeria", "bistro", "grill", "eatery",
            "kitchen", "bakery", "tavern", "brewery", "steakhouse", "sushi", "taco", "burger",
        ],
    ),
    (
        "retail",
        &["store", "shop", "boutique", "market", "outlet", "mart", "emporium"],
    ),
    (
        "software",
        &["software", "tech", "digital", "systems", "cloud", "cyber", "data", "apps"],
    ),
    (
        "consulting",
        &["consulting", "consultants", "advisors", "advisory", "associates"],
    ),
    (
        "medical",
        &["clinic", "medical", "health", "dental", "pharmacy", "hospital", "physicians"],
    ),
    (
        "construction",
        &["construction", "builders", "contracting", "plumbing", "roofing", "electric", "hvac"],
    ),
    (
        "financial",
        &["bank", "financial", "capital", "credit", "lending", "insurance", "invest"],
    ),
    (
        "automotive",
        &["auto", "motors", "garage", "tire", "collision", "car wash"],
    ),
    ("legal", &["law", "legal", "attorney", "attorneys", "lawyers"]),
    ("real estate", &["realty", "properties", "real estate", "homes"]),
    ("hotel", &["hotel", "inn", "resort", "lodge", "motel", "suites"]),
    ("fitness", &["gym", "fitness", "yoga", "pilates", "crossfit"]),
    ("salon", &["salon", "spa", "barber", "beauty", "nails"]),
    (
        "trucking",
        &["logistics", "transport", "shipping", "freight", "trucking", "courier"],
    ),
];

/// Category tags and trigger words found in a business name, deduplicated
/// in table order
pub fn extract_indicators(business_name: &str) -> Vec<String> {
    let name = business_name.to_lowercase();
    let mut indicators: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !indicators.iter().any(|i| i == s) {
            indicators.push(s.to_string());
        }
    };

    for &(category, triggers) in NAME_PATTERNS {
        for &trigger in triggers.iter().filter(|t| trigger_matches(&name, t)) {
            push(category);
            push(trigger);
        }
    }

    indicators
}

fn trigger_matches(name: &str, trigger: &str) -> bool {
    if trigger.chars().count() < SUBSTRING_TRIGGER_LEN {
        contains_word(name, trigger)
    } else {
        name.contains(trigger)
    }
}

pub struct BusinessNameStrategy {
    store: Arc<dyn CodeStore>,
    weight: f64,
}

impl BusinessNameStrategy {
    pub fn new(store: Arc<dyn CodeStore>, weight: f64) -> Self {
        Self { store, weight }
    }

    fn score(&self, code: &IndustryCode, matcher: &WordMatcher) -> Option<ClassificationResult> {
        let indicator = matcher.needle();
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if matcher.is_match(&code.description) {
            score += 0.4;
            reasons.push(format!("business name indicates '{}' in description", indicator));
        }
        if matcher.is_match(&code.category) {
            score += 0.3;
            reasons.push(format!("business name indicates '{}' category", indicator));
        }
        if code.keywords.iter().any(|k| matcher.is_match(k)) {
            score += 0.2;
            reasons.push(format!("business name indicator '{}' is a code keyword", indicator));
        }

        let confidence = clamp_unit(score * code.confidence);
        if confidence <= MIN_CONFIDENCE {
            return None;
        }

        let mut result =
            ClassificationResult::new(code.clone(), confidence, "business_name", self.weight)
                .with_matched_on(indicator);
        for reason in reasons {
            result.add_reason(reason);
        }
        Some(result)
    }
}

#[async_trait]
impl ClassificationStrategy for BusinessNameStrategy {
    fn name(&self) -> &'static str {
        "business_name"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn classify(&self, ctx: &RequestContext, input: &StrategyInput) -> Result<StrategyOutput> {
        let indicators = extract_indicators(&input.business_name);
        if indicators.is_empty() {
            return Ok(StrategyOutput::default());
        }

        let mut candidates = Vec::new();
        let mut candidates_found = 0;

        for indicator in &indicators {
            let codes = self
                .store
                .search_codes(ctx, indicator, None, SEARCH_LIMIT)
                .await?;
            candidates_found += codes.len();

            let matcher = WordMatcher::new(indicator);
            candidates.extend(
                codes
                    .iter()
                    .filter(|c| input.prefers(c.code_type))
                    .filter_map(|c| self.score(c, &matcher)),
            );
        }

        let results = merge_results(candidates);
        debug!(
            indicators = ?indicators,
            candidates_found,
            results = results.len(),
            "Business name strategy complete"
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
    fn test_indicators_include_tag_and_trigger() {
        let indicators = extract_indicators("joe s pizza restaurant");
        assert_eq!(indicators, vec!["restaurant", "pizza"]);
    }

    #[test]
    fn test_short_triggers_need_whole_words() {
        assert!(extract_indicators("the dinner club").is_empty());
        assert!(extract_indicators("green lawn care").is_empty());
        assert_eq!(extract_indicators("harbor inn"), vec!["hotel", "inn"]);
        assert_eq!(extract_indicators("smith law group"), vec!["legal", "law"]);
    }

    #[test]
    fn test_indicators_empty_for_unknown_name() {
        assert!(extract_indicators("acme widgets").is_empty());
    }

    #[test]
    fn test_multiple_categories() {
        let indicators = extract_indicators("downtown auto shop");
        assert_eq!(indicators, vec!["retail", "shop", "automotive", "auto"]);
    }

    #[tokio::test]
    async fn test_pizza_name_finds_restaurant_codes() {
        let strategy = BusinessNameStrategy::new(test_support::store(), 0.8);
        let input = StrategyInput::new("Joe's Pizza Restaurant", "", &[]);
        let output = strategy.classify(&RequestContext::new(), &input).await.unwrap();

        let sic = output
            .results
            .iter()
            .find(|r| r.key() == ("5812".to_string(), CodeType::Sic))
            .expect("sic 5812");
        // category +0.3, keyword +0.2, times 0.95
        assert!((sic.confidence - 0.475).abs() < 1e-9);
        assert_eq!(sic.match_type, "business_name");
        assert!(output.results.iter().all(|r| r.code.category != "Construction"));
    }
}
