//! Result aggregation through the public entry point

use std::sync::Arc;

use indclass_classifier::aggregation::{
    AggregationRequest, MatchStrength, Presentation, PresentationFormat, SortCriterion,
};
use indclass_classifier::{ClassificationResult, ClassifyError, IndustryClassifier, ServiceConfig};
use indclass_common::{CodeStore, CodeType, IndustryCode, MemoryCodeStore, RequestContext};

fn classifier() -> IndustryClassifier {
    let store: Arc<dyn CodeStore> = Arc::new(MemoryCodeStore::new());
    IndustryClassifier::new(store, &ServiceConfig::default())
}

fn result(code: &str, code_type: CodeType, confidence: f64, match_type: &str) -> ClassificationResult {
    ClassificationResult::new(
        IndustryCode::new(
            format!("{}-{}", code_type.as_str(), code),
            code,
            code_type,
            format!("Code {}", code),
        )
        .with_category("Restaurant and Food Service"),
        confidence,
        match_type,
        0.9,
    )
    .with_matched_on("restaurant")
    .with_reason("keyword match")
}

fn mixed_results() -> Vec<ClassificationResult> {
    vec![
        result("5812", CodeType::Sic, 0.85, "keyword+business_name"),
        result("722511", CodeType::Naics, 0.80, "keyword"),
        result("5812", CodeType::Mcc, 0.75, "exact"),
        result("5813", CodeType::Sic, 0.45, "description"),
        result("722513", CodeType::Naics, 0.30, "business_name"),
    ]
}

#[test]
fn test_empty_input_is_structurally_valid() {
    let out = classifier()
        .aggregate_and_present(&RequestContext::new(), AggregationRequest::default())
        .unwrap();

    assert_eq!(out.total_input_results, 0);
    assert!(out.results.is_empty());
    for code_type in CodeType::ALL {
        assert!(out.by_type[&code_type].is_empty());
    }
    assert!(out.by_strategy.is_empty());

    let json = serde_json::to_value(&out).unwrap();
    assert!(json["results"].is_array());
    assert!(json["by_type"]["sic"].is_array());
    assert_eq!(json["presentation"]["format"], "detailed");
}

#[test]
fn test_min_confidence_keeps_three_of_five() {
    let request = AggregationRequest {
        min_confidence: Some(0.7),
        ..AggregationRequest::new(mixed_results())
    };
    let out = classifier()
        .aggregate_and_present(&RequestContext::new(), request)
        .unwrap();

    assert_eq!(out.total_input_results, 5);
    assert_eq!(out.total_after_filter, 3);
    let mut confidences: Vec<f64> = out.results.iter().map(|r| r.result.confidence).collect();
    confidences.sort_by(f64::total_cmp);
    assert_eq!(confidences, vec![0.75, 0.80, 0.85]);
}

#[test]
fn test_match_strength_sort_puts_exact_first() {
    let request = AggregationRequest {
        sort_by: Some(SortCriterion::MatchStrength),
        ..AggregationRequest::new(mixed_results())
    };
    let out = classifier()
        .aggregate_and_present(&RequestContext::new(), request)
        .unwrap();

    // 0.75 + 0.1 exact boost + evidence lifts the MCC code into the top bucket
    assert_eq!(out.results[0].match_strength, MatchStrength::Exact);
    assert!(out
        .results
        .iter()
        .any(|r| r.result.code.code_type == CodeType::Mcc
            && r.match_strength == MatchStrength::Exact));
    let strengths: Vec<MatchStrength> = out.results.iter().map(|r| r.match_strength).collect();
    assert!(strengths.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_every_presentation_format_renders() {
    let formats = [
        PresentationFormat::Detailed,
        PresentationFormat::Summary,
        PresentationFormat::Compact,
        PresentationFormat::Export,
        PresentationFormat::Dashboard,
        PresentationFormat::Api,
    ];
    for format in formats {
        let request = AggregationRequest {
            presentation: Some(format),
            ..AggregationRequest::new(mixed_results())
        };
        let out = classifier()
            .aggregate_and_present(&RequestContext::new(), request)
            .unwrap();
        assert_eq!(out.presentation.format(), format);

        match &out.presentation {
            Presentation::Detailed(view) => assert_eq!(view.results.len(), out.results.len()),
            Presentation::Summary(view) => {
                assert_eq!(view.top_by_type.len(), 3);
                assert!(view.headline.starts_with("Best match"));
            }
            Presentation::Compact(view) => assert_eq!(view.entries.len(), out.results.len()),
            Presentation::Export(view) => {
                assert_eq!(view.rows.len(), out.results.len());
                assert!(view.rows.iter().all(|row| row.len() == view.headers.len()));
            }
            Presentation::Dashboard(view) => {
                assert_eq!(view.total_results, out.results.len());
                assert!(view.top_result.is_some());
            }
            Presentation::Api(view) => {
                assert_eq!(view.count, out.results.len());
                assert_eq!(view.results[0].rank, 1);
            }
        }
    }
}

#[test]
fn test_analytics_cover_all_types() {
    let out = classifier()
        .aggregate_and_present(
            &RequestContext::new(),
            AggregationRequest::new(mixed_results()),
        )
        .unwrap();
    let analytics = out.analytics.expect("analytics on by default");

    assert_eq!(analytics.coverage.type_coverage, 1.0);
    assert_eq!(analytics.coverage.industry_count, 1);
    assert!(analytics.consistency.type_conflicts.is_empty());
    assert_eq!(analytics.consistency.consistency_score, 1.0);
    assert_eq!(analytics.diversity.herfindahl_index, 1.0);
    assert!(analytics.recommendation_score > 0.0);
    assert_eq!(analytics.statistics.count, out.results.len());
    assert_eq!(analytics.statistics.max, 0.85);
}

#[test]
fn test_invalid_request_surfaces_as_classify_error() {
    let request = AggregationRequest {
        max_results_per_type: Some(0),
        ..AggregationRequest::new(mixed_results())
    };
    let result = classifier().aggregate_and_present(&RequestContext::new(), request);
    assert!(matches!(result, Err(ClassifyError::InvalidRequest(_))));
}
