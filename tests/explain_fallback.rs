// tests/explain_fallback.rs
//
// Consumer-stage trust boundary: parse/validate the model's score echo,
// retry once, then fall back to the deterministic template.

use serde_json::json;

use gigfit::explain::{explain_factpack, ExplainOptions};
use gigfit::factpack::{EnrichedFactpack, EnrichedUser, MetaOut, ScoredCandidate};
use gigfit::llm::{DisabledClient, ScriptedClient};

fn enriched_pack() -> EnrichedFactpack {
    EnrichedFactpack {
        user: EnrichedUser {
            locale: "ko-KR".into(),
            age: 67,
            pref_keywords: vec!["reception".into()],
            availability: Default::default(),
        },
        candidates: vec![ScoredCandidate {
            job_id: 11,
            title: Some("Market greeter".into()),
            sim_interest: 0.82,
            time_overlap: 0.75,
            time_overlap_job_norm: 0.75,
            pay_norm: 0.4,
            distance_km: Some(2.5),
            travel_min: Some(18),
            ..Default::default()
        }],
        meta: MetaOut {
            query: None,
            k: 1,
            computed_at: "2025-08-30T09:00:00+09:00".into(),
        },
        user_summary: None,
    }
}

fn opts() -> ExplainOptions {
    ExplainOptions {
        top_k: 1,
        tolerance: 0.01,
    }
}

fn response(sim: f64, overlap: f64) -> String {
    json!({
        "job_id": 11,
        "why_short": "Strong schedule fit with a short transit ride.",
        "highlights": ["short commute"],
        "used_fields": ["time_overlap", "travel_min"],
        "score_breakdown": {
            "sim_interest": sim,
            "time_overlap": overlap,
            "pay_norm": 0.4,
            "travel_min": 18,
            "distance_km": 2.5
        }
    })
    .to_string()
}

#[tokio::test]
async fn accepts_exact_echo_first_try() {
    let llm = ScriptedClient::new(vec![Some(response(0.82, 0.75))]);
    let report = explain_factpack(&llm, &enriched_pack(), &opts()).await;

    assert_eq!(report.version, "explain.v1.1");
    let item = &report.items[0];
    assert!(!item.fallback);
    assert_eq!(item.confidence, 0.9);
    assert_eq!(item.why_short, "Strong schedule fit with a short transit ride.");
    assert_eq!(report.meta.fallback_ratio, 0.0);
    assert!(report.meta.errors.is_empty());
    assert_eq!(llm.remaining(), 0);
}

#[tokio::test]
async fn retries_once_then_accepts() {
    // First echo drifts beyond tolerance, retry is exact.
    let llm = ScriptedClient::new(vec![
        Some(response(0.95, 0.75)),
        Some(response(0.82, 0.75)),
    ]);
    let report = explain_factpack(&llm, &enriched_pack(), &opts()).await;

    assert!(!report.items[0].fallback);
    assert!(report.meta.errors.is_empty());
    assert_eq!(llm.remaining(), 0, "exactly two calls expected");
}

#[tokio::test]
async fn falls_back_after_two_mismatches() {
    let llm = ScriptedClient::new(vec![
        Some(response(0.95, 0.75)),
        Some(response(0.82, 0.10)),
    ]);
    let report = explain_factpack(&llm, &enriched_pack(), &opts()).await;

    let item = &report.items[0];
    assert!(item.fallback);
    assert_eq!(item.confidence, 0.0);
    // Fallback echoes the known-correct deterministic values.
    assert_eq!(item.score_breakdown.sim_interest, 0.82);
    assert_eq!(item.score_breakdown.travel_min, 18.0);
    assert_eq!(report.meta.fallback_ratio, 1.0);
    assert_eq!(report.meta.errors.len(), 1);
    assert!(report.meta.errors[0].contains("time_overlap"));
}

#[tokio::test]
async fn recovers_from_unparseable_first_response() {
    let llm = ScriptedClient::new(vec![
        Some("BUY NOW!!! not json".to_string()),
        Some(response(0.82, 0.75)),
    ]);
    let report = explain_factpack(&llm, &enriched_pack(), &opts()).await;
    assert!(!report.items[0].fallback);
    assert!(report.meta.errors.is_empty());
}

#[tokio::test]
async fn tolerates_code_fenced_response() {
    let fenced = format!("```json\n{}\n```", response(0.82, 0.75));
    let llm = ScriptedClient::new(vec![Some(fenced)]);
    let report = explain_factpack(&llm, &enriched_pack(), &opts()).await;
    assert!(!report.items[0].fallback);
}

#[tokio::test]
async fn disabled_llm_yields_templated_items() {
    let report = explain_factpack(&DisabledClient, &enriched_pack(), &opts()).await;

    assert_eq!(report.meta.llm_model, "disabled");
    let item = &report.items[0];
    assert!(item.fallback);
    assert_eq!(item.job_id, 11);
    assert_eq!(item.score_breakdown.pay_norm, 0.4);
    assert_eq!(report.meta.fallback_ratio, 1.0);
    // A declined completion is still reported once per candidate.
    assert_eq!(report.meta.errors.len(), 1);
    assert_eq!(report.meta.facts_hash.len(), 64);
}
