// tests/enrich_pipeline.rs
//
// Producer-stage behavior over a realistic factpack: top-K truncation,
// deterministic score bundle, LLM enrichment merge, and full degradation
// when the LLM declines.

use serde_json::json;

use gigfit::enrich::{enrich_factpack, EnrichOptions};
use gigfit::factpack::Factpack;
use gigfit::llm::{DisabledClient, ScriptedClient};

/// Four candidates, two regions, ranked by the upstream retrieval stage.
/// The user is free Mon 08:00-18:00 and Tue 09:00-12:00.
fn factpack() -> Factpack {
    serde_json::from_value(json!({
        "user": {
            "locale": "ko-KR",
            "age": 67,
            "interests": ["reception", "gardening", "reading"],
            "availability_json": {
                "Mon": [["08:00", "18:00"]],
                "Tue": [["09:00", "12:00"]]
            },
            "home_latitude": 37.55,
            "home_longitude": 127.07,
            "his_short": "retired teacher"
        },
        "candidates": [
            {
                "job_id": 1, "title": "Market greeter", "place": "north",
                "description": "Welcome shoppers at the main gate.",
                "hourly_wage": 12.0, "work_days": "1000000",
                "start_time": "09:00", "end_time": "17:00",
                "job_latitude": 37.55, "job_longitude": 127.07,
                "sim_interest": 0.873
            },
            {
                "job_id": 2, "title": "Library helper", "place": "north",
                "description": "Sort and shelve returned books.",
                "hourly_wage": 10.0, "work_days": "0100000",
                "start_time": "10:00", "end_time": "11:00",
                "sim_interest": 0.6
            },
            { "job_id": 3, "place": "south", "hourly_wage": 14.0 },
            { "job_id": 4, "place": "south", "hourly_wage": 16.0 }
        ],
        "meta": { "query": "light indoor work", "k": 2 }
    }))
    .expect("fixture factpack")
}

fn enrichment_response() -> String {
    json!({
        "items": [{
            "job_id": 1,
            "org": "Happy Mart",
            "desc": "Greets customers at the market entrance.",
            "features": {
                "indoor": "indoor",
                "english": false,
                "physical": 2,
                "interaction": 3,
                "warnings": [],
                "tags": ["greeter", "standing"]
            }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn producer_scores_and_enriches_top_k() {
    let llm = ScriptedClient::new(vec![Some(enrichment_response())]);
    let opts = EnrichOptions {
        top_k: 2,
        batch_size: 5,
    };

    let out = enrich_factpack(&llm, &factpack(), &opts).await;

    // Top-K truncation keeps the upstream ranking order.
    assert_eq!(out.candidates.len(), 2);
    assert_eq!(out.candidates[0].job_id, 1);
    assert_eq!(out.candidates[1].job_id, 2);
    // One batch call, no history summary (his_short was provided).
    assert_eq!(llm.remaining(), 0);

    let first = &out.candidates[0];
    // 09:00-17:00 fully inside Mon 08:00-18:00.
    assert_eq!(first.time_overlap, 1.0);
    assert_eq!(first.time_overlap_job_norm, 1.0);
    assert_eq!(first.time_overlap_intersection_norm, 1.0);
    // 480 overlapped minutes of 780 available.
    assert_eq!(first.user_fit_ratio, 0.62);
    assert_eq!(first.time_fit, 0.85);
    // Region pool "north" has only 2 wages -> full pool [10,12,14,16]:
    // (12 - 11.5) / (14.5 - 11.5) = 0.17.
    assert_eq!(first.pay_norm, 0.17);
    // Same coordinates: zero distance, walking tier, zero minutes.
    assert_eq!(first.distance_km, Some(0.0));
    assert_eq!(first.travel_min, Some(0));
    assert_eq!(first.sim_interest, 0.87);

    // LLM merge for the enriched candidate.
    assert_eq!(first.org.as_deref(), Some("Happy Mart"));
    assert_eq!(first.desc, "Greets customers at the market entrance.");
    assert_eq!(first.features.physical, Some(2));
    assert_eq!(first.features.tags, vec!["greeter", "standing"]);

    // Candidate 2 was not in the LLM response: raw text, default features.
    let second = &out.candidates[1];
    assert_eq!(second.time_overlap, 1.0);
    assert_eq!(second.user_fit_ratio, 0.08);
    assert!(second.org.is_none());
    assert_eq!(second.desc, "Sort and shelve returned books.");
    assert!(second.features.indoor.is_none());
    assert_eq!(second.pay_norm, 0.0);
    assert!(second.distance_km.is_none());

    // User block and meta.
    assert_eq!(out.user.pref_keywords, vec!["reception", "gardening"]);
    assert_eq!(out.meta.k, 2);
    assert!(out.meta.computed_at.ends_with("+09:00"));
    let summary = out.user_summary.expect("summary");
    assert_eq!(summary.his_short.as_deref(), Some("retired teacher"));
    assert_eq!(summary.his_hash.expect("hash").len(), 64);
}

#[tokio::test]
async fn producer_degrades_cleanly_without_llm() {
    let mut pack = factpack();
    pack.user.his_short = None;
    pack.user.work_history =
        Some("Thirty years teaching elementary school, then volunteer tutoring.".to_string());

    let opts = EnrichOptions {
        top_k: 2,
        batch_size: 1,
    };
    let out = enrich_factpack(&DisabledClient, &pack, &opts).await;

    // Numbers are untouched by LLM failure.
    assert_eq!(out.candidates[0].time_overlap, 1.0);
    assert_eq!(out.candidates[0].pay_norm, 0.17);
    // Text falls back to the raw posting.
    assert!(out.candidates[0].org.is_none());
    assert_eq!(out.candidates[0].desc, "Welcome shoppers at the main gate.");
    // History summary falls back to a 60-char prefix.
    let summary = out.user_summary.expect("summary");
    let short = summary.his_short.expect("his_short");
    assert!(short.chars().count() <= 60);
    assert!(short.starts_with("Thirty years teaching"));
}

#[tokio::test]
async fn malformed_candidate_schedule_zeroes_time_metrics() {
    let mut pack = factpack();
    pack.candidates[0].work_days = Some("11".to_string());

    let out = enrich_factpack(
        &DisabledClient,
        &pack,
        &EnrichOptions {
            top_k: 1,
            batch_size: 5,
        },
    )
    .await;

    let c = &out.candidates[0];
    assert_eq!(c.time_overlap, 0.0);
    assert_eq!(c.time_overlap_intersection_norm, 0.0);
    assert_eq!(c.user_fit_ratio, 0.0);
    assert_eq!(c.time_fit, 0.0);
    // Pay and distance are independent of the schedule.
    assert_eq!(c.pay_norm, 0.17);
    assert_eq!(c.distance_km, Some(0.0));
}
