//! Producer stage: deterministic scoring + LLM text enrichment.
//!
//! Takes a ranked factpack, keeps the top-K candidates, attaches the
//! deterministic score bundle (time overlap, travel estimate, wage
//! percentile) and asks the LLM, in batches, for org/desc/feature tags.
//! Every LLM failure degrades to the raw candidate text; the numeric fields
//! never depend on the model.

use std::collections::HashMap;

use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::factpack::{
    Candidate, CandidateFeatures, EnrichedFactpack, EnrichedUser, Factpack, MetaOut,
    ScoredCandidate, UserSummary,
};
use crate::llm::LlmClient;
use crate::score::{estimate_travel_min, haversine_km, overlap_metrics, pay_norm, round2};

const ENRICH_TEMPERATURE: f32 = 0.2;
const DESC_MAX_CHARS: usize = 120;
const HISTORY_MAX_CHARS: usize = 60;
/// Region wage pools below this size fall back to the full candidate set.
const MIN_REGION_POOL: usize = 4;

const ENRICH_SYSTEM_PROMPT: &str = r#"You structure job-posting text for a senior gig-matching service.
Rules:
- Never invent numbers (wages, hours, weekdays, coordinates). Classify, summarize and tag only.
- Return null when unsure.
- Reply with exactly one JSON object.
Schema:
{
  "items": [
    {
      "job_id": int,
      "org": string|null,
      "desc": string,              // 1-2 sentence summary, at most 80 chars
      "features": {
        "indoor": "indoor"|"outdoor"|"mixed"|null,
        "english": true|false|null,
        "physical": 1|2|3|4|5|null,
        "interaction": 1|2|3|null,
        "warnings": string[],      // 0-3 short phrases
        "tags": string[]           // 0-6 keyword tags
      }
    }
  ]
}"#;

const HISTORY_SYSTEM_PROMPT: &str = "You summarize work histories and reply only with a json \
object. Schema: {\"summary\": string}. The summary is one sentence of at most 60 characters.";

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub top_k: usize,
    pub batch_size: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            batch_size: 5,
        }
    }
}

/// Per-candidate enrichment as parsed from the model response.
#[derive(Debug, Clone, Default, Deserialize)]
struct Enrichment {
    job_id: Option<i64>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    features: Option<CandidateFeatures>,
}

#[derive(Debug, Default, Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    items: Vec<Enrichment>,
}

/// Run the producer stage. Input order is the upstream ranking; the first
/// `top_k` candidates are scored and enriched.
pub async fn enrich_factpack(
    llm: &dyn LlmClient,
    pack: &Factpack,
    opts: &EnrichOptions,
) -> EnrichedFactpack {
    let user = &pack.user;
    let pref_keywords: Vec<String> = user.interests.iter().take(2).cloned().collect();
    let top: Vec<&Candidate> = pack.candidates.iter().take(opts.top_k).collect();

    // Batched LLM enrichment over the top-K; failures leave gaps that the
    // merge step fills from raw candidate text.
    let mut enrichments: HashMap<i64, Enrichment> = HashMap::new();
    for batch in top.chunks(opts.batch_size.max(1)) {
        let got = enrich_batch(llm, batch, &pref_keywords).await;
        enrichments.extend(got);
    }
    info!(
        candidates = top.len(),
        enriched = enrichments.len(),
        "producer enrichment done"
    );

    // Same-region wage pools over the whole candidate set.
    let mut wages_by_place: HashMap<&str, Vec<f64>> = HashMap::new();
    let mut all_wages: Vec<f64> = Vec::new();
    for c in &pack.candidates {
        if let Some(w) = c.hourly_wage {
            wages_by_place
                .entry(c.place.as_deref().unwrap_or(""))
                .or_default()
                .push(w);
            all_wages.push(w);
        }
    }

    let candidates = top
        .iter()
        .map(|c| {
            let enrichment = enrichments.get(&c.job_id);
            score_candidate(c, user, &wages_by_place, &all_wages, enrichment)
        })
        .collect();

    let user_summary = summarize_user(llm, user).await;

    EnrichedFactpack {
        user: EnrichedUser {
            locale: user.locale.clone().unwrap_or_else(|| "ko-KR".to_string()),
            age: user.age,
            pref_keywords,
            availability: user.availability_json.clone(),
        },
        candidates,
        meta: MetaOut {
            query: pack.meta.query.clone(),
            k: opts.top_k,
            computed_at: kst_now(),
        },
        user_summary,
    }
}

fn score_candidate(
    c: &Candidate,
    user: &crate::factpack::UserContext,
    wages_by_place: &HashMap<&str, Vec<f64>>,
    all_wages: &[f64],
    enrichment: Option<&Enrichment>,
) -> ScoredCandidate {
    let work_days = c.work_days.clone().unwrap_or_else(|| "0000000".to_string());
    let start_time = c.start_time.clone().unwrap_or_else(|| "09:00".to_string());
    let end_time = c.end_time.clone().unwrap_or_else(|| "18:00".to_string());

    let metrics = overlap_metrics(&user.availability_json, &work_days, &start_time, &end_time);

    let (distance_km, travel_min) = match (
        user.home_latitude,
        user.home_longitude,
        c.job_latitude,
        c.job_longitude,
    ) {
        (Some(hlat), Some(hlon), Some(jlat), Some(jlon)) => {
            let km = round2(haversine_km(hlat, hlon, jlat, jlon));
            (Some(km), Some(estimate_travel_min(km)))
        }
        _ => (None, None),
    };

    let wage = c.hourly_wage.unwrap_or(0.0);
    let region = wages_by_place
        .get(c.place.as_deref().unwrap_or(""))
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let pool = if region.len() < MIN_REGION_POOL {
        all_wages
    } else {
        region
    };
    let pay = pay_norm(pool, wage);

    let raw_desc = c.description.clone().unwrap_or_default();
    let desc = enrichment
        .and_then(|e| e.desc.clone())
        .filter(|d| !d.is_empty())
        .unwrap_or(raw_desc);

    ScoredCandidate {
        job_id: c.job_id,
        title: c.title.clone(),
        org: enrichment.and_then(|e| e.org.clone()),
        desc: desc.chars().take(DESC_MAX_CHARS).collect(),
        sim_interest: round2(c.sim_interest),
        time_overlap: metrics.job_norm,
        time_overlap_job_norm: metrics.job_norm,
        time_overlap_intersection_norm: metrics.intersection_norm,
        user_fit_ratio: metrics.user_fit_ratio,
        time_fit: metrics.time_fit,
        hourly_wage: wage,
        pay_norm: pay,
        distance_km,
        travel_min,
        work_days,
        start_time,
        end_time,
        features: enrichment
            .and_then(|e| e.features.clone())
            .unwrap_or_default(),
    }
}

/// One batched enrichment call. Always returns a map; call or parse failure
/// yields an empty one.
async fn enrich_batch(
    llm: &dyn LlmClient,
    batch: &[&Candidate],
    pref_keywords: &[String],
) -> HashMap<i64, Enrichment> {
    let payload = json!({
        "user_pref_keywords": pref_keywords,
        "candidates": batch.iter().map(|c| json!({
            "job_id": c.job_id,
            "title": c.title,
            "description": c.description.as_deref().unwrap_or(""),
        })).collect::<Vec<_>>(),
    });
    let user_msg = payload.to_string();

    let Some(completion) = llm
        .complete_json(ENRICH_SYSTEM_PROMPT, &user_msg, ENRICH_TEMPERATURE)
        .await
    else {
        debug!(batch = batch.len(), "enrichment call declined");
        return HashMap::new();
    };

    parse_enrichment(&completion.content)
}

fn parse_enrichment(content: &str) -> HashMap<i64, Enrichment> {
    let parsed: EnrichResponse = match serde_json::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "unparseable enrichment response");
            return HashMap::new();
        }
    };
    parsed
        .items
        .into_iter()
        .filter_map(|item| item.job_id.map(|id| (id, item)))
        .collect()
}

/// Build the user summary block: reuse upstream values when present,
/// otherwise summarize the raw work history (LLM with prefix fallback).
async fn summarize_user(
    llm: &dyn LlmClient,
    user: &crate::factpack::UserContext,
) -> Option<UserSummary> {
    let his_short = match (&user.his_short, &user.work_history) {
        (Some(s), _) if !s.is_empty() => Some(s.clone()),
        (_, Some(history)) if !history.is_empty() => Some(summarize_history(llm, history).await),
        _ => None,
    };
    let his_hash = user.his_hash.clone().or_else(|| {
        his_short
            .as_deref()
            .map(|s| hex_sha256(s.trim().as_bytes()))
    });

    if his_short.is_none() && his_hash.is_none() {
        None
    } else {
        Some(UserSummary {
            his_short,
            his_hash,
        })
    }
}

async fn summarize_history(llm: &dyn LlmClient, work_history: &str) -> String {
    #[derive(Deserialize)]
    struct Summary {
        #[serde(default)]
        summary: String,
    }

    let prefix = || work_history.chars().take(HISTORY_MAX_CHARS).collect();
    let user_msg = format!("Summarize this work history in one sentence:\n{work_history}");

    match llm
        .complete_json(HISTORY_SYSTEM_PROMPT, &user_msg, ENRICH_TEMPERATURE)
        .await
    {
        Some(c) => match serde_json::from_str::<Summary>(&c.content) {
            Ok(s) if !s.summary.trim().is_empty() => {
                s.summary.trim().chars().take(HISTORY_MAX_CHARS).collect()
            }
            _ => prefix(),
        },
        None => prefix(),
    }
}

pub(crate) fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Timestamp in KST, the service's home timezone.
fn kst_now() -> String {
    let kst = FixedOffset::east_opt(9 * 3600).expect("KST offset");
    Utc::now().with_timezone(&kst).to_rfc3339()
}
