//! Consumer stage: per-candidate natural-language explanations.
//!
//! The LLM writes the prose; the numbers stay ours. Every response is parsed
//! defensively (code fences tolerated), validated against the deterministic
//! score bundle within a fixed tolerance, retried once on mismatch, and
//! replaced by a templated fallback that echoes the known-correct values
//! when the model cannot be trusted.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::factpack::{
    EnrichedFactpack, ExplainItem, ExplainMeta, ExplainReport, ScoreBreakdown, ScoredCandidate,
    EXPLAIN_VERSION,
};
use crate::llm::LlmClient;

const EXPLAIN_TEMPERATURE: f32 = 0.0;
const DEFAULT_CONFIDENCE: f64 = 0.9;

const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are a careful data-to-text generator. Output ONLY valid JSON without code fences.";

#[derive(Debug, Clone, Copy)]
pub struct ExplainOptions {
    pub top_k: usize,
    /// Maximum allowed drift between an echoed number and the deterministic
    /// value. One tolerance for every field.
    pub tolerance: f64,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            tolerance: 0.01,
        }
    }
}

/// Permissive parse target; missing fields are filled afterwards.
#[derive(Debug, Default, Deserialize)]
struct ExplainDraft {
    #[serde(default)]
    job_id: Option<i64>,
    #[serde(default)]
    why_short: String,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    used_fields: Vec<String>,
    #[serde(default)]
    score_breakdown: ScoreBreakdown,
    #[serde(default)]
    fallback: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Run the consumer stage over the top-K enriched candidates.
pub async fn explain_factpack(
    llm: &dyn LlmClient,
    pack: &EnrichedFactpack,
    opts: &ExplainOptions,
) -> ExplainReport {
    let user_json = serde_json::to_value(&pack.user).unwrap_or_default();

    let mut items = Vec::new();
    let mut errors = Vec::new();
    let mut total_latency_ms = 0u64;
    let mut total_prompt_tokens = 0u64;

    for cand in pack.candidates.iter().take(opts.top_k) {
        let prompt = build_prompt(cand, &user_json);

        let mut chosen: Option<ExplainItem> = None;
        // First attempt plus one retry on parse failure or mismatch.
        for attempt in 0..2 {
            match llm
                .complete_json(EXPLAIN_SYSTEM_PROMPT, &prompt, EXPLAIN_TEMPERATURE)
                .await
            {
                Some(completion) => {
                    total_latency_ms += completion.latency_ms;
                    total_prompt_tokens += completion.prompt_tokens;
                    match parse_item(&completion.content, cand) {
                        Ok(item) => {
                            if let Some(field) =
                                first_mismatch(&item.score_breakdown, &cand.breakdown(), opts.tolerance)
                            {
                                warn!(
                                    job_id = cand.job_id,
                                    field, attempt, "score echo outside tolerance"
                                );
                                if attempt == 1 {
                                    errors.push(format!(
                                        "job {}: `{}` mismatch after retry",
                                        cand.job_id, field
                                    ));
                                }
                            } else {
                                chosen = Some(item);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(job_id = cand.job_id, attempt, error = %e, "unparseable explanation");
                            if attempt == 1 {
                                errors.push(format!("job {}: {e}", cand.job_id));
                            }
                        }
                    }
                }
                None => {
                    if attempt == 1 {
                        errors.push(format!("job {}: completion declined", cand.job_id));
                    }
                }
            }
        }

        items.push(chosen.unwrap_or_else(|| fallback_item(cand)));
    }

    let fallback_count = items.iter().filter(|i| i.fallback).count();
    let fallback_ratio = fallback_count as f64 / items.len().max(1) as f64;
    info!(
        items = items.len(),
        fallback_count, "consumer explanations done"
    );

    ExplainReport {
        version: EXPLAIN_VERSION.to_string(),
        items,
        meta: ExplainMeta {
            llm_model: llm.model_name().to_string(),
            latency_ms: total_latency_ms,
            prompt_tokens: total_prompt_tokens,
            fallback_ratio,
            facts_hash: facts_hash(pack),
            errors,
        },
    }
}

fn build_prompt(cand: &ScoredCandidate, user_json: &serde_json::Value) -> String {
    let cand_json = serde_json::to_value(cand).unwrap_or_default();
    format!(
        r#"Look at the candidate job (cand) and the user (user) and summarize, in at most two sentences, why this job is recommended.

Rules:
- Use only cand's numbers and keywords; no estimates, no exaggeration.
- Copy score_breakdown values from cand exactly as-is.
- Output only JSON, no code fences.
- JSON schema:
  {{
    "job_id": <int>,
    "why_short": <string>,
    "highlights": [<string>],
    "warnings": [<string>],
    "used_fields": [<string>],
    "score_breakdown": {{
      "sim_interest": <number>,
      "time_overlap": <number>,
      "pay_norm": <number>,
      "travel_min": <number>,
      "distance_km": <number>
    }}
  }}

cand: {cand_json}
user: {user_json}"#
    )
}

/// Parse a completion into a finalized item, tolerating Markdown fences and
/// filling schema defaults from the candidate.
fn parse_item(raw: &str, cand: &ScoredCandidate) -> Result<ExplainItem, serde_json::Error> {
    let draft: ExplainDraft = serde_json::from_str(strip_code_fences(raw))?;
    Ok(ExplainItem {
        job_id: draft.job_id.unwrap_or(cand.job_id),
        why_short: draft.why_short,
        highlights: draft.highlights,
        warnings: draft.warnings,
        used_fields: draft.used_fields,
        score_breakdown: draft.score_breakdown,
        fallback: draft.fallback.unwrap_or(false),
        confidence: draft.confidence.unwrap_or(DEFAULT_CONFIDENCE),
    })
}

/// Remove a surrounding ``` / ```json fence if the model ignored the
/// no-fences instruction.
fn strip_code_fences(raw: &str) -> &str {
    let raw = raw.trim();
    if !raw.starts_with("```") {
        return raw;
    }
    let Some(first_nl) = raw.find('\n') else {
        return raw;
    };
    let last = raw.rfind("```").unwrap_or(raw.len());
    if last <= first_nl {
        return raw;
    }
    raw[first_nl..last].trim()
}

/// Name of the first breakdown field outside tolerance, if any.
fn first_mismatch(
    got: &ScoreBreakdown,
    expected: &ScoreBreakdown,
    tolerance: f64,
) -> Option<&'static str> {
    let pairs = [
        ("sim_interest", got.sim_interest, expected.sim_interest),
        ("time_overlap", got.time_overlap, expected.time_overlap),
        ("pay_norm", got.pay_norm, expected.pay_norm),
        ("travel_min", got.travel_min, expected.travel_min),
        ("distance_km", got.distance_km, expected.distance_km),
    ];
    pairs
        .into_iter()
        .find(|(_, g, e)| (g - e).abs() > tolerance)
        .map(|(name, _, _)| name)
}

/// Deterministic templated item used when the model output cannot be
/// trusted; echoes the known-correct numbers with zero confidence.
fn fallback_item(cand: &ScoredCandidate) -> ExplainItem {
    ExplainItem {
        job_id: cand.job_id,
        why_short: "Explanation unavailable; showing verified scores only.".to_string(),
        highlights: Vec::new(),
        warnings: Vec::new(),
        used_fields: Vec::new(),
        score_breakdown: cand.breakdown(),
        fallback: true,
        confidence: 0.0,
    }
}

/// Reproducibility hash over the user block and candidate count.
fn facts_hash(pack: &EnrichedFactpack) -> String {
    let summary = json!({
        "user": pack.user,
        "candidates_len": pack.candidates.len(),
    })
    .to_string();
    let head: String = summary.chars().take(1000).collect();
    crate::enrich::hex_sha256(head.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand() -> ScoredCandidate {
        ScoredCandidate {
            job_id: 11,
            sim_interest: 0.82,
            time_overlap: 0.75,
            time_overlap_job_norm: 0.75,
            pay_norm: 0.4,
            distance_km: Some(2.5),
            travel_min: Some(18),
            ..Default::default()
        }
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(
            strip_code_fences("```json\n{\"a\":1}\n```"),
            "{\"a\":1}"
        );
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parse_fills_defaults_from_candidate() {
        let item = parse_item("{\"why_short\": \"fits the morning schedule\"}", &cand()).unwrap();
        assert_eq!(item.job_id, 11);
        assert!(!item.fallback);
        assert_eq!(item.confidence, DEFAULT_CONFIDENCE);
        assert!(item.highlights.is_empty());
    }

    #[test]
    fn mismatch_detection_respects_tolerance() {
        let expected = cand().breakdown();
        let mut got = expected;
        got.pay_norm += 0.005;
        assert_eq!(first_mismatch(&got, &expected, 0.01), None);
        got.pay_norm = expected.pay_norm + 0.02;
        assert_eq!(first_mismatch(&got, &expected, 0.01), Some("pay_norm"));
    }

    #[test]
    fn fallback_echoes_deterministic_numbers() {
        let c = cand();
        let item = fallback_item(&c);
        assert!(item.fallback);
        assert_eq!(item.confidence, 0.0);
        assert_eq!(item.score_breakdown, c.breakdown());
        assert_eq!(item.score_breakdown.travel_min, 18.0);
    }
}
