//! Factpack wire shapes passed between pipeline stages.
//!
//! Producer input (`Factpack`) comes from the backend with ranked candidates;
//! the producer emits an `EnrichedFactpack` (top-K candidates annotated with
//! the deterministic score bundle and LLM tags); the consumer turns that into
//! an `ExplainReport` for the backend. All derived fields are recomputed on
//! every run; nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::score::Availability;

/// Producer-stage input: user context + ranked candidate jobs + query meta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Factpack {
    #[serde(default)]
    pub user: UserContext,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub meta: MetaIn,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub availability_json: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub his_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub his_hash: Option<String>,
}

/// One ranked job candidate as delivered by the retrieval backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    pub job_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_wage: Option<f64>,
    /// 7-character Monday-first bitmask, e.g. "1111100".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_days: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_longitude: Option<f64>,
    /// Embedding-derived similarity from the retrieval stage.
    #[serde(default)]
    pub sim_interest: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaIn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

// ---- Producer output --------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedFactpack {
    pub user: EnrichedUser,
    pub candidates: Vec<ScoredCandidate>,
    pub meta: MetaOut,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_summary: Option<UserSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedUser {
    pub locale: String,
    pub age: u32,
    pub pref_keywords: Vec<String>,
    pub availability: Availability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub his_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub his_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub k: usize,
    pub computed_at: String,
}

/// Candidate annotated with the deterministic score bundle plus LLM-derived
/// `org`/`desc`/`features`. `time_overlap` mirrors `time_overlap_job_norm`
/// for backward compatibility with earlier report consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub job_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default)]
    pub desc: String,
    pub sim_interest: f64,
    pub time_overlap: f64,
    pub time_overlap_job_norm: f64,
    pub time_overlap_intersection_norm: f64,
    pub user_fit_ratio: f64,
    pub time_fit: f64,
    #[serde(default)]
    pub hourly_wage: f64,
    pub pay_norm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_min: Option<i64>,
    pub work_days: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub features: CandidateFeatures,
}

/// LLM tagging output; every field is optional and defaulted so a missing or
/// partial enrichment never breaks the candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateFeatures {
    /// "indoor" | "outdoor" | "mixed"
    #[serde(default)]
    pub indoor: Option<String>,
    #[serde(default)]
    pub english: Option<bool>,
    /// 1 = very light .. 5 = heavy.
    #[serde(default)]
    pub physical: Option<u8>,
    /// 1 = minimal .. 3 = customer-facing.
    #[serde(default)]
    pub interaction: Option<u8>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ---- Consumer output --------------------------------------------------

pub const EXPLAIN_VERSION: &str = "explain.v1.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainReport {
    pub version: String,
    pub items: Vec<ExplainItem>,
    pub meta: ExplainMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainMeta {
    pub llm_model: String,
    pub latency_ms: u64,
    pub prompt_tokens: u64,
    pub fallback_ratio: f64,
    pub facts_hash: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExplainItem {
    pub job_id: i64,
    #[serde(default)]
    pub why_short: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub used_fields: Vec<String>,
    #[serde(default)]
    pub score_breakdown: ScoreBreakdown,
    #[serde(default)]
    pub fallback: bool,
    #[serde(default)]
    pub confidence: f64,
}

/// The numeric fields the LLM must copy verbatim from the candidate; the
/// consumer stage verifies them against the deterministic values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub sim_interest: f64,
    #[serde(default)]
    pub time_overlap: f64,
    #[serde(default)]
    pub pay_norm: f64,
    #[serde(default)]
    pub travel_min: f64,
    #[serde(default)]
    pub distance_km: f64,
}

impl ScoredCandidate {
    /// The known-correct deterministic values for validation and fallbacks.
    pub fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            sim_interest: self.sim_interest,
            time_overlap: self.time_overlap,
            pay_norm: self.pay_norm,
            travel_min: self.travel_min.unwrap_or(0) as f64,
            distance_km: self.distance_km.unwrap_or(0.0),
        }
    }
}
