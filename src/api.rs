//! HTTP surface: health probe, deterministic scoring, full recommendation.
//!
//! The CRUD/geocoding backends of the wider service live elsewhere; this
//! router only exposes the pipeline itself. State is built once at startup
//! and passed in; the LLM client is a capability object, not a global.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::enrich::EnrichOptions;
use crate::explain::ExplainOptions;
use crate::factpack::{ExplainReport, Factpack};
use crate::llm::DynLlmClient;
use crate::pipeline::run_pipeline;
use crate::score::{
    estimate_travel_min, haversine_km, overlap_metrics, Availability, OverlapMetrics,
};

#[derive(Clone)]
pub struct AppState {
    pub llm: DynLlmClient,
    pub config: Config,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/score", post(score))
        .route("/api/recommend", post(recommend))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct ScoreReq {
    #[serde(default)]
    availability: Availability,
    work_days: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    home_latitude: Option<f64>,
    #[serde(default)]
    home_longitude: Option<f64>,
    #[serde(default)]
    job_latitude: Option<f64>,
    #[serde(default)]
    job_longitude: Option<f64>,
}

#[derive(Serialize)]
struct ScoreResp {
    job_norm: f64,
    intersection_norm: f64,
    user_fit_ratio: f64,
    time_fit: f64,
    overlap_min: i64,
    job_total_min: i64,
    user_total_min: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    travel_min: Option<i64>,
}

/// Deterministic score bundle for one availability/shift pair. No LLM.
async fn score(Json(req): Json<ScoreReq>) -> Json<ScoreResp> {
    let m: OverlapMetrics = overlap_metrics(
        &req.availability,
        &req.work_days,
        &req.start_time,
        &req.end_time,
    );

    let (distance_km, travel_min) = match (
        req.home_latitude,
        req.home_longitude,
        req.job_latitude,
        req.job_longitude,
    ) {
        (Some(hlat), Some(hlon), Some(jlat), Some(jlon)) => {
            let km = crate::score::round2(haversine_km(hlat, hlon, jlat, jlon));
            (Some(km), Some(estimate_travel_min(km)))
        }
        _ => (None, None),
    };

    Json(ScoreResp {
        job_norm: m.job_norm,
        intersection_norm: m.intersection_norm,
        user_fit_ratio: m.user_fit_ratio,
        time_fit: m.time_fit,
        overlap_min: m.overlap_min,
        job_total_min: m.job_total_min,
        user_total_min: m.user_total_min,
        distance_km,
        travel_min,
    })
}

/// Full pipeline over a posted factpack.
async fn recommend(
    State(state): State<AppState>,
    Json(pack): Json<Factpack>,
) -> Json<ExplainReport> {
    let enrich_opts = EnrichOptions {
        top_k: pack.meta.k.unwrap_or(state.config.pipeline.top_k),
        batch_size: state.config.pipeline.batch_size,
    };
    let explain_opts = ExplainOptions {
        top_k: enrich_opts.top_k,
        tolerance: state.config.pipeline.tolerance,
    };
    let (_, report) = run_pipeline(state.llm.as_ref(), &pack, &enrich_opts, &explain_opts).await;
    Json(report)
}
