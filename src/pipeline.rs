//! Orchestrator: chains the producer and consumer stages in-process.
//!
//! Earlier revisions of this pipeline shelled out to two separate scripts
//! and passed files between them; here both stages are plain library calls
//! sharing one LLM client, with the file plumbing kept for CLI
//! compatibility (intermediate producer output on disk, optional cleanup).

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::enrich::{enrich_factpack, EnrichOptions};
use crate::explain::{explain_factpack, ExplainOptions};
use crate::factpack::{EnrichedFactpack, ExplainReport, Factpack};
use crate::llm::LlmClient;

/// Run both stages over an in-memory factpack.
pub async fn run_pipeline(
    llm: &dyn LlmClient,
    pack: &Factpack,
    enrich_opts: &EnrichOptions,
    explain_opts: &ExplainOptions,
) -> (EnrichedFactpack, ExplainReport) {
    let started = Instant::now();
    let enriched = enrich_factpack(llm, pack, enrich_opts).await;
    let report = explain_factpack(llm, &enriched, explain_opts).await;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        candidates = enriched.candidates.len(),
        "pipeline finished"
    );
    (enriched, report)
}

/// Producer stage, file to file.
pub async fn run_producer_file(
    llm: &dyn LlmClient,
    input: &Path,
    output: &Path,
    opts: &EnrichOptions,
) -> Result<()> {
    let pack: Factpack = read_json(input)?;
    let started = Instant::now();
    let enriched = enrich_factpack(llm, &pack, opts).await;
    write_json(output, &enriched)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "producer stage written"
    );
    Ok(())
}

/// Consumer stage, file to file.
pub async fn run_consumer_file(
    llm: &dyn LlmClient,
    input: &Path,
    output: &Path,
    opts: &ExplainOptions,
) -> Result<()> {
    let enriched: EnrichedFactpack = read_json(input)?;
    let started = Instant::now();
    let report = explain_factpack(llm, &enriched, opts).await;
    write_json(output, &report)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        fallback_ratio = report.meta.fallback_ratio,
        "consumer stage written"
    );
    Ok(())
}

/// File-level orchestration with per-stage skip flags and optional cleanup
/// of the intermediate producer output.
#[allow(clippy::too_many_arguments)]
pub async fn run_pipeline_files(
    llm: &dyn LlmClient,
    input: &Path,
    producer_out: &Path,
    consumer_out: &Path,
    enrich_opts: &EnrichOptions,
    explain_opts: &ExplainOptions,
    skip_producer: bool,
    skip_consumer: bool,
    keep_intermediate: bool,
) -> Result<()> {
    if skip_producer {
        info!("producer stage skipped");
    } else {
        run_producer_file(llm, input, producer_out, enrich_opts).await?;
    }

    anyhow::ensure!(
        producer_out.exists(),
        "producer output missing: {}",
        producer_out.display()
    );

    if skip_consumer {
        info!("consumer stage skipped");
    } else {
        run_consumer_file(llm, producer_out, consumer_out, explain_opts).await?;
    }

    if !keep_intermediate && !skip_consumer {
        std::fs::remove_file(producer_out)
            .with_context(|| format!("removing intermediate {}", producer_out.display()))?;
        info!(path = %producer_out.display(), "intermediate removed");
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
