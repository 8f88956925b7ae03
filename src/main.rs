//! gigfit binary entrypoint.
//! CLI around the recommendation pipeline: run the producer and consumer
//! stages over JSON files, or serve them over HTTP.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gigfit::api::{create_router, AppState};
use gigfit::config::Config;
use gigfit::enrich::EnrichOptions;
use gigfit::explain::ExplainOptions;
use gigfit::llm::build_client;
use gigfit::pipeline::{run_consumer_file, run_pipeline_files, run_producer_file};

#[derive(Parser)]
#[command(name = "gigfit", about = "Job-recommendation scoring and explanation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Producer stage: score a factpack and enrich the top-K candidates.
    Produce {
        /// Producer input JSON (factpack).
        #[arg(short, long, default_value = "sample/be_input.json")]
        input: PathBuf,
        #[arg(short, long, default_value = "ai_1_output.json")]
        output: PathBuf,
        /// Candidates to keep and enrich.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Candidates per LLM call.
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
    /// Consumer stage: generate per-candidate explanations.
    Explain {
        /// Producer output JSON.
        #[arg(short, long, default_value = "ai_1_output.json")]
        input: PathBuf,
        #[arg(short, long, default_value = "explain.json")]
        output: PathBuf,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Run producer then consumer in one process.
    Run {
        #[arg(short, long, default_value = "sample/be_input.json")]
        input: PathBuf,
        /// Intermediate producer output.
        #[arg(long, default_value = "ai_1_output.json")]
        p_out: PathBuf,
        /// Final explanation report.
        #[arg(long, default_value = "explain.json")]
        c_out: PathBuf,
        /// Top-K for the consumer stage.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Top-K for the producer stage (defaults to the consumer's).
        #[arg(long)]
        p_top_k: Option<usize>,
        /// Reuse an existing intermediate instead of running the producer.
        #[arg(long)]
        skip_producer: bool,
        #[arg(long)]
        skip_consumer: bool,
        /// Delete the intermediate after a successful run.
        #[arg(long)]
        no_keep: bool,
    },
    /// Serve the pipeline over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gigfit=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::load();
    let llm = build_client(&config.llm);
    let cli = Cli::parse();

    match cli.command {
        Command::Produce {
            input,
            output,
            top_k,
            batch_size,
        } => {
            let opts = EnrichOptions {
                top_k: top_k.unwrap_or(config.pipeline.top_k),
                batch_size: batch_size.unwrap_or(config.pipeline.batch_size),
            };
            run_producer_file(llm.as_ref(), &input, &output, &opts).await?;
        }
        Command::Explain {
            input,
            output,
            top_k,
        } => {
            let opts = ExplainOptions {
                top_k: top_k.unwrap_or(config.pipeline.top_k),
                tolerance: config.pipeline.tolerance,
            };
            run_consumer_file(llm.as_ref(), &input, &output, &opts).await?;
        }
        Command::Run {
            input,
            p_out,
            c_out,
            top_k,
            p_top_k,
            skip_producer,
            skip_consumer,
            no_keep,
        } => {
            let k = top_k.unwrap_or(config.pipeline.top_k);
            let enrich_opts = EnrichOptions {
                top_k: p_top_k.unwrap_or(k),
                batch_size: config.pipeline.batch_size,
            };
            let explain_opts = ExplainOptions {
                top_k: k,
                tolerance: config.pipeline.tolerance,
            };
            run_pipeline_files(
                llm.as_ref(),
                &input,
                &p_out,
                &c_out,
                &enrich_opts,
                &explain_opts,
                skip_producer,
                skip_consumer,
                !no_keep,
            )
            .await?;
        }
        Command::Serve { port } => {
            let state = AppState { llm, config };
            let router = create_router(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            tracing::info!(port, "serving recommendation API");
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
