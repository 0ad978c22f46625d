//! proposal: generate grounded business proposals from the command line.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use proposal_chat::{LLMConfig, RemoteModel};
use proposal_core::ProposalConfig;
use proposal_index::CorpusIndexer;
use proposal_runtime::ProposalPipeline;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Command;

fn resolve_data_dir() -> PathBuf {
    std::env::var("PROPOSAL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!();
            eprintln!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    match command {
        Command::Help => println!("{}", cli::USAGE),
        Command::Index => {
            let config = load_config()?;
            let embedder = proposal_infer::create_embedder(
                &config.model_dir,
                &config.embedding_model_id,
                config.embedding_dim,
            );
            let indexer = CorpusIndexer::new(&config, embedder);
            let index = tokio::task::spawn_blocking(move || indexer.build()).await??;

            let documents: BTreeSet<&str> = index
                .iter()
                .flat_map(|i| i.records())
                .map(|r| r.source.as_str())
                .collect();
            let summary = serde_json::json!({
                "indexed": index.is_some(),
                "chunks": index.as_ref().map_or(0, |i| i.len()),
                "documents": documents,
                "modelId": index.as_ref().map(|i| i.model_id()),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Generate { files, brief } => {
            let brief = brief.resolve()?;
            let config = load_config()?;
            let llm_config = LLMConfig::load(&config.llm_config_file);
            let model = Arc::new(RemoteModel::from_config(
                &llm_config,
                config.request_timeout(),
            )?);
            let embedder = proposal_infer::create_embedder(
                &config.model_dir,
                &config.embedding_model_id,
                config.embedding_dim,
            );
            let pipeline = ProposalPipeline::new(config, embedder, model);

            let outcome = pipeline.generate(&files, &brief).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn load_config() -> anyhow::Result<ProposalConfig> {
    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    Ok(ProposalConfig::load(&data_dir)?)
}
