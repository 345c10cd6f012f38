//! `cogmem` — a thin CLI over the cognitive memory engine. Subcommands map
//! one-to-one onto `Coordinator` operations; no protocol plumbing lives
//! here.

mod args;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cogmem_core::{
    CognitiveConfig, Coordinator, DeterministicEncoder, Encoder, ManualEntryLoader, MetadataStore,
    SourceLoader, VectorStore,
};

use args::{Cli, Command};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_encoder() -> Arc<dyn Encoder> {
    #[cfg(feature = "embeddings")]
    {
        Arc::new(cogmem_core::encoder::FastEmbedEncoder::default())
    }
    #[cfg(not(feature = "embeddings"))]
    {
        Arc::new(DeterministicEncoder::default())
    }
}

fn build_coordinator(db_path: Option<PathBuf>, repo_path: Option<PathBuf>) -> Result<Coordinator> {
    let store = Arc::new(MetadataStore::new(db_path).context("opening metadata store")?);
    let project_id = repo_path
        .as_deref()
        .map(cogmem_core::derive_project_id)
        .unwrap_or_else(|| "cogmem_cli".to_string());
    let vectors = Arc::new(VectorStore::new(project_id));
    let config = CognitiveConfig::from_env();
    let encoder = build_encoder();
    Ok(Coordinator::new(store, vectors, encoder, config, repo_path))
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let coordinator = build_coordinator(cli.db_path.clone(), cli.repo_path.clone())?;

    match cli.command {
        Command::Store { text, level, tag, meta } => {
            let mut metadata = std::collections::HashMap::new();
            for kv in meta {
                let Some((k, v)) = kv.split_once('=') else {
                    anyhow::bail!("--meta expects key=value, got {kv}");
                };
                metadata.insert(k.to_string(), v.to_string());
            }

            let context = cogmem_core::StoreContext {
                hierarchy_level: level,
                tags: tag,
                metadata,
            };

            let id = coordinator.store_experience(&text, Some(context));
            if id.is_empty() {
                anyhow::bail!("store_experience failed");
            }
            println!("{id}");
        }

        Command::Retrieve { query, max_results, no_core, no_peripheral, no_bridge } => {
            let types = cogmem_core::RetrievalTypes {
                core: !no_core,
                peripheral: !no_peripheral,
                bridge: !no_bridge,
            };
            let result = coordinator.retrieve_memories(&query, types, max_results);
            print_retrieval(&result)?;
        }

        Command::Consolidate { cleanup } => {
            let report = coordinator.consolidate_memories()?;
            println!(
                "candidates={} consolidated={} errors={}",
                report.candidates_identified, report.memories_consolidated, report.errors
            );
            if cleanup {
                let removed = coordinator.cleanup_expired_memories()?;
                println!("expired_removed={removed}");
            }
        }

        Command::Load { path } => {
            let loader = ManualEntryLoader;
            let report = coordinator.load_memories_from_source(&loader, &path);
            print_json(&LoadReportView::from(&report))?;
            if !report.success {
                anyhow::bail!(report.error.unwrap_or_else(|| "load failed".to_string()));
            }
        }

        Command::Upsert { path } => {
            let loader = ManualEntryLoader;
            let memories = loader.load_from_source(&path).context("loading memories to upsert")?;
            let report = coordinator.upsert_memories(&memories)?;
            println!(
                "inserted={} updated={}",
                report.inserted, report.updated
            );
        }
    }

    Ok(())
}

fn print_retrieval(result: &cogmem_core::RetrievalResult) -> Result<()> {
    #[derive(serde::Serialize)]
    struct MemoryView<'a> {
        id: &'a str,
        content: &'a str,
        level: u8,
    }

    #[derive(serde::Serialize)]
    struct BridgeView<'a> {
        id: &'a str,
        content: &'a str,
        bridge_score: f32,
        explanation: &'a str,
    }

    #[derive(serde::Serialize)]
    struct View<'a> {
        core: Vec<MemoryView<'a>>,
        peripheral: Vec<MemoryView<'a>>,
        bridge: Vec<BridgeView<'a>>,
    }

    let view = View {
        core: result
            .core
            .iter()
            .map(|m| MemoryView { id: &m.id, content: &m.content, level: m.level.as_u8() })
            .collect(),
        peripheral: result
            .peripheral
            .iter()
            .map(|m| MemoryView { id: &m.id, content: &m.content, level: m.level.as_u8() })
            .collect(),
        bridge: result
            .bridge
            .iter()
            .map(|b| BridgeView {
                id: &b.memory.id,
                content: &b.memory.content,
                bridge_score: b.bridge_score,
                explanation: &b.explanation,
            })
            .collect(),
    };

    print_json(&view)
}

#[derive(serde::Serialize)]
struct LoadReportView {
    success: bool,
    error: Option<String>,
    memories_loaded: u64,
    connections_created: u64,
    hierarchy_distribution: std::collections::HashMap<String, u64>,
    processing_time_ms: u64,
    memories_failed: u64,
    connections_failed: u64,
}

impl From<&cogmem_core::LoadReport> for LoadReportView {
    fn from(r: &cogmem_core::LoadReport) -> Self {
        Self {
            success: r.success,
            error: r.error.clone(),
            memories_loaded: r.memories_loaded,
            connections_created: r.connections_created,
            hierarchy_distribution: r.hierarchy_distribution.clone(),
            processing_time_ms: r.processing_time_ms,
            memories_failed: r.memories_failed,
            connections_failed: r.connections_failed,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
