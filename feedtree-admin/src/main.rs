use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use feedtree_core::config::TreeConfig;
use feedtree_core::services::{StaticSource, TreeSession};
use feedtree_core::tree::{PluginInstance, build_layout, parse_instances};
use feedtree_core::utils::logbook::append_anomalies;

#[derive(Parser)]
#[command(
    name = "feedtree-admin",
    about = "Build plugin-instance trees and layouts from ChRIS feed dumps"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// One-shot node/link layout of a full instance list
    Layout {
        #[arg(long)]
        input: PathBuf,
        /// Parent id of the wanted root (omit for the feed's root instance)
        #[arg(long)]
        root_parent: Option<u64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Incremental tree built page by page, newest first
    Build {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 0)]
        feed: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides `[logbook] anomaly_log`
        #[arg(long)]
        anomaly_log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Layout {
            input,
            root_parent,
            config,
        } => layout(&input, root_parent, config.as_deref()),
        Cmd::Build {
            input,
            feed,
            config,
            anomaly_log,
        } => build(&input, feed, config.as_deref(), anomaly_log),
    }
}

fn load_config(dir: Option<&Path>) -> Result<TreeConfig> {
    match dir {
        Some(d) => TreeConfig::load(d),
        None => Ok(TreeConfig::default()),
    }
}

fn read_instances(input: &Path) -> Result<Vec<PluginInstance>> {
    let text = fs::read_to_string(input).with_context(|| format!("read {:?}", input))?;
    parse_instances(&text).with_context(|| format!("parse plugin instances from {:?}", input))
}

fn layout(input: &Path, root_parent: Option<u64>, config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let items = read_instances(input)?;
    let tree = build_layout(&items, root_parent);

    let nodes: Vec<_> = tree
        .nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "index": n.index,
                "id": n.item.id,
                "title": n.item.title,
                "isRoot": n.is_root,
            })
        })
        .collect();
    let out = serde_json::json!({
        "nodes": nodes,
        "links": tree.links,
        "totalRows": tree.total_rows,
        "height": tree.canvas_height(&cfg.layout),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn build(input: &Path, feed: u64, config: Option<&Path>, anomaly_log: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config)?;
    let items = read_instances(input)?;
    let source = StaticSource::new(items);
    let session = TreeSession::new(feed, cfg.fetch.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    let report = runtime.block_on(session.load(&source))?;

    let anomalies = session.take_anomalies();
    if let Some(path) = anomaly_log.or(cfg.logbook.anomaly_log.clone()) {
        let n = append_anomalies(&path, feed, &anomalies)?;
        if n > 0 {
            eprintln!("wrote {n} anomalies to {}", path.display());
        }
    }

    let view = session.view();
    let out = serde_json::json!({
        "total": report.total,
        "chunk": report.chunk,
        "pages": report.pages,
        "integrated": report.integrated,
        "skipped": report.skipped,
        "anomalies": anomalies,
        "tree": view.snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
