//! storybox — command-line host bridge for the toolbox
//!
//! Drives one editing session the way the desktop shell would: load a page,
//! restore persisted tool settings, activate a tool, recompute markup, and
//! print the mutated page as JSON.
//!
//! Usage:
//!   storybox --page page.json                          → markup pass only
//!   storybox --page page.json --tool overlay           → activate a tool
//!   storybox --page page.json --settings blobs.json    → restore settings
//!   storybox --page page.json --script events.jsonl    → replay host events

use anyhow::Context;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use storybox_core::{HostEvent, Page};
use storybox_toolbox::{create_default_toolbox, ToolboxConfig};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "storybox",
    about = "Toolbox host bridge for page editing sessions",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Page JSON to load into the edit surface
    #[arg(short, long)]
    page: PathBuf,

    /// Tool to activate after the page loads
    #[arg(short, long)]
    tool: Option<String>,

    /// JSON object mapping tool id to its persisted settings blob
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Host event script (one HostEvent JSON object per line), replayed
    /// after the page loads
    #[arg(long)]
    script: Option<PathBuf>,

    /// Offer experimental tools
    #[arg(long, default_value_t = false)]
    experimental: bool,

    /// Write the resulting page here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print persistence events the toolbox emits (JSON lines on stderr)
    #[arg(long, default_value_t = false)]
    events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storybox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let page: Page = serde_json::from_str(
        &std::fs::read_to_string(&cli.page)
            .with_context(|| format!("reading page file {}", cli.page.display()))?,
    )
    .context("parsing page JSON")?;

    let mut toolbox = create_default_toolbox(ToolboxConfig {
        show_experimental: cli.experimental,
    })?;
    let mut settings_rx = toolbox.subscribe_settings_events();

    if let Some(path) = &cli.settings {
        let blobs: HashMap<String, String> = serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?,
        )
        .context("parsing settings JSON")?;
        toolbox.on_settings_blob_available(blobs);
    }

    let page_handle = Arc::new(RwLock::new(page));
    toolbox.on_new_page(page_handle.clone()).await;

    if let Some(id) = &cli.tool {
        toolbox.activate_tool(id).await?;
    }

    if let Some(path) = &cli.script {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("reading script file {}", path.display()))?;
        for (lineno, line) in script.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: HostEvent = serde_json::from_str(line)
                .with_context(|| format!("parsing host event on line {}", lineno + 1))?;
            toolbox.handle_event(event).await?;
        }
    }

    toolbox.on_content_changed().await;
    toolbox.wait_for_background_work().await;

    // A script may have swapped pages; print whichever page is current.
    let final_page = toolbox.page().unwrap_or(page_handle);
    let result = serde_json::to_string_pretty(&*final_page.read().await)?;
    match &cli.out {
        Some(path) => std::fs::write(path, result)
            .with_context(|| format!("writing page to {}", path.display()))?,
        None => println!("{result}"),
    }

    if cli.events {
        while let Ok(event) = settings_rx.try_recv() {
            eprintln!("{}", serde_json::to_string(&event)?);
        }
    }

    Ok(())
}
