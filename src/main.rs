//! Souschef - AI-powered kitchen assistant
//!
//! Chat with a kitchen assistant that manages your recipes, shopping
//! list, and meal plan through a shared record store.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use souschef::config::{Settings, XdgDirs};
use souschef::runs::{HttpRunService, RunConfig, RunService};
use souschef::session::ThreadSession;
use souschef::store::{HttpRecordStore, MemoryRecordStore, RecordStore};
use souschef::threads::ThreadRegistry;
use souschef::tools::{HttpRecipeDrafter, ToolCallCoordinator, ToolRegistry};

/// Souschef - your AI kitchen companion 🧑‍🍳
#[derive(Parser, Debug)]
#[command(name = "sous")]
#[command(version, about, long_about = None)]
struct Args {
    /// Execute a single prompt on a fresh thread and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Open this thread instead of starting fresh
    #[arg(short, long)]
    thread: Option<String>,

    /// Keep records in memory instead of the hosted store
    #[arg(long)]
    offline: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let default_filter = if args.verbose {
            "trace"
        } else if args.debug {
            "debug"
        } else {
            "warn"
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        if args.debug || args.verbose {
            tracing::info!("Debug logging enabled");
        }

        let xdg = XdgDirs::new();
        xdg.ensure_dirs()?;
        let settings = Settings::load(&xdg.settings_file())?;

        let api_key = settings.require_api_key()?.to_string();
        let assistant_id = settings.require_assistant_id()?.to_string();

        let service: Arc<dyn RunService> =
            Arc::new(HttpRunService::new(&settings.api_base, &api_key));

        let offline = args.offline || settings.offline;
        let store: Arc<dyn RecordStore> = match settings.store_credentials() {
            Some((base, key)) if !offline => Arc::new(HttpRecordStore::new(base, key)),
            _ => {
                if !offline {
                    tracing::warn!("No record store configured; using in-memory store");
                }
                Arc::new(MemoryRecordStore::new())
            }
        };

        let drafter = Arc::new(HttpRecipeDrafter::new(
            &settings.api_base,
            &api_key,
            &settings.model,
        ));
        let registry = Arc::new(ToolRegistry::with_kitchen_tools(store.clone(), drafter));
        let coordinator = ToolCallCoordinator::new(registry);

        let mut session = ThreadSession::new(
            service.clone(),
            coordinator,
            RunConfig { assistant_id },
        );
        let threads = ThreadRegistry::new(service, store);

        if let Some(thread_id) = &args.thread {
            session.select_thread(thread_id).await?;
        }

        if let Some(prompt) = &args.prompt {
            souschef::cli::run_single_prompt(session, threads, prompt).await
        } else {
            souschef::cli::run_interactive(session, threads).await
        }
    })
}
