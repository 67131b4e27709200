//! Runscope Terminal UI.
//!
//! Terminal dashboard for a single Tekton pipeline run: its status, task runs
//! and per-step detail, with a picker for switching between runs.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod event;
mod state;
mod ui;

use app::App;
use event::{BackendCommand, UiEvent};
use runscope_client::{ClientConfig, DashboardClient, RunLoader};
use runscope_core::BatchPolicy;

#[derive(Parser)]
#[command(name = "runscope-tui")]
#[command(about = "Terminal dashboard for Tekton pipeline runs")]
#[command(version)]
struct Cli {
    /// Pipeline run to open (omit to start in the run picker)
    run: Option<String>,

    /// Dashboard base URL
    #[arg(short, long, env = "RUNSCOPE_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Namespace to observe ("*" for all namespaces)
    #[arg(short, long, env = "RUNSCOPE_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Only list runs of this pipeline in the run picker
    #[arg(short, long)]
    pipeline: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Keep showing task runs that loaded when others fail to load
    #[arg(long)]
    isolate_failures: bool,

    /// Log file (the terminal is owned by the UI)
    #[arg(long, default_value = "/tmp/runscope-tui.log")]
    log_file: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Logs go to a file to avoid terminal interference
    if let Ok(file) = std::fs::File::create(&cli.log_file) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("runscope_tui=debug,runscope_client=debug"));
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_env_filter(filter)
            .with_ansi(false)
            .init();
    }

    let config = ClientConfig {
        base_url: cli.url,
        namespace: cli.namespace,
        timeout: Duration::from_secs(cli.timeout),
    };
    let client = Arc::new(DashboardClient::new(&config)?);
    let policy = if cli.isolate_failures {
        BatchPolicy::Isolated
    } else {
        BatchPolicy::FailFast
    };
    let loader = RunLoader::new(client.clone()).with_policy(policy);

    info!(
        url = %config.base_url,
        namespace = %config.namespace,
        policy = ?policy,
        "Starting runscope TUI"
    );

    // Create channels for UI <-> backend communication
    let (ui_tx, ui_rx) = mpsc::channel::<UiEvent>(100);
    let (cmd_tx, cmd_rx) = mpsc::channel::<BackendCommand>(100);

    // Background thread with its own tokio runtime
    let runtime = tokio::runtime::Runtime::new()?;
    let pipeline = cli.pipeline.clone();
    let bg_handle = std::thread::spawn(move || {
        runtime.block_on(backend::run_backend(client, loader, pipeline, ui_tx, cmd_rx));
    });

    // Initialize terminal (enters alternate screen, enables raw mode)
    let terminal = ratatui::init();

    let mut app = App::new(ui_rx, cmd_tx, &config.namespace, cli.pipeline);
    if let Some(run) = cli.run {
        app.open_run(run);
    }
    let result = app.run(terminal);

    // Restore terminal (exits alternate screen, disables raw mode)
    ratatui::restore();

    // Wait for background thread to finish
    let _ = bg_handle.join();

    info!("TUI shutdown complete");

    result.map_err(|e| e.into())
}
