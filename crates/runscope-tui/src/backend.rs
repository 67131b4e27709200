//! Background task that talks to the dashboard API.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use runscope_client::{DashboardClient, RunLoader};
use runscope_core::LoadEvent;

use crate::event::{BackendCommand, ConnectionState, UiEvent};
use crate::state::{PipelineListing, RunListing};

/// Run the backend loop.
///
/// This function runs in a separate thread with its own tokio runtime. Each
/// load request is spawned as its own task so a newer request never waits on
/// an older one; the UI drops results that arrive for superseded loads.
pub async fn run_backend(
    client: Arc<DashboardClient>,
    loader: RunLoader,
    pipeline: Option<String>,
    ui_tx: mpsc::Sender<UiEvent>,
    mut cmd_rx: mpsc::Receiver<BackendCommand>,
) {
    let (load_tx, mut load_rx) = mpsc::channel::<LoadEvent>(16);

    let state = match client.health().await {
        Ok(true) => ConnectionState::Connected,
        Ok(false) => ConnectionState::Unreachable,
        Err(e) => {
            error!(error = %e, "Dashboard health check failed");
            ConnectionState::Unreachable
        }
    };
    info!(state = ?state, "Dashboard reachability");
    let _ = ui_tx.send(UiEvent::ConnectionStateChanged(state)).await;

    list_pipelines(&client, &ui_tx).await;
    list_runs(&client, pipeline, &ui_tx).await;

    loop {
        tokio::select! {
            // Settled fetch phases from spawned loads
            Some(event) = load_rx.recv() => {
                debug!(
                    run = %event.ticket().run_name(),
                    generation = event.ticket().generation(),
                    "Forwarding load event"
                );
                if ui_tx.send(UiEvent::Load(event)).await.is_err() {
                    break;
                }
            }

            // Commands from UI thread
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(BackendCommand::Load(ticket)) => {
                        loader.spawn(ticket, load_tx.clone());
                    }
                    Some(BackendCommand::ListPipelines) => {
                        list_pipelines(&client, &ui_tx).await;
                    }
                    Some(BackendCommand::ListRuns(pipeline)) => {
                        list_runs(&client, pipeline, &ui_tx).await;
                    }
                    Some(BackendCommand::Quit) | None => {
                        info!("Received quit command, shutting down backend");
                        break;
                    }
                }
            }
        }
    }

    info!("Backend shutdown complete");
}

async fn list_pipelines(client: &DashboardClient, ui_tx: &mpsc::Sender<UiEvent>) {
    match client.fetch_pipelines().await {
        Ok(pipelines) => {
            debug!(count = pipelines.len(), "Fetched pipelines");
            let listings = pipelines.iter().map(PipelineListing::from_pipeline).collect();
            let _ = ui_tx.send(UiEvent::PipelinesListed(listings)).await;
        }
        Err(e) => {
            debug!(error = %e, "Failed to list pipelines");
            let _ = ui_tx.send(UiEvent::Error(format!("Pipelines: {}", e))).await;
        }
    }
}

async fn list_runs(
    client: &DashboardClient,
    pipeline: Option<String>,
    ui_tx: &mpsc::Sender<UiEvent>,
) {
    match client.fetch_pipeline_runs(pipeline.as_deref()).await {
        Ok(runs) => {
            debug!(count = runs.len(), pipeline = ?pipeline, "Fetched pipeline runs");
            let runs = runs.iter().map(RunListing::from_run).collect();
            let _ = ui_tx.send(UiEvent::RunsListed { pipeline, runs }).await;
        }
        Err(e) => {
            debug!(error = %e, "Failed to list pipeline runs");
            let _ = ui_tx.send(UiEvent::Error(format!("Runs: {}", e))).await;
        }
    }
}
