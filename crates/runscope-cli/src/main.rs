//! Runscope CLI - inspect Tekton pipeline runs from the command line.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use runscope_client::{load_session, ClientConfig, DashboardClient, RunLoader};
use runscope_core::{
    format_duration, format_timestamp, BatchPolicy, LoadError, RunSession, StatusSummary,
    TaskRunFailure, TaskRunView,
};

/// Runscope CLI - pipeline run inspection tool
#[derive(Parser)]
#[command(name = "runscope")]
#[command(about = "Inspect Tekton pipeline runs through the dashboard API", long_about = None)]
#[command(version)]
struct Cli {
    /// Dashboard base URL
    #[arg(short, long, env = "RUNSCOPE_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Namespace to query
    #[arg(short, long, env = "RUNSCOPE_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Keep task runs that loaded when others fail to load
    #[arg(long)]
    isolate_failures: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a pipeline run with its task runs and steps
    Show {
        /// Pipeline run name
        run: String,

        /// Print the projected run as JSON
        #[arg(long)]
        json: bool,
    },

    /// List pipelines in the namespace
    #[command(name = "list-pipelines")]
    ListPipelines,

    /// List pipeline runs, newest first
    #[command(name = "list-runs")]
    ListRuns {
        /// Only runs of this pipeline
        #[arg(short, long)]
        pipeline: Option<String>,
    },

    /// Check that the dashboard is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

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

    match cli.command {
        Commands::Show { run, json } => {
            show_run(client, policy, &run, json).await?;
        }
        Commands::ListPipelines => {
            list_pipelines(&client).await?;
        }
        Commands::ListRuns { pipeline } => {
            list_runs(&client, pipeline.as_deref()).await?;
        }
        Commands::Health => {
            health(&client).await?;
        }
    }

    Ok(())
}

async fn show_run(
    client: Arc<DashboardClient>,
    policy: BatchPolicy,
    run_name: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = RunLoader::new(client).with_policy(policy);
    let mut session = RunSession::new();

    debug!(run = %run_name, ?policy, "Loading pipeline run");
    load_session(&loader, &mut session, run_name).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&RunReport::from_session(&session))?);
    } else {
        print!("{}", render_session(&session));
    }

    match session.error() {
        Some(error) => Err(error.clone().into()),
        None => Ok(()),
    }
}

async fn list_pipelines(client: &DashboardClient) -> Result<(), Box<dyn std::error::Error>> {
    let pipelines = client.fetch_pipelines().await?;

    println!("Pipelines ({}):", pipelines.len());
    println!("{:<40}  {:<6}  {}", "NAME", "TASKS", "CREATED");
    println!("{}", "-".repeat(72));

    for pipeline in &pipelines {
        println!(
            "{:<40}  {:<6}  {}",
            pipeline.name(),
            pipeline.spec.tasks.len(),
            format_timestamp(pipeline.metadata.creation_timestamp),
        );
    }

    Ok(())
}

async fn list_runs(
    client: &DashboardClient,
    pipeline: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runs = client.fetch_pipeline_runs(pipeline).await?;

    println!("Pipeline runs ({}):", runs.len());
    println!("{:<40}  {:<24}  {:<10}  {}", "NAME", "PIPELINE", "STATUS", "CREATED");
    println!("{}", "-".repeat(96));

    for run in &runs {
        let phase = runscope_core::classify(run).phase();
        println!(
            "{:<40}  {:<24}  {:<10}  {}",
            run.name(),
            run.pipeline_name().unwrap_or("-"),
            phase.label(),
            format_timestamp(run.metadata.creation_timestamp),
        );
    }

    Ok(())
}

async fn health(client: &DashboardClient) -> Result<(), Box<dyn std::error::Error>> {
    if client.health().await? {
        println!("Dashboard is healthy");
        Ok(())
    } else {
        Err("dashboard health check failed".into())
    }
}

/// Machine-readable view of a loaded session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport<'a> {
    run: Option<&'a str>,
    pipeline: Option<&'a str>,
    status: StatusSummary,
    task_runs: &'a [TaskRunView],
    #[serde(skip_serializing_if = "no_failures")]
    failures: &'a [TaskRunFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

fn no_failures(failures: &&[TaskRunFailure]) -> bool {
    failures.is_empty()
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    summary: &'static str,
    message: String,
}

impl<'a> RunReport<'a> {
    fn from_session(session: &'a RunSession) -> Self {
        Self {
            run: session.run_name(),
            pipeline: session.pipeline_run().and_then(|run| run.pipeline_name()),
            status: session.run_status(),
            task_runs: session.task_runs(),
            failures: session.failures(),
            error: session.error().map(|error: &LoadError| ErrorReport {
                summary: error.summary(),
                message: error.to_string(),
            }),
        }
    }
}

/// Human-readable tree of a loaded session.
fn render_session(session: &RunSession) -> String {
    let mut out = String::new();
    let run_name = session.run_name().unwrap_or("-");

    if let Some(error) = session.error() {
        out.push_str(&format!("{}: {}\n", error.summary(), run_name));
        out.push_str(&format!("  {}\n", error));
        return out;
    }

    let summary = session.run_status();
    let pipeline = session
        .pipeline_run()
        .and_then(|run| run.pipeline_name())
        .unwrap_or("-");
    out.push_str(&format!("Pipeline:   {}\n", pipeline));
    out.push_str(&format!("Run:        {}\n", run_name));
    out.push_str(&format!("Status:     {}\n", summary.phase().label()));
    if let Some(reason) = &summary.reason {
        out.push_str(&format!("Reason:     {}\n", reason));
    }
    out.push_str(&format!(
        "Transition: {}\n",
        format_timestamp(summary.last_transition_time)
    ));

    if !session.task_runs().is_empty() {
        out.push_str("Task runs:\n");
    }
    for task_run in session.task_runs() {
        let succeeded = task_run
            .succeeded
            .map(|status| status.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  - {} ({}) [{}]",
            task_run.pipeline_task_name, task_run.task_run_name, succeeded
        ));
        if let Some(reason) = &task_run.reason {
            out.push_str(&format!(" {}", reason));
        }
        out.push('\n');

        for step in &task_run.steps {
            let phase = step
                .status
                .map(|phase| phase.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            out.push_str(&format!("      {:<24} {:<10}", step.step_name, phase));
            if let Some(reason) = &step.reason {
                out.push_str(&format!(" {}", reason));
            }
            if let Some(duration) = step.duration() {
                out.push_str(&format!(" ({})", format_duration(duration)));
            }
            out.push('\n');
        }
    }

    for failure in session.failures() {
        out.push_str(&format!(
            "  ! {} ({}): {}\n",
            failure.pipeline_task_name, failure.task_run_name, failure.error
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use runscope_core::{LoadEvent, PipelineRun, Task, TaskRun, TaskRunFetch};
    use serde_json::json;

    fn loaded_session() -> RunSession {
        let mut session = RunSession::new();
        let ticket = session.begin("pr-1");
        let run: PipelineRun = serde_json::from_value(json!({
            "metadata": { "name": "pr-1" },
            "spec": { "pipelineRef": { "name": "ci" } },
            "status": {
                "conditions": [{ "type": "Succeeded", "status": "False", "reason": "Failed" }],
                "taskRuns": { "pr-1-build": { "pipelineTaskName": "build" } }
            }
        }))
        .unwrap();
        let task: Task = serde_json::from_value(json!({
            "metadata": { "name": "build-task" },
            "spec": { "steps": [{ "name": "compile", "image": "rust" }] }
        }))
        .unwrap();
        session.apply(LoadEvent::RunFetched {
            ticket: ticket.clone(),
            result: Ok((run, vec![task])),
        });

        let task_run: TaskRun = serde_json::from_value(json!({
            "metadata": { "name": "pr-1-build", "uid": "u1" },
            "spec": { "taskRef": { "name": "build-task" } },
            "status": {
                "podName": "pod-1",
                "conditions": [{ "type": "Succeeded", "status": "False", "reason": "Failed" }],
                "steps": [{ "name": "compile", "terminated": { "reason": "Error", "exitCode": 1 } }]
            }
        }))
        .unwrap();
        session.apply(LoadEvent::TaskRunsFetched {
            ticket,
            batch: Ok(vec![TaskRunFetch {
                task_run_name: "pr-1-build".to_string(),
                result: Ok(task_run),
            }]),
        });
        session
    }

    #[test]
    fn test_render_session_tree() {
        let out = render_session(&loaded_session());
        assert!(out.contains("Pipeline:   ci"));
        assert!(out.contains("Status:     Failed"));
        assert!(out.contains("- build (pr-1-build) [False] Failed"));
        assert!(out.contains("compile"));
        assert!(out.contains("terminated"));
        assert!(out.contains(" Error"));
    }

    #[test]
    fn test_render_session_not_found() {
        let mut session = RunSession::new();
        let ticket = session.begin("missing");
        session.apply(LoadEvent::RunFetched {
            ticket,
            result: Err(LoadError::NotFound("pipelinerun missing".to_string())),
        });

        let out = render_session(&session);
        assert!(out.starts_with("Not Found: missing"));
    }

    #[test]
    fn test_report_json_shape() {
        let session = loaded_session();
        let value = serde_json::to_value(RunReport::from_session(&session)).unwrap();

        assert_eq!(value["run"], "pr-1");
        assert_eq!(value["pipeline"], "ci");
        assert_eq!(value["taskRuns"][0]["pipelineTaskName"], "build");
        assert_eq!(value["taskRuns"][0]["steps"][0]["stepName"], "compile");
        assert!(value.get("failures").is_none());
        assert!(value.get("error").is_none());
    }
}
