//! Two-phase fetch driver for run sessions.
//!
//! Phase one fetches the pipeline run and all task definitions concurrently.
//! Phase two fetches every task run the pipeline run references, also
//! concurrently. Each phase produces exactly one [`LoadEvent`], so whoever
//! owns the [`RunSession`] never sees a half-settled phase.

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use runscope_core::{
    plan_task_runs, BatchPolicy, LoadError, LoadEvent, LoadTicket, RunSession, TaskRunFetch,
};

use crate::source::ResourceSource;

/// Fetches the data for a [`LoadTicket`] and reports it as [`LoadEvent`]s.
#[derive(Clone)]
pub struct RunLoader {
    source: Arc<dyn ResourceSource>,
    policy: BatchPolicy,
}

impl RunLoader {
    /// Create a loader with the fail-fast batch policy.
    pub fn new(source: Arc<dyn ResourceSource>) -> Self {
        Self {
            source,
            policy: BatchPolicy::FailFast,
        }
    }

    /// Builder method to set how task-run fetch failures settle.
    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Phase one: the run and the full set of task definitions.
    pub async fn fetch_run(&self, ticket: LoadTicket) -> LoadEvent {
        info!(
            run = %ticket.run_name(),
            generation = ticket.generation(),
            "Fetching pipeline run"
        );

        let result = tokio::try_join!(
            self.source.fetch_pipeline_run(ticket.run_name()),
            self.source.fetch_tasks()
        )
        .map_err(LoadError::from);

        match &result {
            Ok((_, tasks)) => debug!(tasks = tasks.len(), "Fetched pipeline run"),
            Err(e) => warn!(run = %ticket.run_name(), error = %e, "Pipeline run fetch failed"),
        }

        LoadEvent::RunFetched { ticket, result }
    }

    /// Phase two: every named task run.
    pub async fn fetch_task_runs(&self, ticket: LoadTicket, names: Vec<String>) -> LoadEvent {
        debug!(
            run = %ticket.run_name(),
            count = names.len(),
            policy = ?self.policy,
            "Fetching task runs"
        );

        let batch = match self.policy {
            BatchPolicy::FailFast => try_join_all(names.into_iter().map(|name| async move {
                let task_run = self.source.fetch_task_run(&name).await?;
                Ok::<_, LoadError>(TaskRunFetch {
                    task_run_name: name,
                    result: Ok(task_run),
                })
            }))
            .await,
            BatchPolicy::Isolated => Ok(join_all(names.into_iter().map(|name| async move {
                let result = self
                    .source
                    .fetch_task_run(&name)
                    .await
                    .map_err(LoadError::from);
                TaskRunFetch {
                    task_run_name: name,
                    result,
                }
            }))
            .await),
        };

        if let Err(e) = &batch {
            warn!(run = %ticket.run_name(), error = %e, "Task run batch failed");
        }

        LoadEvent::TaskRunsFetched { ticket, batch }
    }

    /// Run both phases, sending each settled phase to `events`.
    ///
    /// Phase two is skipped when phase one failed, the run is in an
    /// inconsistent state, or it references no task runs.
    pub async fn load(&self, ticket: LoadTicket, events: &mpsc::Sender<LoadEvent>) {
        let event = self.fetch_run(ticket.clone()).await;
        let names = match &event {
            LoadEvent::RunFetched {
                result: Ok((run, _)),
                ..
            } => plan_task_runs(run).ok(),
            _ => None,
        };

        if events.send(event).await.is_err() {
            debug!("Event receiver dropped, abandoning load");
            return;
        }

        let Some(names) = names.filter(|n| !n.is_empty()) else {
            return;
        };

        let event = self.fetch_task_runs(ticket, names).await;
        let _ = events.send(event).await;
    }

    /// Run [`RunLoader::load`] on the current tokio runtime.
    pub fn spawn(&self, ticket: LoadTicket, events: mpsc::Sender<LoadEvent>) -> JoinHandle<()> {
        let loader = self.clone();
        tokio::spawn(async move { loader.load(ticket, &events).await })
    }
}

/// Load `run_name` into `session` and wait for both phases to settle.
pub async fn load_session(loader: &RunLoader, session: &mut RunSession, run_name: &str) {
    let ticket = session.begin(run_name);
    let (tx, mut rx) = mpsc::channel(2);
    // The sender lives inside the load future so the channel closes with it.
    let load = async move { loader.load(ticket, &tx).await };

    let ((), ()) = tokio::join!(load, async {
        while let Some(event) = rx.recv().await {
            session.apply(event);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use runscope_core::{
        ConditionStatus, LoadState, LoadedPhase, PipelineRun, StepPhase, Task, TaskRun,
    };

    use crate::error::ClientError;

    /// In-memory source with optional per-run latency and failures.
    #[derive(Default)]
    struct FakeSource {
        runs: HashMap<String, PipelineRun>,
        tasks: Vec<Task>,
        task_runs: HashMap<String, TaskRun>,
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
    }

    impl FakeSource {
        fn with_run(mut self, run: serde_json::Value) -> Self {
            let run: PipelineRun = serde_json::from_value(run).unwrap();
            self.runs.insert(run.name().to_string(), run);
            self
        }

        fn with_task(mut self, task: serde_json::Value) -> Self {
            self.tasks.push(serde_json::from_value(task).unwrap());
            self
        }

        fn with_task_run(mut self, task_run: serde_json::Value) -> Self {
            let task_run: TaskRun = serde_json::from_value(task_run).unwrap();
            self.task_runs.insert(task_run.name().to_string(), task_run);
            self
        }

        fn with_delay(mut self, name: &str, delay: Duration) -> Self {
            self.delays.insert(name.to_string(), delay);
            self
        }

        fn with_failing(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        async fn pause(&self, name: &str) {
            if let Some(delay) = self.delays.get(name) {
                tokio::time::sleep(*delay).await;
            }
        }
    }

    #[async_trait]
    impl ResourceSource for FakeSource {
        async fn fetch_pipeline_run(&self, name: &str) -> Result<PipelineRun, ClientError> {
            self.pause(name).await;
            self.runs
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(format!("pipelineruns/{}", name)))
        }

        async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError> {
            Ok(self.tasks.clone())
        }

        async fn fetch_task_run(&self, name: &str) -> Result<TaskRun, ClientError> {
            self.pause(name).await;
            if self.failing.contains(name) {
                return Err(ClientError::Server {
                    status: 500,
                    path: format!("taskruns/{}", name),
                });
            }
            self.task_runs
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(format!("taskruns/{}", name)))
        }
    }

    fn build_task() -> serde_json::Value {
        json!({
            "metadata": { "name": "build-task" },
            "spec": { "steps": [{ "name": "compile", "image": "golang" }] }
        })
    }

    fn task_run(name: &str) -> serde_json::Value {
        json!({
            "metadata": { "name": name, "uid": format!("{}-uid", name) },
            "spec": { "taskRef": { "name": "build-task" } },
            "status": {
                "podName": format!("{}-pod", name),
                "conditions": [{ "type": "Succeeded", "status": "True" }],
                "steps": [{ "terminated": { "reason": "Completed" } }]
            }
        })
    }

    fn loader(source: FakeSource) -> RunLoader {
        RunLoader::new(Arc::new(source))
    }

    #[tokio::test]
    async fn test_scenario_successful_run() {
        let source = FakeSource::default()
            .with_run(json!({
                "metadata": { "name": "r1" },
                "status": {
                    "conditions": [{ "type": "Succeeded", "status": "True" }],
                    "taskRuns": { "tr1": { "pipelineTaskName": "build" } }
                }
            }))
            .with_task(build_task())
            .with_task_run(task_run("tr1"));

        let mut session = RunSession::new();
        load_session(&loader(source), &mut session, "r1").await;

        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        let views = session.task_runs();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].task_run_name, "tr1");
        assert_eq!(views[0].succeeded, Some(ConditionStatus::True));
        assert_eq!(views[0].steps.len(), 1);
        assert_eq!(views[0].steps[0].status, Some(StepPhase::Terminated));
        assert_eq!(views[0].steps[0].reason.as_deref(), Some("Completed"));
    }

    #[tokio::test]
    async fn test_scenario_failed_run_without_task_runs() {
        let source = FakeSource::default().with_run(json!({
            "metadata": { "name": "r2" },
            "status": {
                "conditions": [{
                    "type": "Succeeded",
                    "status": "False",
                    "message": "Pipeline default/missing can't be found"
                }]
            }
        }));

        let mut session = RunSession::new();
        load_session(&loader(source), &mut session, "r2").await;

        assert_eq!(session.state(), LoadState::Failed);
        assert_eq!(
            session.error(),
            Some(&LoadError::InconsistentState(
                "Pipeline default/missing can't be found".into()
            ))
        );
        assert!(session.task_runs().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_failed_run_with_task_runs() {
        let source = FakeSource::default()
            .with_run(json!({
                "metadata": { "name": "r3" },
                "status": {
                    "conditions": [{ "type": "Succeeded", "status": "False", "reason": "Failed" }],
                    "taskRuns": { "tr1": { "pipelineTaskName": "build" } }
                }
            }))
            .with_task(build_task())
            .with_task_run(task_run("tr1"));

        let mut session = RunSession::new();
        load_session(&loader(source), &mut session, "r3").await;

        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert!(session.run_status().is_failed());
        assert_eq!(session.task_runs().len(), 1);
    }

    #[tokio::test]
    async fn test_null_step_lists_degrade_to_no_steps() {
        let source = FakeSource::default()
            .with_run(json!({
                "metadata": { "name": "r4" },
                "status": { "taskRuns": { "tr1": { "pipelineTaskName": "build" } } }
            }))
            .with_task(build_task())
            .with_task(json!({ "metadata": { "name": "broken" }, "spec": { "steps": null } }))
            .with_task_run(json!({
                "metadata": { "name": "tr1", "uid": "tr1-uid" },
                "spec": { "taskRef": { "name": "build-task" } },
                "status": { "steps": null }
            }));

        let mut session = RunSession::new();
        load_session(&loader(source), &mut session, "r4").await;

        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert_eq!(session.tasks().len(), 2);
        let views = session.task_runs();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].steps.len(), 1);
        assert_eq!(views[0].steps[0].status, None);
    }

    #[tokio::test]
    async fn test_missing_run_is_not_found() {
        let mut session = RunSession::new();
        load_session(&loader(FakeSource::default()), &mut session, "ghost").await;

        assert_eq!(session.state(), LoadState::Failed);
        assert_eq!(
            session.error().map(LoadError::summary),
            Some("Not Found")
        );
    }

    fn two_task_run_source() -> FakeSource {
        FakeSource::default()
            .with_run(json!({
                "metadata": { "name": "r1" },
                "status": { "taskRuns": {
                    "tr1": { "pipelineTaskName": "build" },
                    "tr2": { "pipelineTaskName": "test" }
                } }
            }))
            .with_task(build_task())
            .with_task_run(task_run("tr1"))
            .with_failing("tr2")
    }

    #[tokio::test]
    async fn test_fail_fast_batch() {
        let mut session = RunSession::new();
        load_session(&loader(two_task_run_source()), &mut session, "r1").await;

        assert_eq!(session.state(), LoadState::Failed);
        assert!(matches!(session.error(), Some(LoadError::ServerError(_))));
        assert!(session.task_runs().is_empty());
    }

    #[tokio::test]
    async fn test_isolated_batch() {
        let loader = loader(two_task_run_source()).with_policy(BatchPolicy::Isolated);
        let mut session = RunSession::new();
        load_session(&loader, &mut session, "r1").await;

        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert_eq!(session.task_runs().len(), 1);
        assert_eq!(session.failures().len(), 1);
        assert_eq!(session.failures()[0].pipeline_task_name, "test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_never_overwrites_new_run() {
        let source = FakeSource::default()
            .with_run(json!({
                "metadata": { "name": "run-a" },
                "status": {
                    "conditions": [{ "type": "Succeeded", "status": "False", "message": "a failed" }]
                }
            }))
            .with_run(json!({
                "metadata": { "name": "run-b" },
                "status": { "taskRuns": { "tr1": { "pipelineTaskName": "build" } } }
            }))
            .with_task(build_task())
            .with_task_run(task_run("tr1"))
            .with_delay("run-a", Duration::from_secs(5));
        let loader = loader(source);

        let mut session = RunSession::new();
        let (tx, mut rx) = mpsc::channel(8);

        let slow = loader.spawn(session.begin("run-a"), tx.clone());
        let fast = loader.spawn(session.begin("run-b"), tx);

        let mut applied = 0;
        let mut discarded = 0;
        while let Some(event) = rx.recv().await {
            if session.apply(event) {
                applied += 1;
            } else {
                discarded += 1;
            }
        }
        slow.await.unwrap();
        fast.await.unwrap();

        assert_eq!(applied, 2);
        assert_eq!(discarded, 1);
        assert_eq!(session.run_name(), Some("run-b"));
        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert!(session.error().is_none());
        assert_eq!(session.task_runs().len(), 1);
    }
}
