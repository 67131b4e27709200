//! HTTP client for the dashboard REST API.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use runscope_core::{Pipeline, PipelineRun, ResourceList, Task, TaskRun};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::source::ResourceSource;

/// HTTP client for the dashboard's `/v1/namespaces` endpoints.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    inner: reqwest::Client,
    base_url: Url,
    namespace: String,
}

impl DashboardClient {
    /// Create a new client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::Config(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let inner = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner,
            base_url,
            namespace: config.namespace.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Check if the dashboard is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.endpoint(&["health"])?;
        debug!(url = %url, "Checking health");

        let response = self.inner.get(url).send().await?;
        Ok(response.status().is_success())
    }

    /// List pipelines in the namespace, sorted by name.
    pub async fn fetch_pipelines(&self) -> Result<Vec<Pipeline>, ClientError> {
        let url = self.namespaced(&["pipelines"])?;
        let list: ResourceList<Pipeline> = self.get_json(url).await?;

        let mut pipelines = list.items;
        pipelines.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(pipelines)
    }

    /// List pipeline runs, newest first, optionally only those of one pipeline.
    pub async fn fetch_pipeline_runs(
        &self,
        pipeline: Option<&str>,
    ) -> Result<Vec<PipelineRun>, ClientError> {
        let url = self.namespaced(&["pipelineruns"])?;
        let list: ResourceList<PipelineRun> = self.get_json(url).await?;

        let mut runs: Vec<PipelineRun> = list
            .items
            .into_iter()
            .filter(|run| pipeline.map_or(true, |p| run.pipeline_name() == Some(p)))
            .collect();
        runs.sort_by(|a, b| {
            b.metadata
                .creation_timestamp
                .cmp(&a.metadata.creation_timestamp)
        });
        Ok(runs)
    }

    /// Get JSON from an endpoint.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!(url = %url, "GET request");
        let path = url.path().to_string();

        let response = self.inner.get(url).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ClientError::NotFound(path)),
            status => {
                return Err(ClientError::Server {
                    status: status.as_u16(),
                    path,
                })
            }
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    fn namespaced(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut all = vec!["v1", "namespaces", self.namespace.as_str()];
        all.extend_from_slice(segments);
        self.endpoint(&all)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ResourceSource for DashboardClient {
    async fn fetch_pipeline_run(&self, name: &str) -> Result<PipelineRun, ClientError> {
        let url = self.namespaced(&["pipelineruns", name])?;
        self.get_json(url).await
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let url = self.namespaced(&["tasks"])?;
        let list: ResourceList<Task> = self.get_json(url).await?;
        Ok(list.items)
    }

    async fn fetch_task_run(&self, name: &str) -> Result<TaskRun, ClientError> {
        let url = self.namespaced(&["taskruns", name])?;
        self.get_json(url).await
    }
}
