use std::time::Duration;

use anyhow::{Context, bail};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const K_SERVICE_ENV: &str = "K_SERVICE";
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const PROJECT_ID_PATH: &str = "/computeMetadata/v1/project/project-id";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Best effort: answers `None` rather than failing.
#[async_trait::async_trait]
pub trait ProjectIdResolver: Send + Sync {
    async fn resolve(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticProjectId(pub Option<String>);

impl StaticProjectId {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self(Some(project_id.into()))
    }
}

#[async_trait::async_trait]
impl ProjectIdResolver for StaticProjectId {
    async fn resolve(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    host: String,
    timeout: Duration,
}

impl MetadataClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Self {
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|x| !x.is_empty())
            .unwrap_or(DEFAULT_METADATA_HOST.to_string());
        Self::new(host)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn project_id(&self) -> anyhow::Result<String> {
        let url = format!("http://{}{}", self.host, PROJECT_ID_PATH);
        let resp = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("metadata request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("metadata server returned {status} for {url}");
        }

        let body = resp.text().await.context("reading metadata response")?;
        let project_id = body.trim();
        if project_id.is_empty() {
            bail!("metadata server returned an empty project id");
        }
        Ok(project_id.to_string())
    }
}

/// Only asks the metadata server when `K_SERVICE` is set.
#[derive(Debug)]
pub struct CloudRunProjectId {
    service: Option<String>,
    metadata: MetadataClient,
    cached: OnceCell<String>,
}

impl CloudRunProjectId {
    pub fn new(service: Option<String>, metadata: MetadataClient) -> Self {
        Self {
            service: service.filter(|x| !x.is_empty()),
            metadata,
            cached: OnceCell::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(K_SERVICE_ENV).ok(), MetadataClient::from_env())
    }

    pub fn is_cloud_run(&self) -> bool {
        self.service.is_some()
    }
}

#[async_trait::async_trait]
impl ProjectIdResolver for CloudRunProjectId {
    async fn resolve(&self) -> Option<String> {
        if !self.is_cloud_run() {
            return None;
        }
        match self
            .cached
            .get_or_try_init(|| self.metadata.project_id())
            .await
        {
            Ok(project_id) => Some(project_id.clone()),
            Err(err) => {
                warn!(host = self.metadata.host(), "project id lookup failed: {err:#}");
                debug!("continuing without project id");
                None
            }
        }
    }
}
