//! HTTP client for the experiment tracking service
//!
//! Speaks the W&B-compatible GraphQL API: a session is opened by upserting
//! the run ("bucket") with its resolved config.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::session::{InitRequest, TrackingError, TrackingSession};

/// Tracking API used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api.wandb.ai";

const UPSERT_BUCKET: &str = r"
mutation UpsertBucket(
    $id: String,
    $project: String,
    $entity: String,
    $groupName: String,
    $displayName: String,
    $config: JSONString
) {
    upsertBucket(input: {
        name: $id,
        modelName: $project,
        entityName: $entity,
        groupName: $groupName,
        displayName: $displayName,
        config: $config
    }) {
        bucket {
            id
            name
            displayName
            project {
                name
                entity {
                    name
                }
            }
        }
        inserted
    }
}
";

const RUN_EXISTS: &str = r"
query RunExists($project: String!, $entity: String, $name: String!) {
    project(name: $project, entityName: $entity) {
        run(name: $name) {
            id
        }
    }
}
";

/// HTTP client for the tracking service
pub struct TrackingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    entity: Option<String>,
}

impl TrackingClient {
    /// Create a new tracking client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            client: Client::new(),
            base_url,
            api_key: None,
            entity: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a tracking session for a run.
    ///
    /// The config is forwarded as-is. When the run already exists, it is
    /// resumed if `request.resume` is set and rejected otherwise. Without
    /// resume the run is looked up first, so a rejected run is never
    /// modified.
    pub async fn init(&self, request: &InitRequest) -> Result<TrackingSession> {
        // Nothing may be written to an existing run unless it is resumed
        if !request.resume && self.run_exists(request).await? {
            return Err(TrackingError::RunAlreadyExists {
                id: request.id.clone(),
            }
            .into());
        }

        let variables = json!({
            "id": request.id,
            "project": request.project,
            "entity": self.entity,
            "groupName": request.group,
            "displayName": request.name,
            "config": encode_config(request)?,
        });

        let data: UpsertBucketData = self.graphql(UPSERT_BUCKET, variables).await?;
        let upsert = data
            .upsert_bucket
            .ok_or(TrackingError::MalformedResponse("upsertBucket"))?;
        let bucket = upsert
            .bucket
            .ok_or(TrackingError::MalformedResponse("upsertBucket.bucket"))?;

        let resumed = !upsert.inserted;
        if resumed && !request.resume {
            return Err(TrackingError::RunAlreadyExists { id: bucket.name }.into());
        }

        let entity = bucket
            .project
            .as_ref()
            .and_then(|p| p.entity.as_ref())
            .map(|e| e.name.clone())
            .or_else(|| self.entity.clone());
        let project = bucket
            .project
            .map_or_else(|| request.project.clone(), |p| p.name);
        let url = entity
            .as_ref()
            .map(|e| format!("{}/{}/{}/runs/{}", app_url(&self.base_url), e, project, bucket.name));

        let session = TrackingSession {
            id: bucket.name,
            name: bucket.display_name.unwrap_or_else(|| request.name.clone()),
            project,
            entity,
            group: request.group.clone(),
            resumed,
            url,
        };

        if resumed {
            info!("Resumed tracking run {} ({})", session.id, session.name);
        } else {
            info!("Started tracking run {} ({})", session.id, session.name);
        }
        Ok(session)
    }

    /// Whether the run named by `request.id` already exists in its project
    async fn run_exists(&self, request: &InitRequest) -> Result<bool> {
        let variables = json!({
            "project": request.project,
            "entity": self.entity,
            "name": request.id,
        });

        let data: RunExistsData = self.graphql(RUN_EXISTS, variables).await?;
        let exists = data.project.and_then(|p| p.run).is_some();
        debug!("Run {} exists: {}", request.id, exists);
        Ok(exists)
    }

    /// Generic GraphQL POST
    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let url = format!("{}/graphql", self.base_url);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "variables": variables }));

        // Add API key as basic auth if configured
        if let Some(ref api_key) = self.api_key {
            request = request.basic_auth("api", Some(api_key));
        }

        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request failed ({status}): {body}");
        }

        let body: GraphQlResponse<T> = response.json().await.context("Failed to parse response")?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(TrackingError::Service(messages.join("; ")).into());
        }

        body.data
            .ok_or(TrackingError::MalformedResponse("data"))
            .map_err(Into::into)
    }
}

/// Wrap each top-level config entry as `{"value": v}`, the shape the
/// service stores run config in, plus client settings under `_wandb`.
fn encode_config(request: &InitRequest) -> Result<String> {
    let mut config: Map<String, Value> = request
        .config
        .iter()
        .map(|(k, v)| (k.clone(), json!({ "value": v })))
        .collect();
    config.insert(
        "_wandb".to_string(),
        json!({
            "value": {
                "allow_val_change": request.allow_val_change,
                "save_code": request.save_code,
                "client": concat!("mjrun/", env!("CARGO_PKG_VERSION")),
            }
        }),
    );
    serde_json::to_string(&config).context("Failed to encode run config")
}

/// Web UI address for an API base URL (`api.` host prefix dropped)
fn app_url(base_url: &str) -> String {
    base_url.replacen("://api.", "://", 1)
}

// Response types from the tracking service

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertBucketData {
    upsert_bucket: Option<UpsertBucket>,
}

#[derive(Debug, Deserialize)]
struct RunExistsData {
    #[serde(default)]
    project: Option<RunExistsProject>,
}

#[derive(Debug, Deserialize)]
struct RunExistsProject {
    #[serde(default)]
    run: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpsertBucket {
    bucket: Option<Bucket>,
    #[serde(default)]
    inserted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bucket {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    project: Option<BucketProject>,
}

#[derive(Debug, Deserialize)]
struct BucketProject {
    name: String,
    #[serde(default)]
    entity: Option<BucketEntity>,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}
