//! Azure DevOps Server (TFS) work item tracking over REST.

use crate::error::ApiError;
use crate::http::{base_url, join, json, USER_AGENT};
use crate::types::{ConnectionData, IdentityDto, IterationDto, ValueList, WiqlRequest, WiqlResponse, WorkItemDto};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;
use tasker_core::config::Config;
use tasker_core::gateway::TrackerGateway;
use tasker_core::types::{fields, FieldOp, Identity, Iteration, Reference, Relation, WorkItem, WorkItemKind};

const SERVICE: &str = "TFS";
const API_VERSION: &str = "6.0";
const JSON_PATCH: &str = "application/json-patch+json";

#[derive(Debug, Clone)]
pub struct TfsClient {
    http: Client,
    base: Url,
    project: String,
    token: String,
    user_filter: String,
}

impl TfsClient {
    pub fn new(base_address: &str, token: &str, project: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base: base_url(base_address)?,
            project: project.to_string(),
            token: token.to_string(),
            user_filter: String::new(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(&cfg.tfs_base_address, &cfg.tfs_access_token, &cfg.tfs_project)?
            .with_user_filter(&cfg.tfs_user_filter))
    }

    /// Resolve the current user by identity search instead of the connection owner.
    pub fn with_user_filter(mut self, filter: &str) -> Self {
        self.user_filter = filter.to_string();
        self
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = join(&self.base, segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }

    fn project_url(&self, segments: &[&str]) -> Url {
        let mut all = vec![self.project.as_str()];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    // Empty token means anonymous access.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.basic_auth("", Some(&self.token))
        }
    }

    async fn send_patch(&self, request: RequestBuilder, ops: &[FieldOp]) -> Result<WorkItem> {
        let body = serde_json::to_vec(ops).map_err(|source| ApiError::Payload {
            service: SERVICE,
            source,
        })?;
        let response = self
            .authorized(request)
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body)
            .send()
            .await?;
        Ok(json::<WorkItemDto>(SERVICE, response).await?.into())
    }

    async fn fetch_work_item(&self, id: i64) -> Result<WorkItem> {
        let url = self.url(&["_apis", "wit", "workitems", &id.to_string()]);
        let response = self.authorized(self.http.get(url)).send().await?;
        Ok(json::<WorkItemDto>(SERVICE, response).await?.into())
    }

    async fn create(&self, kind: WorkItemKind, mut ops: Vec<FieldOp>, relations: Vec<Relation>) -> Result<WorkItem> {
        ops.extend(relations.iter().map(FieldOp::relation));
        let kind_segment = format!("${}", kind.as_str());
        let url = self.project_url(&["_apis", "wit", "workitems", &kind_segment]);
        tracing::debug!(%kind, ops = ops.len(), "creating work item");
        self.send_patch(self.http.post(url), &ops).await
    }

    async fn update(&self, id: i64, rev: Option<i64>, ops: Vec<FieldOp>) -> Result<WorkItem> {
        let mut document = Vec::with_capacity(ops.len() + 1);
        if let Some(rev) = rev {
            document.push(FieldOp::test(fields::REV, rev));
        }
        document.extend(ops);
        let url = self.url(&["_apis", "wit", "workitems", &id.to_string()]);
        self.send_patch(self.http.patch(url), &document).await
    }

    async fn wiql(&self, query: &str) -> Result<Vec<Reference>> {
        let url = self.project_url(&["_apis", "wit", "wiql"]);
        let response = self
            .authorized(self.http.post(url))
            .json(&WiqlRequest { query })
            .send()
            .await?;
        Ok(json::<WiqlResponse>(SERVICE, response).await?.work_items)
    }

    async fn iterations(&self, project: &str, team: &str) -> Result<Vec<Iteration>> {
        let url = self.url(&[project, team, "_apis", "work", "teamsettings", "iterations"]);
        let response = self.authorized(self.http.get(url)).send().await?;
        let list: ValueList<IterationDto> = json(SERVICE, response).await?;
        Ok(list.value.into_iter().map(Into::into).collect())
    }

    async fn current_user(&self) -> Result<Identity> {
        if self.user_filter.is_empty() {
            let mut url = join(&self.base, &["_apis", "connectionData"]);
            url.query_pairs_mut().append_pair("api-version", "5.0-preview");
            let response = self.authorized(self.http.get(url)).send().await?;
            let data: ConnectionData = json(SERVICE, response).await?;
            return Ok(data.authenticated_user.into());
        }

        let mut url = self.url(&["_apis", "identities"]);
        url.query_pairs_mut()
            .append_pair("searchFilter", "General")
            .append_pair("filterValue", &self.user_filter)
            .append_pair("queryMembership", "None");
        let response = self.authorized(self.http.get(url)).send().await?;
        let mut found: ValueList<IdentityDto> = json(SERVICE, response).await?;
        match found.value.len() {
            0 => Err(ApiError::Identity(format!(
                "user identity '{}' not found",
                self.user_filter
            ))),
            1 => Ok(found.value.remove(0).into()),
            _ => Err(ApiError::Identity(format!(
                "user filter '{}' is not unique",
                self.user_filter
            ))),
        }
    }
}

#[async_trait]
impl TrackerGateway for TfsClient {
    async fn get_work_item(&self, id: i64) -> tasker_core::Result<WorkItem> {
        Ok(self.fetch_work_item(id).await?)
    }

    async fn create_work_item(
        &self,
        kind: WorkItemKind,
        ops: Vec<FieldOp>,
        relations: Vec<Relation>,
    ) -> tasker_core::Result<WorkItem> {
        Ok(self.create(kind, ops, relations).await?)
    }

    async fn update_work_item(
        &self,
        id: i64,
        rev: Option<i64>,
        ops: Vec<FieldOp>,
    ) -> tasker_core::Result<WorkItem> {
        Ok(self.update(id, rev, ops).await?)
    }

    async fn query_by_wiql(&self, wiql: &str) -> tasker_core::Result<Vec<Reference>> {
        Ok(self.wiql(wiql).await?)
    }

    async fn get_iterations(&self, project: &str, team: &str) -> tasker_core::Result<Vec<Iteration>> {
        Ok(self.iterations(project, team).await?)
    }

    async fn get_current_user(&self) -> tasker_core::Result<Identity> {
        Ok(self.current_user().await?)
    }
}
