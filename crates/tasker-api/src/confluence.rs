//! Confluence Server content REST API plus the legacy page move action.

use crate::http::{base_url, check, join, json, USER_AGENT};
use crate::types::{ContentDto, ContentList, ContentUpdate};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;
use tasker_core::config::{Config, WikiAuth};
use tasker_core::gateway::WikiGateway;
use tasker_core::types::{Page, PageRef, PageUpdate};

const SERVICE: &str = "wiki";
const PAGE_EXPAND: &str = "body.storage,space,version,metadata.labels";
const CHILD_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    http: Client,
    base: Url,
    auth: WikiAuth,
}

impl ConfluenceClient {
    pub fn new(base_address: &str, auth: WikiAuth) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // Required by XSRF protection on the form endpoints.
        headers.insert("X-Atlassian-Token", HeaderValue::from_static("no-check"));
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base: base_url(base_address)?,
            auth,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.wiki_base_address, cfg.wiki_auth())
    }

    fn rest(&self, segments: &[&str]) -> Url {
        let mut all = vec!["rest", "api"];
        all.extend_from_slice(segments);
        join(&self.base, &all)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            WikiAuth::Bearer(token) => request.bearer_auth(token),
            WikiAuth::Basic { user, password } => request.basic_auth(user, Some(password)),
            WikiAuth::Anonymous => request,
        }
    }

    async fn fetch(&self, id: &str) -> Result<Page> {
        let mut url = self.rest(&["content", id]);
        url.query_pairs_mut().append_pair("expand", PAGE_EXPAND);
        let response = self.authorized(self.http.get(url)).send().await?;
        let content: ContentDto = json(SERVICE, response).await?;
        Ok(content.into_page(self.base.as_str()))
    }

    async fn by_title(&self, space_key: &str, title: &str) -> Result<Vec<Page>> {
        let mut url = self.rest(&["content"]);
        url.query_pairs_mut()
            .append_pair("spaceKey", space_key)
            .append_pair("title", title)
            .append_pair("expand", PAGE_EXPAND);
        let response = self.authorized(self.http.get(url)).send().await?;
        let list: ContentList = json(SERVICE, response).await?;
        let base = list.links.base.unwrap_or_else(|| self.base.to_string());
        Ok(list.results.into_iter().map(|c| c.into_page(&base)).collect())
    }

    async fn children(&self, id: &str) -> Result<Vec<PageRef>> {
        let mut pages = Vec::new();
        loop {
            let mut url = self.rest(&["content", id, "child", "page"]);
            url.query_pairs_mut()
                .append_pair("start", &pages.len().to_string())
                .append_pair("limit", &CHILD_PAGE_LIMIT.to_string());
            let response = self.authorized(self.http.get(url)).send().await?;
            let list: ContentList = json(SERVICE, response).await?;
            let received = list.results.len();
            pages.extend(list.results.iter().map(PageRef::from));
            if received < CHILD_PAGE_LIMIT {
                break;
            }
        }
        Ok(pages)
    }

    async fn update(&self, update: &PageUpdate) -> Result<()> {
        let url = self.rest(&["content", &update.id]);
        let response = self
            .authorized(self.http.put(url))
            .json(&ContentUpdate::from(update))
            .send()
            .await?;
        check(SERVICE, response).await?;
        Ok(())
    }

    async fn move_to(&self, space_key: &str, page_id: &str, target_id: &str) -> Result<()> {
        let mut url = join(&self.base, &["pages", "movepage.action"]);
        url.query_pairs_mut()
            .append_pair("position", "append")
            .append_pair("spaceKey", space_key)
            .append_pair("pageId", page_id)
            .append_pair("targetId", target_id);
        let response = self.authorized(self.http.post(url)).send().await?;
        check(SERVICE, response).await?;
        Ok(())
    }
}

#[async_trait]
impl WikiGateway for ConfluenceClient {
    async fn get_page(&self, id: &str) -> tasker_core::Result<Page> {
        Ok(self.fetch(id).await?)
    }

    async fn find_pages_by_title(&self, space_key: &str, title: &str) -> tasker_core::Result<Vec<Page>> {
        Ok(self.by_title(space_key, title).await?)
    }

    async fn child_pages(&self, id: &str) -> tasker_core::Result<Vec<PageRef>> {
        Ok(self.children(id).await?)
    }

    async fn update_page(&self, update: &PageUpdate) -> tasker_core::Result<()> {
        Ok(self.update(update).await?)
    }

    async fn move_page(&self, space_key: &str, page_id: &str, target_id: &str) -> tasker_core::Result<()> {
        Ok(self.move_to(space_key, page_id, target_id).await?)
    }
}
