//! Tech-debt pages: one wiki page per item, one tracker work item per page.
//!
//! `sync` creates a work item for every non-empty page that does not link
//! one yet and prepends the `work-item-tfs` macro to the page. `archive`
//! moves pages whose linked items are all done under an archive page.

use crate::error::{Result, TaskerError};
use crate::fanout::{fan_out, FETCH_CONCURRENCY};
use crate::gateway::guarded;
use crate::markup::{macros, prepend_fragment, scan_page};
use crate::preview::{set_back, Editable, PreviewTable};
use crate::report::{Outcome, StatusLine, SyncReport};
use crate::session::Session;
use crate::tracker::Draft;
use crate::types::{Page, PageUpdate, WorkItem, WorkItemKind};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// TechDebtPage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechDebtPage {
    pub page_id: String,
    /// Work item title: page title without priority and estimate.
    pub title: String,
    /// Link back to the page followed by the page body.
    pub description: String,
    pub is_empty: bool,
    pub labels: Vec<String>,
    pub tracker_ids: Vec<i64>,
    pub priority: Option<u32>,
    pub estimate: f32,
    pub tags: Vec<String>,
    pub web_url: String,
    #[serde(skip)]
    pub page: Page,
}

static PRIORITY_RE: OnceLock<Regex> = OnceLock::new();
static ESTIMATE_RE: OnceLock<Regex> = OnceLock::new();

fn priority_re() -> &'static Regex {
    PRIORITY_RE.get_or_init(|| Regex::new(r"^(\d{1,3})[.)]?\s+(.+)$").unwrap())
}

fn estimate_re() -> &'static Regex {
    ESTIMATE_RE.get_or_init(|| Regex::new(r"^(.*?)\s*\[(\d+(?:[.,]\d+)?)\]$").unwrap())
}

/// Split "2. Drop legacy cache [8]" into title, priority and estimate.
pub fn parse_debt_title(raw: &str) -> (String, Option<u32>, Option<f32>) {
    let mut title = raw.trim().to_string();

    let mut estimate = None;
    if let Some(caps) = estimate_re().captures(&title) {
        let value = caps[2].replace(',', ".").parse::<f32>().ok();
        if value.is_some() && !caps[1].trim().is_empty() {
            estimate = value;
            title = caps[1].trim().to_string();
        }
    }

    let mut priority = None;
    if let Some(caps) = priority_re().captures(&title) {
        priority = caps[1].parse().ok();
        title = caps[2].trim().to_string();
    }

    (title, priority, estimate)
}

/// `<div>` linking to the page, placed above the body in the description.
pub fn page_link(url: &str, title: &str) -> String {
    format!(
        r#"<div><a href="{}">{}</a><br></div>"#,
        html_escape::encode_double_quoted_attribute(url),
        html_escape::encode_text(title)
    )
}

impl TechDebtPage {
    pub fn parse(page: Page) -> Result<Self> {
        let summary = scan_page(&page.body)?;
        let (title, priority, estimate) = parse_debt_title(&page.title);
        Ok(Self {
            page_id: page.id.clone(),
            title,
            description: format!("{}{}", page_link(&page.web_url, page.title.trim()), page.body),
            is_empty: summary.is_blank,
            labels: page.labels.clone(),
            tracker_ids: summary.item_ids,
            priority,
            estimate: estimate.unwrap_or(0.0),
            tags: Vec::new(),
            web_url: page.web_url.clone(),
            page,
        })
    }

    /// Non-empty and, unless `force`, not linked to any work item yet.
    pub fn needs_item(&self, force: bool) -> bool {
        !self.is_empty && (force || self.tracker_ids.is_empty())
    }

    /// Page body with a reference to `id` prepended.
    pub fn add_tracker_item(&mut self, id: i64) -> String {
        self.tracker_ids.push(id);
        prepend_fragment(&self.page.body, &macros::work_item_paragraph(id))
    }

    fn draft(&self, kind: WorkItemKind) -> Draft {
        Draft {
            title: self.title.clone(),
            description: self.description.clone(),
            estimate: match kind {
                WorkItemKind::Task => self.estimate,
                WorkItemKind::Requirement => 0.0,
            },
            tags: self.tags.clone(),
            priority: self.priority,
        }
    }
}

impl Editable for TechDebtPage {
    fn title(&self) -> &str {
        &self.title
    }
    fn set_title(&mut self, title: String) {
        self.title = title;
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn set_description(&mut self, description: String) {
        self.description = description;
    }
    fn estimate(&self) -> f32 {
        self.estimate
    }
    fn set_estimate(&mut self, estimate: f32) {
        self.estimate = estimate;
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }
    fn tracker_id(&self) -> i64 {
        self.tracker_ids.first().copied().unwrap_or(0)
    }
    fn set_tracker_id(&mut self, id: i64) {
        if id > 0 && !self.tracker_ids.contains(&id) {
            self.tracker_ids.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebtSource {
    /// All children of this page.
    Parent(String),
    Pages(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechDebtOptions {
    pub source: DebtSource,
    /// Parent of the created items.
    pub requirement_id: i64,
    /// Create even for pages that already link an item.
    pub force: bool,
    pub tags: Vec<String>,
    pub kind: WorkItemKind,
}

pub struct TechDebtFlow<'a> {
    session: &'a Session,
}

impl<'a> TechDebtFlow<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>> {
        let s = self.session;
        let children = guarded(&s.cancel, s.wiki.child_pages(parent_id)).await?;
        tracing::debug!(parent_id, children = children.len(), "child pages");
        Ok(children.into_iter().map(|c| c.id).collect())
    }

    /// Fetch and parse pages concurrently; cached pages are not refetched.
    pub async fn load(&self, ids: Vec<String>) -> Result<Vec<TechDebtPage>> {
        let s = self.session;
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| s.pages.get(id).is_none())
            .cloned()
            .collect();

        let wiki = Arc::clone(&s.wiki);
        let fetched = fan_out(missing, FETCH_CONCURRENCY, &s.cancel, move |id| {
            let wiki = Arc::clone(&wiki);
            async move { wiki.get_page(&id).await }
        })
        .await?;
        for page in fetched {
            s.pages.insert(page);
        }

        ids.iter()
            .map(|id| {
                let page = s
                    .pages
                    .get(id)
                    .ok_or_else(|| TaskerError::PageNotFound(id.clone()))?;
                TechDebtPage::parse(page)
            })
            .collect()
    }

    pub async fn sync(&self, opts: &TechDebtOptions) -> Result<SyncReport> {
        let s = self.session;
        let mut report = s.start_report();

        let ids = match &opts.source {
            DebtSource::Parent(parent) => self.child_ids(parent).await?,
            DebtSource::Pages(ids) => ids.clone(),
        };
        let (mut pages, ignored): (Vec<_>, Vec<_>) = self
            .load(ids)
            .await?
            .into_iter()
            .partition(|p| p.needs_item(opts.force));
        for page in &ignored {
            let cause = if page.is_empty { "empty page" } else { "already linked" };
            let mut line = StatusLine::new(Outcome::Skipped, page.title.as_str()).with_cause(cause);
            if let Some(&id) = page.tracker_ids.first() {
                line = line.with_id(id);
            }
            s.emit(&mut report, line);
        }

        if pages.is_empty() {
            tracing::info!("nothing to create or update");
            return Ok(s.finish(report));
        }
        for page in pages.iter_mut() {
            page.tags = opts.tags.clone();
        }

        let requirement = s.tracker.get(opts.requirement_id).await?;

        let mut preview = vec![PreviewTable::from_debt(1, &pages)];
        if !s.ui.preview(&mut preview)? {
            report.approved = false;
            return Ok(s.finish(report));
        }
        set_back(&preview[0].items, &mut pages);

        for page in pages.iter_mut() {
            let line = self.create_one(page, opts.kind, &requirement).await?;
            if line.outcome == Outcome::Created {
                report.page_written = true;
            }
            s.emit(&mut report, line);
        }
        Ok(s.finish(report))
    }

    async fn create_one(
        &self,
        page: &mut TechDebtPage,
        kind: WorkItemKind,
        requirement: &WorkItem,
    ) -> Result<StatusLine> {
        let s = self.session;
        let item = match s.tracker.create(kind, &page.draft(kind), requirement).await {
            Ok(item) => item,
            Err(TaskerError::Aborted) => return Err(TaskerError::Aborted),
            Err(e) => {
                return Ok(StatusLine::new(Outcome::NotCreated, page.title.as_str())
                    .with_cause(e.to_string()))
            }
        };

        // The item exists now; the page must learn about it even if cancelled.
        let body = page.add_tracker_item(item.id);
        let update = PageUpdate::next_version(&page.page, body);
        match s.wiki.update_page(&update).await {
            Ok(()) => {
                s.pages.forget(&page.page_id);
                Ok(StatusLine::new(Outcome::Created, page.title.as_str()).with_id(item.id))
            }
            Err(e) => Ok(StatusLine::new(Outcome::NotUpdated, page.title.as_str())
                .with_id(item.id)
                .with_cause(format!("wiki page not updated: {e}"))),
        }
    }

    /// Move children of `parent_id` whose linked items are all done under
    /// `archive_id`.
    pub async fn archive(&self, parent_id: &str, archive_id: &str) -> Result<SyncReport> {
        let s = self.session;
        let mut report = s.start_report();

        let pages = self.load(self.child_ids(parent_id).await?).await?;
        if pages.is_empty() {
            tracing::info!(parent_id, "nothing to archive");
            return Ok(s.finish(report));
        }

        let lookups: Vec<(usize, i64)> = pages
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.tracker_ids.iter().map(move |&id| (i, id)))
            .collect();
        let gateway = s.tracker.gateway();
        let items = fan_out(lookups.clone(), FETCH_CONCURRENCY, &s.cancel, move |(_, id)| {
            let gateway = Arc::clone(&gateway);
            async move { gateway.get_work_item(id).await }
        })
        .await?;

        let mut by_page: HashMap<usize, Vec<WorkItem>> = HashMap::new();
        for ((page, _), item) in lookups.into_iter().zip(items) {
            by_page.entry(page).or_default().push(item);
        }

        let mut done = Vec::new();
        for (i, page) in pages.into_iter().enumerate() {
            let finished = by_page
                .get(&i)
                .is_some_and(|items| items.iter().all(WorkItem::is_terminal));
            if finished {
                done.push(page);
            } else {
                s.emit(
                    &mut report,
                    StatusLine::new(Outcome::Skipped, page.title.as_str())
                        .with_cause("nothing to archive"),
                );
            }
        }
        if done.is_empty() {
            return Ok(s.finish(report));
        }

        let mut preview = vec![PreviewTable::from_debt(1, &done)];
        if !s.ui.preview(&mut preview)? {
            report.approved = false;
            return Ok(s.finish(report));
        }

        for page in &done {
            let moved = guarded(
                &s.cancel,
                s.wiki
                    .move_page(&page.page.space_key, &page.page_id, archive_id),
            )
            .await;
            let line = match moved {
                Ok(()) => {
                    s.pages.forget(&page.page_id);
                    StatusLine::new(Outcome::Archived, page.title.as_str())
                }
                Err(TaskerError::Aborted) => return Err(TaskerError::Aborted),
                Err(e) => StatusLine::new(Outcome::NotArchived, page.title.as_str())
                    .with_cause(e.to_string()),
            };
            s.emit(&mut report, line);
        }
        Ok(s.finish(report))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
