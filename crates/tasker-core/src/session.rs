use crate::error::Result;
use crate::gateway::{guarded, Clock, SystemClock, TrackerGateway, UserInterface, WikiGateway};
use crate::page_cache::PageCache;
use crate::report::{StatusLine, SyncReport};
use crate::tracker::{TrackerAdapter, TrackerSettings};
use crate::types::{Page, PageUpdate};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Collaborators and per-invocation state shared by every flow of one
/// command: gateways, previewer, clock, page cache and cancellation.
#[derive(Clone)]
pub struct Session {
    pub tracker: TrackerAdapter,
    pub wiki: Arc<dyn WikiGateway>,
    pub ui: Arc<dyn UserInterface>,
    pub clock: Arc<dyn Clock>,
    pub pages: Arc<PageCache>,
    pub cancel: CancellationToken,
}

impl Session {
    pub fn new(
        tracker: Arc<dyn TrackerGateway>,
        wiki: Arc<dyn WikiGateway>,
        ui: Arc<dyn UserInterface>,
        settings: TrackerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tracker: TrackerAdapter::new(tracker, settings, cancel.clone()),
            wiki,
            ui,
            clock: Arc::new(SystemClock),
            pages: Arc::new(PageCache::new()),
            cancel,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn start_report(&self) -> SyncReport {
        SyncReport {
            started_at: Some(self.clock.now()),
            approved: true,
            ..Default::default()
        }
    }

    pub fn finish(&self, mut report: SyncReport) -> SyncReport {
        report.finished_at = Some(self.clock.now());
        report
    }

    /// Log, show and record one per-item outcome.
    pub fn emit(&self, report: &mut SyncReport, line: StatusLine) {
        if line.outcome.is_failure() {
            tracing::warn!(outcome = line.outcome.label(), tracker_id = ?line.tracker_id, "{}", line.title);
        } else {
            tracing::info!(outcome = line.outcome.label(), tracker_id = ?line.tracker_id, "{}", line.title);
        }
        self.ui.status(&line);
        report.record(line);
    }

    pub async fn page(&self, id: &str) -> Result<Page> {
        self.pages.page(self.wiki.as_ref(), &self.cancel, id).await
    }

    /// Push `body` as the next version of `page`.
    pub async fn write_page(&self, page: &Page, body: String) -> Result<()> {
        let update = PageUpdate::next_version(page, body);
        guarded(&self.cancel, self.wiki.update_page(&update)).await?;
        self.pages.forget(&page.id);
        tracing::info!(page_id = %page.id, version = update.version, "wiki page updated");
        Ok(())
    }
}
