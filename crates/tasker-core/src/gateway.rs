//! Seams between the synchronization engine and the outside world.
//!
//! The engine only talks to the tracker and the wiki through these traits.
//! HTTP implementations live in `tasker-api`; tests use in-memory fakes.

use crate::error::{Result, TaskerError};
use crate::preview::PreviewTable;
use crate::report::StatusLine;
use crate::types::{
    FieldOp, Identity, Iteration, Page, PageRef, PageUpdate, Reference, Relation, WorkItem,
    WorkItemKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait TrackerGateway: Send + Sync {
    async fn get_work_item(&self, id: i64) -> Result<WorkItem>;

    /// Create a work item from `fields`; each relation is appended at `/relations/-`.
    async fn create_work_item(
        &self,
        kind: WorkItemKind,
        fields: Vec<FieldOp>,
        relations: Vec<Relation>,
    ) -> Result<WorkItem>;

    /// Apply `ops` in order. With `rev`, a `test /rev` op guards the update.
    async fn update_work_item(&self, id: i64, rev: Option<i64>, ops: Vec<FieldOp>)
        -> Result<WorkItem>;

    async fn query_by_wiql(&self, wiql: &str) -> Result<Vec<Reference>>;

    async fn get_iterations(&self, project: &str, team: &str) -> Result<Vec<Iteration>>;

    async fn get_current_user(&self) -> Result<Identity>;
}

#[async_trait]
pub trait WikiGateway: Send + Sync {
    /// Page with storage body, space and version expanded.
    async fn get_page(&self, id: &str) -> Result<Page>;

    async fn find_pages_by_title(&self, space_key: &str, title: &str) -> Result<Vec<Page>>;

    async fn child_pages(&self, id: &str) -> Result<Vec<PageRef>>;

    async fn update_page(&self, update: &PageUpdate) -> Result<()>;

    /// Re-parent `page_id` under `target_id`, appended as the last child.
    async fn move_page(&self, space_key: &str, page_id: &str, target_id: &str) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What the engine needs from a human (or from nobody, when unattended).
pub trait UserInterface: Send + Sync {
    /// Show the tables about to be synchronized. Implementations may edit
    /// the items in place; returning `false` declines the run.
    fn preview(&self, tables: &mut [PreviewTable]) -> Result<bool>;

    fn status(&self, line: &StatusLine);
}

/// Unattended operation: approves everything and logs status lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl UserInterface for AutoApprove {
    fn preview(&self, _tables: &mut [PreviewTable]) -> Result<bool> {
        Ok(true)
    }

    fn status(&self, line: &StatusLine) {
        tracing::info!("{line}");
    }
}

/// Await `fut` unless `cancel` fires first.
pub async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TaskerError::Aborted),
        result = fut => result,
    }
}
