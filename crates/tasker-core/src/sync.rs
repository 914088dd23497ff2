//! Task table synchronization: wiki page rows to child tasks and back.

use crate::error::{Result, TaskerError};
use crate::markup::{macros, parse_tasks, patch_page};
use crate::preview::{set_back, PreviewTable};
use crate::report::{Outcome, StatusLine, SyncReport};
use crate::session::Session;
use crate::task::{
    apply_default_tags, decorate_tables, flatten, group_by_table, select_part, SyncMode, Task,
    TitleOptions, TrackerState,
};
use crate::tracker::{Changes, Draft, ParentSelector};
use crate::types::{PageUpdate, Relation, WorkItem};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Parent of new tasks; `None` takes the first number in the page title.
    pub parent: Option<ParentSelector>,
    pub mode: SyncMode,
    pub titles: TitleOptions,
    /// Added to every task's own tags.
    pub tags: Vec<String>,
    /// Only this 1-based task table.
    pub part: Option<usize>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            parent: None,
            mode: SyncMode::Both,
            titles: TitleOptions {
                auto_prefix: true,
                ..Default::default()
            },
            tags: Vec::new(),
            part: None,
        }
    }
}

static DIGITS_RE: OnceLock<Regex> = OnceLock::new();

fn digits_re() -> &'static Regex {
    DIGITS_RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// Parent work item id written in a page title, e.g. "71500 Платформа".
pub fn parent_id_from_title(title: &str) -> Result<i64> {
    digits_re()
        .find(title)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| TaskerError::ParentIdFromTitle(title.to_string()))
}

pub struct SyncEngine<'a> {
    session: &'a Session,
}

impl<'a> SyncEngine<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Create or update one work item per task row of `page_id` and write
    /// the new ids back into the page.
    pub async fn sync_page(&self, page_id: &str, opts: &SyncOptions) -> Result<SyncReport> {
        let s = self.session;
        let mut report = s.start_report();

        let page = s.page(page_id).await?;
        let selector = match &opts.parent {
            Some(selector) => selector.clone(),
            None => ParentSelector::Id(parent_id_from_title(&page.title)?),
        };

        let parsed = parse_tasks(&page.body)?;
        tracing::debug!(page_id, tables = parsed.task_tables, tasks = parsed.tasks.len(), "page parsed");
        for row in &parsed.skipped {
            s.emit(
                &mut report,
                StatusLine::new(Outcome::Skipped, row.title.as_str()).with_cause(format!(
                    "TFS cell '{}' is not a work item reference",
                    row.cell_text
                )),
            );
        }

        let mut tables = group_by_table(parsed.tasks);
        decorate_tables(&mut tables, &opts.titles);
        apply_default_tags(&mut tables, &opts.tags);
        if let Some(part) = opts.part {
            tables = select_part(tables, part)?;
        }

        let (admitted, excluded): (Vec<Task>, Vec<Task>) =
            flatten(tables).into_iter().partition(|t| opts.mode.admits(t));
        for task in &excluded {
            let cause = match opts.mode {
                SyncMode::CreateOnly => "already linked, create-only",
                _ => "not linked, update-only",
            };
            let mut line = StatusLine::new(Outcome::Skipped, task.title.as_str()).with_cause(cause);
            if task.tracker_id > 0 {
                line = line.with_id(task.tracker_id);
            }
            s.emit(&mut report, line);
        }

        let mut tables = group_by_table(admitted);
        if tables.is_empty() {
            tracing::info!(page_id, "nothing to create or update");
            return Ok(s.finish(report));
        }

        let mut preview: Vec<PreviewTable> = tables.iter().map(PreviewTable::from_tasks).collect();
        if !s.ui.preview(&mut preview)? {
            report.approved = false;
            return Ok(s.finish(report));
        }
        for (table, shown) in tables.iter_mut().zip(&preview) {
            set_back(&shown.items, &mut table.tasks);
        }
        let mut tasks = flatten(tables);

        let parent = if tasks.iter().any(|t| t.state() == TrackerState::Unsynced) {
            let parent = s.tracker.find_parent(&selector).await?;
            tracing::info!(parent = parent.id, title = %parent.title, "parent work item");
            Some(parent)
        } else {
            None
        };

        let mut aborted = false;
        for task in tasks.iter_mut() {
            let line = match (task.state(), &parent) {
                (TrackerState::Unsynced, Some(parent)) => self.create(task, parent).await,
                (TrackerState::Synced(id), _) => self.update(task, id).await,
                _ => Ok(StatusLine::new(Outcome::Skipped, task.title.as_str())),
            };
            match line {
                Ok(line) => s.emit(&mut report, line),
                Err(TaskerError::Aborted) => {
                    aborted = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let patched = patch_page(&page.body, &tasks)?;
        if patched.modified {
            if aborted {
                // Ids already minted must reach the page.
                let update = PageUpdate::next_version(&page, patched.body);
                s.wiki.update_page(&update).await?;
                s.pages.forget(&page.id);
            } else {
                s.write_page(&page, patched.body).await?;
            }
            report.page_written = true;
        } else {
            tracing::info!(page_id, "wiki page unchanged");
        }

        if aborted {
            return Err(TaskerError::Aborted);
        }
        Ok(s.finish(report))
    }

    async fn create(&self, task: &mut Task, parent: &WorkItem) -> Result<StatusLine> {
        let draft = Draft {
            title: task.title.clone(),
            description: task.description.clone(),
            estimate: task.estimate,
            tags: task.tags.clone(),
            priority: None,
        };
        match self.session.tracker.create_child_task(&draft, parent).await {
            Ok(item) => {
                if !task.mark_synced(item.id, macros::work_item_cell(item.id)) {
                    tracing::warn!(task = %task.title, tracker_id = item.id, "table has no TFS column, id not written back");
                }
                Ok(StatusLine::new(Outcome::Created, task.title.as_str()).with_id(item.id))
            }
            Err(TaskerError::Aborted) => Err(TaskerError::Aborted),
            Err(e) => Ok(StatusLine::new(Outcome::NotCreated, task.title.as_str()).with_cause(e.to_string())),
        }
    }

    async fn update(&self, task: &Task, id: i64) -> Result<StatusLine> {
        let changes = Changes {
            title: Some(task.title.clone()),
            description: task.edited.description.then(|| task.description.clone()),
            estimate: task.edited.estimate.then_some(task.estimate),
        };
        match self.session.tracker.update(id, &changes).await {
            Ok(_) => Ok(StatusLine::new(Outcome::Updated, task.title.as_str()).with_id(id)),
            Err(TaskerError::Aborted) => Err(TaskerError::Aborted),
            Err(e) => Ok(StatusLine::new(Outcome::NotUpdated, task.title.as_str())
                .with_id(id)
                .with_cause(e.to_string())),
        }
    }
}

/// Create one task under `parent` and, unless `assign` is false, hand it
/// to the current user.
pub async fn create_single_task(
    session: &Session,
    draft: &Draft,
    parent: &ParentSelector,
    assign: bool,
) -> Result<WorkItem> {
    let parent = session.tracker.find_parent(parent).await?;
    let task = session.tracker.create_child_task(draft, &parent).await?;
    tracing::info!(tracker_id = task.id, parent = parent.id, "task created");
    assign_to_current_user(session, task, assign).await
}

async fn assign_to_current_user(session: &Session, task: WorkItem, assign: bool) -> Result<WorkItem> {
    if !assign {
        return Ok(task);
    }
    let user = session.tracker.current_user().await?;
    session.tracker.assign(&task, &user).await
}

pub const BUGFIX_TAG: &str = "bugfix";

pub const DEFAULT_BUG_TITLE_TEMPLATE: &str = "BugFix {{.ID}} {{.Title}}";

/// `template` with `{{.ID}}` and `{{.Title}}` replaced by the bug's values.
pub fn bugfix_title(template: &str, bug: &WorkItem) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_BUG_TITLE_TEMPLATE
    } else {
        template
    };
    template
        .replace("{{.ID}}", &bug.id.to_string())
        .replace("{{.Title}}", &bug.title)
}

/// Task for fixing bug `bug_id`: titled from `template`, tagged
/// [`BUGFIX_TAG`] and linked to the bug as a related item.
pub async fn create_bugfix_task(
    session: &Session,
    bug_id: i64,
    template: &str,
    mut draft: Draft,
    parent: &ParentSelector,
    assign: bool,
) -> Result<WorkItem> {
    let bug = session.tracker.get(bug_id).await?;
    draft.title = bugfix_title(template, &bug);
    if !draft.tags.iter().any(|t| t == BUGFIX_TAG) {
        draft.tags.push(BUGFIX_TAG.to_string());
    }
    let parent = session.tracker.find_parent(parent).await?;
    let task = session
        .tracker
        .create_linked_task(&draft, &parent, vec![Relation::related(bug.url.as_str())])
        .await?;
    tracing::info!(tracker_id = task.id, bug = bug.id, "bugfix task created");
    assign_to_current_user(session, task, assign).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
