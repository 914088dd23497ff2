//! Work item operations the engine needs, expressed over [`TrackerGateway`].

use crate::config::Config;
use crate::error::{Result, TaskerError};
use crate::gateway::{guarded, TrackerGateway};
use crate::types::{fields, FieldOp, Identity, Relation, Timeframe, WorkItem, WorkItemKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tag added to everything this tool creates.
pub const TOOL_TAG: &str = "tasker";

/// Tracker settings taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub project: String,
    pub team: String,
    pub discipline: String,
    pub parent_kind: String,
    pub search_past_iterations: bool,
    pub requirement_type: String,
    pub value_area: String,
}

impl From<&Config> for TrackerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            project: cfg.tfs_project.clone(),
            team: cfg.tfs_team.clone(),
            discipline: cfg.tfs_discipline.clone(),
            parent_kind: cfg.tfs_parent_work_item_type.clone(),
            search_past_iterations: cfg.tfs_search_past_iterations,
            requirement_type: cfg.tfs_requirement_type.clone(),
            value_area: cfg.tfs_value_area.clone(),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        (&Config::new("")).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentSelector {
    Id(i64),
    /// Words the parent's title must contain.
    Pattern(String),
}

/// Everything needed to create one work item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub estimate: f32,
    pub tags: Vec<String>,
    pub priority: Option<u32>,
}

/// Fields to change on an existing item. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimate: Option<f32>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.estimate.is_none()
    }
}

// ---------------------------------------------------------------------------
// Field op builders
// ---------------------------------------------------------------------------

/// Tags joined the way the tracker stores them, with [`TOOL_TAG`] last.
pub fn join_tags(tags: &[String]) -> String {
    let mut all: Vec<&str> = tags.iter().map(String::as_str).collect();
    if !all.contains(&TOOL_TAG) {
        all.push(TOOL_TAG);
    }
    all.join("; ")
}

pub fn child_task_ops(draft: &Draft, parent: &WorkItem, discipline: &str) -> Vec<FieldOp> {
    let mut ops = vec![
        FieldOp::add(fields::ITERATION_PATH, parent.iteration_path.as_str()),
        FieldOp::add(fields::AREA_PATH, parent.area_path.as_str()),
        FieldOp::add(fields::TITLE, draft.title.as_str()),
        FieldOp::add(fields::DESCRIPTION, draft.description.as_str()),
        FieldOp::add(fields::DISCIPLINE, discipline),
        FieldOp::add(fields::ORIGINAL_ESTIMATE, draft.estimate),
        FieldOp::add(fields::REMAINING_WORK, draft.estimate),
        FieldOp::add(fields::TAGS, join_tags(&draft.tags)),
    ];
    if let Some(priority) = draft.priority {
        ops.push(FieldOp::add(fields::PRIORITY, priority));
    }
    ops
}

pub fn requirement_ops(draft: &Draft, parent: &WorkItem, settings: &TrackerSettings) -> Vec<FieldOp> {
    let description = if draft.description.trim().is_empty() {
        draft.title.as_str()
    } else {
        draft.description.as_str()
    };
    let mut ops = vec![
        FieldOp::add(fields::ITERATION_PATH, parent.iteration_path.as_str()),
        FieldOp::add(fields::AREA_PATH, parent.area_path.as_str()),
        FieldOp::add(fields::TITLE, draft.title.as_str()),
        FieldOp::add(fields::DESCRIPTION, description),
        FieldOp::add(fields::REQUIREMENT_TYPE, settings.requirement_type.as_str()),
        FieldOp::add(fields::VALUE_AREA, settings.value_area.as_str()),
        FieldOp::add(fields::TAGS, join_tags(&draft.tags)),
    ];
    if let Some(priority) = draft.priority {
        ops.push(FieldOp::add(fields::PRIORITY, priority));
    }
    ops
}

pub fn update_ops(changes: &Changes) -> Vec<FieldOp> {
    let mut ops = Vec::new();
    if let Some(title) = &changes.title {
        ops.push(FieldOp::replace(fields::TITLE, title.as_str()));
    }
    if let Some(description) = &changes.description {
        ops.push(FieldOp::replace(fields::DESCRIPTION, description.as_str()));
    }
    if let Some(estimate) = changes.estimate {
        ops.push(FieldOp::add(fields::ORIGINAL_ESTIMATE, estimate));
        ops.push(FieldOp::add(fields::REMAINING_WORK, estimate));
    }
    ops
}

fn escape_wiql(value: &str) -> String {
    value.replace('\'', "''")
}

/// WIQL selecting active items of `kind` in `iteration_path` whose title
/// contains the words of `pattern`.
pub fn parent_query(kind: &str, pattern: &str, iteration_path: &str) -> String {
    format!(
        "SELECT [Id],[Title],[System.AreaPath],[System.IterationPath] \
         FROM WorkItems \
         WHERE [Work Item Type]='{}' \
         AND [Title] CONTAINS WORDS '{}' \
         AND [System.IterationPath]='{}' \
         AND [State]='Active'",
        escape_wiql(kind),
        escape_wiql(pattern),
        escape_wiql(iteration_path)
    )
}

// ---------------------------------------------------------------------------
// TrackerAdapter
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TrackerAdapter {
    gateway: Arc<dyn TrackerGateway>,
    settings: TrackerSettings,
    cancel: CancellationToken,
}

impl TrackerAdapter {
    pub fn new(
        gateway: Arc<dyn TrackerGateway>,
        settings: TrackerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Shared handle for work that outlives a borrow, such as spawned fetches.
    pub fn gateway(&self) -> Arc<dyn TrackerGateway> {
        Arc::clone(&self.gateway)
    }

    pub async fn get(&self, id: i64) -> Result<WorkItem> {
        guarded(&self.cancel, self.gateway.get_work_item(id)).await
    }

    pub async fn current_user(&self) -> Result<Identity> {
        guarded(&self.cancel, self.gateway.get_current_user()).await
    }

    pub async fn find_parent(&self, selector: &ParentSelector) -> Result<WorkItem> {
        match selector {
            ParentSelector::Id(id) => self.get(*id).await,
            ParentSelector::Pattern(pattern) => self.find_parent_by_pattern(pattern).await,
        }
    }

    /// Latest iterations first; only current ones, plus past ones when
    /// configured. First active match wins.
    async fn find_parent_by_pattern(&self, pattern: &str) -> Result<WorkItem> {
        if pattern.trim().is_empty() {
            return Err(TaskerError::ParentNotFound("empty search pattern".into()));
        }

        let iterations = guarded(
            &self.cancel,
            self.gateway
                .get_iterations(&self.settings.project, &self.settings.team),
        )
        .await?;

        let searchable = iterations.iter().rev().filter(|it| match it.timeframe {
            Timeframe::Current => true,
            Timeframe::Past => self.settings.search_past_iterations,
            Timeframe::Future => false,
        });

        for iteration in searchable {
            let wiql = parent_query(&self.settings.parent_kind, pattern, &iteration.path);
            tracing::debug!(iteration = %iteration.path, "searching parent");
            let refs = guarded(&self.cancel, self.gateway.query_by_wiql(&wiql)).await?;
            if let Some(first) = refs.first() {
                return self.get(first.id).await;
            }
        }

        Err(TaskerError::ParentNotFound(format!(
            "no active {} matching '{pattern}'",
            self.settings.parent_kind
        )))
    }

    pub async fn create_child_task(&self, draft: &Draft, parent: &WorkItem) -> Result<WorkItem> {
        self.create_linked_task(draft, parent, Vec::new()).await
    }

    /// Child task of `parent` that also carries `links` (related items and the like).
    pub async fn create_linked_task(
        &self,
        draft: &Draft,
        parent: &WorkItem,
        links: Vec<Relation>,
    ) -> Result<WorkItem> {
        let ops = child_task_ops(draft, parent, &self.settings.discipline);
        let mut relations = vec![Relation::parent(parent.url.as_str())];
        relations.extend(links);
        guarded(
            &self.cancel,
            self.gateway
                .create_work_item(WorkItemKind::Task, ops, relations),
        )
        .await
    }

    pub async fn create_requirement(&self, draft: &Draft, parent: &WorkItem) -> Result<WorkItem> {
        let ops = requirement_ops(draft, parent, &self.settings);
        guarded(
            &self.cancel,
            self.gateway.create_work_item(
                WorkItemKind::Requirement,
                ops,
                vec![Relation::parent(parent.url.as_str())],
            ),
        )
        .await
    }

    pub async fn create(&self, kind: WorkItemKind, draft: &Draft, parent: &WorkItem) -> Result<WorkItem> {
        match kind {
            WorkItemKind::Task => self.create_child_task(draft, parent).await,
            WorkItemKind::Requirement => self.create_requirement(draft, parent).await,
        }
    }

    pub async fn update(&self, id: i64, changes: &Changes) -> Result<WorkItem> {
        guarded(
            &self.cancel,
            self.gateway.update_work_item(id, None, update_ops(changes)),
        )
        .await
    }

    /// Assign `item` to `user` and activate it, guarded by the item's revision.
    pub async fn assign(&self, item: &WorkItem, user: &Identity) -> Result<WorkItem> {
        let ops = vec![
            FieldOp::add(fields::ASSIGNED_TO, user.display_name.as_str()),
            FieldOp::add(fields::STATE, "Active"),
        ];
        guarded(
            &self.cancel,
            self.gateway.update_work_item(item.id, Some(item.rev), ops),
        )
        .await
        .map_err(|e| match e {
            TaskerError::Aborted => TaskerError::Aborted,
            other => TaskerError::FailedToAssign {
                id: item.id,
                reason: other.to_string(),
            },
        })
    }
}
