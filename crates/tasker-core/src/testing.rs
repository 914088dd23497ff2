//! In-memory gateways for engine tests.

use crate::error::{Result, TaskerError};
use crate::gateway::{TrackerGateway, UserInterface, WikiGateway};
use crate::preview::PreviewTable;
use crate::report::StatusLine;
use crate::types::{
    fields, FieldOp, Identity, Iteration, Page, PageRef, PageUpdate, PatchOp, Reference,
    Relation, WorkItem, WorkItemKind,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// FakeTracker
// ---------------------------------------------------------------------------

pub struct Created {
    pub kind: WorkItemKind,
    pub ops: Vec<FieldOp>,
    pub relations: Vec<Relation>,
}

impl Created {
    pub fn field(&self, path: &str) -> Option<&Value> {
        self.ops.iter().find(|o| o.path == path)?.value.as_ref()
    }
}

#[derive(Default)]
struct TrackerState {
    items: BTreeMap<i64, WorkItem>,
    next_id: i64,
    created: Vec<Created>,
    updates: Vec<(i64, Option<i64>, Vec<FieldOp>)>,
    wiql: Vec<String>,
    answers: Vec<(String, Vec<i64>)>,
    iterations: Vec<Iteration>,
    failing_titles: HashSet<String>,
}

#[derive(Default)]
pub struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    pub fn insert(&self, item: WorkItem) -> WorkItem {
        self.state.lock().unwrap().items.insert(item.id, item.clone());
        item
    }

    pub fn item(&self, id: i64) -> Option<WorkItem> {
        self.state.lock().unwrap().items.get(&id).cloned()
    }

    pub fn set_iterations(&self, iterations: Vec<Iteration>) {
        self.state.lock().unwrap().iterations = iterations;
    }

    /// WIQL containing `needle` returns `ids`.
    pub fn answer_wiql(&self, needle: &str, ids: Vec<i64>) {
        self.state
            .lock()
            .unwrap()
            .answers
            .push((needle.to_string(), ids));
    }

    pub fn fail_create(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_titles
            .insert(title.to_string());
    }

    pub fn created(&self) -> Vec<(WorkItemKind, String)> {
        let state = self.state.lock().unwrap();
        state
            .created
            .iter()
            .map(|c| {
                let title = c
                    .field(fields::TITLE)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (c.kind, title)
            })
            .collect()
    }

    pub fn with_created<R>(&self, f: impl FnOnce(&[Created]) -> R) -> R {
        f(&self.state.lock().unwrap().created)
    }

    pub fn updates(&self) -> Vec<(i64, Option<i64>, Vec<FieldOp>)> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn wiql_log(&self) -> Vec<String> {
        self.state.lock().unwrap().wiql.clone()
    }
}

fn text(value: &Option<Value>) -> String {
    value
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn apply(item: &mut WorkItem, ops: &[FieldOp]) {
    for op in ops.iter().filter(|o| o.op != PatchOp::Test) {
        match op.path.as_str() {
            fields::TITLE => item.title = text(&op.value),
            fields::STATE => item.state = text(&op.value),
            fields::AREA_PATH => item.area_path = text(&op.value),
            fields::ITERATION_PATH => item.iteration_path = text(&op.value),
            fields::TAGS => {
                item.tags = text(&op.value).split("; ").map(str::to_string).collect()
            }
            path => {
                if let (Some(name), Some(value)) = (path.strip_prefix("/fields/"), &op.value) {
                    item.fields.insert(name.to_string(), value.clone());
                }
            }
        }
    }
}

#[async_trait]
impl TrackerGateway for FakeTracker {
    async fn get_work_item(&self, id: i64) -> Result<WorkItem> {
        self.item(id).ok_or(TaskerError::Gateway {
            status: Some(404),
            message: format!("TF401232: Work item {id} does not exist"),
        })
    }

    async fn create_work_item(
        &self,
        kind: WorkItemKind,
        ops: Vec<FieldOp>,
        relations: Vec<Relation>,
    ) -> Result<WorkItem> {
        let mut state = self.state.lock().unwrap();
        let created = Created {
            kind,
            ops,
            relations,
        };
        let title = created
            .field(fields::TITLE)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if state.failing_titles.contains(&title) {
            return Err(TaskerError::Gateway {
                status: Some(400),
                message: format!("rejected '{title}'"),
            });
        }

        state.next_id += 1;
        let id = 9000 + state.next_id;
        let mut item = WorkItem {
            id,
            url: format!("https://tfs/_apis/wit/workItems/{id}"),
            rev: 1,
            state: "New".into(),
            ..Default::default()
        };
        apply(&mut item, &created.ops);
        state.created.push(created);
        state.items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_work_item(
        &self,
        id: i64,
        rev: Option<i64>,
        ops: Vec<FieldOp>,
    ) -> Result<WorkItem> {
        let mut state = self.state.lock().unwrap();
        state.updates.push((id, rev, ops.clone()));
        let item = state.items.get_mut(&id).ok_or(TaskerError::Gateway {
            status: Some(404),
            message: format!("work item {id} not found"),
        })?;
        if let Some(expected) = rev {
            if expected != item.rev {
                return Err(TaskerError::Gateway {
                    status: Some(412),
                    message: "test operation failed: /rev".into(),
                });
            }
        }
        apply(item, &ops);
        item.rev += 1;
        Ok(item.clone())
    }

    async fn query_by_wiql(&self, wiql: &str) -> Result<Vec<Reference>> {
        let mut state = self.state.lock().unwrap();
        state.wiql.push(wiql.to_string());
        let ids = state
            .answers
            .iter()
            .find(|(needle, _)| wiql.contains(needle.as_str()))
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .map(|id| Reference {
                id,
                url: format!("https://tfs/_apis/wit/workItems/{id}"),
            })
            .collect())
    }

    async fn get_iterations(&self, _project: &str, _team: &str) -> Result<Vec<Iteration>> {
        Ok(self.state.lock().unwrap().iterations.clone())
    }

    async fn get_current_user(&self) -> Result<Identity> {
        Ok(Identity {
            id: "u-1".into(),
            display_name: "Jane Doe <CORP\\jdoe>".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeWiki
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WikiState {
    pages: BTreeMap<String, Page>,
    children: HashMap<String, Vec<String>>,
    fetches: HashMap<String, usize>,
    updates: Vec<PageUpdate>,
    moves: Vec<(String, String, String)>,
    failing_gets: HashSet<String>,
    failing_moves: HashSet<String>,
}

#[derive(Default)]
pub struct FakeWiki {
    state: Mutex<WikiState>,
}

impl FakeWiki {
    pub fn add_page(&self, page: Page) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(page.id.clone(), page);
    }

    pub fn add_child(&self, parent: &str, page: Page) {
        let mut state = self.state.lock().unwrap();
        state
            .children
            .entry(parent.to_string())
            .or_default()
            .push(page.id.clone());
        state.pages.insert(page.id.clone(), page);
    }

    pub fn page(&self, id: &str) -> Option<Page> {
        self.state.lock().unwrap().pages.get(id).cloned()
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetches
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn updates(&self) -> Vec<PageUpdate> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn moves(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn fail_get(&self, id: &str) {
        self.state.lock().unwrap().failing_gets.insert(id.to_string());
    }

    pub fn fail_move(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_moves
            .insert(id.to_string());
    }
}

#[async_trait]
impl WikiGateway for FakeWiki {
    async fn get_page(&self, id: &str) -> Result<Page> {
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(id.to_string()).or_default() += 1;
        if state.failing_gets.contains(id) {
            return Err(TaskerError::Gateway {
                status: Some(500),
                message: format!("cannot load page {id}"),
            });
        }
        state
            .pages
            .get(id)
            .cloned()
            .ok_or_else(|| TaskerError::PageNotFound(id.to_string()))
    }

    async fn find_pages_by_title(&self, space_key: &str, title: &str) -> Result<Vec<Page>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .values()
            .filter(|p| p.space_key == space_key && p.title == title)
            .cloned()
            .collect())
    }

    async fn child_pages(&self, id: &str) -> Result<Vec<PageRef>> {
        let state = self.state.lock().unwrap();
        let ids = state.children.get(id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|child| state.pages.get(&child))
            .map(|p| PageRef {
                id: p.id.clone(),
                title: p.title.clone(),
            })
            .collect())
    }

    async fn update_page(&self, update: &PageUpdate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let page = state
            .pages
            .get_mut(&update.id)
            .ok_or_else(|| TaskerError::PageNotFound(update.id.clone()))?;
        if update.version != page.version + 1 {
            return Err(TaskerError::Gateway {
                status: Some(409),
                message: "version conflict".into(),
            });
        }
        page.version = update.version;
        page.body = update.body.clone();
        state.updates.push(update.clone());
        Ok(())
    }

    async fn move_page(&self, space_key: &str, page_id: &str, target_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_moves.contains(page_id) {
            return Err(TaskerError::Gateway {
                status: Some(403),
                message: "not permitted".into(),
            });
        }
        state.moves.push((
            space_key.to_string(),
            page_id.to_string(),
            target_id.to_string(),
        ));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted UI
// ---------------------------------------------------------------------------

/// Approves (or declines) and optionally edits the preview, recording
/// everything it was shown.
pub struct ScriptedUi {
    approve: bool,
    edit: Option<Box<dyn Fn(&mut [PreviewTable]) + Send + Sync>>,
    shown: Mutex<Vec<PreviewTable>>,
    lines: Mutex<Vec<StatusLine>>,
}

impl ScriptedUi {
    pub fn approving() -> Self {
        Self {
            approve: true,
            edit: None,
            shown: Mutex::new(Vec::new()),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn declining() -> Self {
        Self {
            approve: false,
            ..Self::approving()
        }
    }

    pub fn editing(edit: impl Fn(&mut [PreviewTable]) + Send + Sync + 'static) -> Self {
        Self {
            edit: Some(Box::new(edit)),
            ..Self::approving()
        }
    }

    pub fn shown(&self) -> Vec<PreviewTable> {
        self.shown.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().unwrap().clone()
    }
}

impl UserInterface for ScriptedUi {
    fn preview(&self, tables: &mut [PreviewTable]) -> Result<bool> {
        if let Some(edit) = &self.edit {
            edit(tables);
        }
        self.shown.lock().unwrap().extend(tables.iter().cloned());
        Ok(self.approve)
    }

    fn status(&self, line: &StatusLine) {
        self.lines.lock().unwrap().push(line.clone());
    }
}
