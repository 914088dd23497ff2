use crate::error::{Result, TaskerError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Position of a task's tracker cell inside the page body.
///
/// `table` counts top-level `<table>` elements from 0, `row` counts `<tr>`
/// inside that table, `cell` counts `<td>` inside that row. The patcher
/// re-locates the cell by this path; no DOM handle outlives parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorPath {
    pub table: usize,
    pub row: usize,
    pub cell: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Unsynced,
    Synced(i64),
    /// Non-numeric content in the tracker cell.
    Malformed,
}

impl TrackerState {
    pub fn from_id(id: i64) -> Self {
        match id {
            0 => TrackerState::Unsynced,
            n if n > 0 => TrackerState::Synced(n),
            _ => TrackerState::Malformed,
        }
    }
}

/// Which preview fields the user changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edited {
    pub title: bool,
    pub description: bool,
    pub estimate: bool,
    pub tags: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    /// Storage-format fragment, whitespace between tags collapsed.
    pub description: String,
    /// Person-hours.
    pub estimate: f32,
    pub tracker_id: i64,
    pub tags: Vec<String>,
    pub table: usize,
    pub row: usize,
    /// `<td>` index of the tracker column, when the table has one.
    pub anchor_cell: Option<usize>,
    #[serde(skip)]
    pub edited: Edited,
    /// Markup queued for the anchor cell; set once a work item is minted.
    #[serde(skip)]
    pub rewrite: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, table: usize, row: usize) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            estimate: 0.0,
            tracker_id: 0,
            tags: Vec::new(),
            table,
            row,
            anchor_cell: None,
            edited: Edited::default(),
            rewrite: None,
        }
    }

    /// A row is worth syncing once it has an estimate or a tracker id.
    pub fn is_valid(&self) -> bool {
        self.estimate > 0.0 || self.tracker_id > 0
    }

    pub fn state(&self) -> TrackerState {
        TrackerState::from_id(self.tracker_id)
    }

    pub fn anchor(&self) -> Option<AnchorPath> {
        self.anchor_cell.map(|cell| AnchorPath {
            table: self.table,
            row: self.row,
            cell,
        })
    }

    /// Record a freshly minted id and queue `markup` for the anchor cell.
    /// Returns false when the row has no tracker cell to write into.
    pub fn mark_synced(&mut self, id: i64, markup: String) -> bool {
        self.tracker_id = id;
        if self.anchor_cell.is_none() {
            return false;
        }
        self.rewrite = Some(markup);
        true
    }

    pub fn tags_string(&self) -> String {
        self.tags.join("; ")
    }
}

// ---------------------------------------------------------------------------
// TaskTable / grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTable {
    /// 1-based display number, assigned in encounter order.
    pub number: usize,
    /// Position among the page's top-level tables.
    pub index: usize,
    pub tasks: Vec<Task>,
}

impl TaskTable {
    pub fn total_estimate(&self) -> f32 {
        self.tasks.iter().map(|t| t.estimate).sum()
    }
}

pub fn group_by_table(tasks: Vec<Task>) -> Vec<TaskTable> {
    let mut tables: Vec<TaskTable> = Vec::new();
    let mut by_index: HashMap<usize, usize> = HashMap::new();

    for task in tasks {
        let slot = *by_index.entry(task.table).or_insert_with(|| {
            tables.push(TaskTable {
                number: tables.len() + 1,
                index: task.table,
                tasks: Vec::new(),
            });
            tables.len() - 1
        });
        tables[slot].tasks.push(task);
    }

    tables
}

pub fn flatten(tables: Vec<TaskTable>) -> Vec<Task> {
    tables.into_iter().flat_map(|t| t.tasks).collect()
}

/// Keep only table number `part` (1-based).
pub fn select_part(mut tables: Vec<TaskTable>, part: usize) -> Result<Vec<TaskTable>> {
    if part == 0 || part > tables.len() {
        return Err(TaskerError::InvalidPart {
            part,
            total: tables.len(),
        });
    }
    Ok(vec![tables.swap_remove(part - 1)])
}

// ---------------------------------------------------------------------------
// Sync mode filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Both,
    CreateOnly,
    UpdateOnly,
}

impl SyncMode {
    pub fn from_flags(create_only: bool, update_only: bool) -> Self {
        match (create_only, update_only) {
            (true, false) => SyncMode::CreateOnly,
            (false, true) => SyncMode::UpdateOnly,
            _ => SyncMode::Both,
        }
    }

    pub fn admits(self, task: &Task) -> bool {
        match (self, task.state()) {
            (_, TrackerState::Malformed) => false,
            (SyncMode::CreateOnly, TrackerState::Synced(_)) => false,
            (SyncMode::UpdateOnly, TrackerState::Unsynced) => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Title decoration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleOptions {
    /// Prepend "NN. " (and "P." on multi-table pages).
    pub auto_prefix: bool,
    pub custom_prefix: String,
    /// Prepend "[tag] " for every tag.
    pub tags_in_title: bool,
}

fn starts_with_digit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d").unwrap())
}

/// Decorate one title. `position` is the 1-based row within its table;
/// `part` is the table number when the page has several task tables.
///
/// Only the row number is skipped for titles that already start with a
/// digit. The part, custom and tag prefixes are always prepended.
pub fn decorate_title(
    title: &str,
    position: usize,
    part: Option<usize>,
    tags: &[String],
    opts: &TitleOptions,
) -> String {
    let mut title = title.to_string();

    if opts.auto_prefix {
        if !starts_with_digit().is_match(&title) {
            title = format!("{position:02}. {title}");
        }
        if let Some(part) = part {
            title = format!("{part}.{title}");
        }
    }

    if !opts.custom_prefix.is_empty() {
        title = format!("{}{title}", opts.custom_prefix);
    }

    if opts.tags_in_title {
        for tag in tags {
            title = format!("[{tag}] {title}");
        }
    }

    title
}

pub fn decorate_tables(tables: &mut [TaskTable], opts: &TitleOptions) {
    let multi = tables.len() > 1;
    for table in tables.iter_mut() {
        let part = multi.then_some(table.number);
        for (i, task) in table.tasks.iter_mut().enumerate() {
            task.title = decorate_title(&task.title, i + 1, part, &task.tags, opts);
        }
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// `own` kept verbatim (duplicates included), then each default not yet present.
pub fn union_tags(own: &[String], defaults: &[String]) -> Vec<String> {
    let mut tags = own.to_vec();
    for tag in defaults {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

pub fn apply_default_tags(tables: &mut [TaskTable], defaults: &[String]) {
    for task in tables.iter_mut().flat_map(|t| t.tasks.iter_mut()) {
        task.tags = union_tags(&task.tags, defaults);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
