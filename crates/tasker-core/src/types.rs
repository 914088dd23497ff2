use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Tracker field paths (JSON Patch pointers, exact wire spelling)
// ---------------------------------------------------------------------------

pub mod fields {
    pub const TITLE: &str = "/fields/System.Title";
    pub const DESCRIPTION: &str = "/fields/System.Description";
    pub const TAGS: &str = "/fields/System.Tags";
    pub const AREA_PATH: &str = "/fields/System.AreaPath";
    pub const ITERATION_PATH: &str = "/fields/System.IterationPath";
    pub const ASSIGNED_TO: &str = "/fields/System.AssignedTo";
    pub const STATE: &str = "/fields/System.State";
    pub const DISCIPLINE: &str = "/fields/Microsoft.VSTS.Common.Discipline";
    pub const PRIORITY: &str = "/fields/Microsoft.VSTS.Common.Priority";
    pub const REQUIREMENT_TYPE: &str = "/fields/Microsoft.VSTS.CMMI.RequirementType";
    pub const VALUE_AREA: &str = "/fields/Microsoft.VSTS.Common.ValueArea";
    pub const ORIGINAL_ESTIMATE: &str = "/fields/Microsoft.VSTS.Scheduling.OriginalEstimate";
    pub const REMAINING_WORK: &str = "/fields/Microsoft.VSTS.Scheduling.RemainingWork";
    pub const RELATIONS_APPEND: &str = "/relations/-";
    pub const REV: &str = "/rev";
}

/// Relation type linking a child to its parent.
pub const PARENT_LINK: &str = "System.LinkTypes.Hierarchy-Reverse";

pub const RELATED_LINK: &str = "System.LinkTypes.Related";

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemKind {
    Task,
    Requirement,
}

impl WorkItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemKind::Task => "Task",
            WorkItemKind::Requirement => "Requirement",
        }
    }
}

impl fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub url: String,
    /// Browser link when the tracker returns one, otherwise empty.
    #[serde(default)]
    pub html_url: String,
    pub rev: i64,
    pub title: String,
    pub area_path: String,
    pub iteration_path: String,
    pub state: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl WorkItem {
    /// `Closed` and `Resolved` count as done.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state.as_str(), "Closed" | "Resolved")
    }

    pub fn browser_url(&self) -> &str {
        if self.html_url.is_empty() {
            &self.url
        } else {
            &self.html_url
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub rel: String,
    pub url: String,
}

impl Relation {
    pub fn parent(url: impl Into<String>) -> Self {
        Self {
            rel: PARENT_LINK.to_string(),
            url: url.into(),
        }
    }

    pub fn related(url: impl Into<String>) -> Self {
        Self {
            rel: RELATED_LINK.to_string(),
            url: url.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldOp: one JSON Patch operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Test,
    Add,
    Replace,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOp {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldOp {
    pub fn add(path: &str, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.to_string(),
            value: Some(value.into()),
        }
    }

    pub fn replace(path: &str, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.to_string(),
            value: Some(value.into()),
        }
    }

    pub fn test(path: &str, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Test,
            path: path.to_string(),
            value: Some(value.into()),
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.to_string(),
            value: None,
        }
    }

    pub fn relation(relation: &Relation) -> Self {
        Self::add(
            fields::RELATIONS_APPEND,
            serde_json::json!({ "rel": relation.rel, "url": relation.url }),
        )
    }
}

// ---------------------------------------------------------------------------
// Iterations / identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Past,
    Current,
    Future,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub path: String,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Wiki pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    /// Content type, normally `page`.
    pub kind: String,
    pub title: String,
    pub space_key: String,
    pub version: u32,
    /// Storage-format body; empty when the body was not expanded.
    pub body: String,
    /// Absolute browser link (`_links.base` + `_links.webui`).
    pub web_url: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    pub title: String,
}

/// Full replacement of a page's body. `version` is the new version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUpdate {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub space_key: String,
    pub body: String,
    pub representation: String,
    pub version: u32,
}

impl PageUpdate {
    /// Next version of `page` carrying `body` in storage representation.
    pub fn next_version(page: &Page, body: String) -> Self {
        Self {
            id: page.id.clone(),
            kind: page.kind.clone(),
            title: page.title.clone(),
            space_key: page.space_key.clone(),
            body,
            representation: "storage".to_string(),
            version: page.version + 1,
        }
    }
}
