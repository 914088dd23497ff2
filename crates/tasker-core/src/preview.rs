//! Items shown to the user before anything is written.
//!
//! The engine hands clones to the [`UserInterface`](crate::gateway::UserInterface)
//! and folds the edited values back afterwards, so a previewer never holds
//! references into engine state.

use crate::task::{Task, TaskTable};
use crate::tech_debt::TechDebtPage;
use serde::Serialize;

/// Fields a previewer may read and change.
pub trait Editable: Clone {
    fn title(&self) -> &str;
    fn set_title(&mut self, title: String);
    fn description(&self) -> &str;
    fn set_description(&mut self, description: String);
    fn estimate(&self) -> f32;
    fn set_estimate(&mut self, estimate: f32);
    fn tags(&self) -> &[String];
    fn set_tags(&mut self, tags: Vec<String>);
    fn tracker_id(&self) -> i64;
    fn set_tracker_id(&mut self, id: i64);
}

impl Editable for Task {
    fn title(&self) -> &str {
        &self.title
    }
    fn set_title(&mut self, title: String) {
        self.edited.title |= title != self.title;
        self.title = title;
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn set_description(&mut self, description: String) {
        self.edited.description |= description != self.description;
        self.description = description;
    }
    fn estimate(&self) -> f32 {
        self.estimate
    }
    fn set_estimate(&mut self, estimate: f32) {
        self.edited.estimate |= estimate != self.estimate;
        self.estimate = estimate;
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn set_tags(&mut self, tags: Vec<String>) {
        self.edited.tags |= tags != self.tags;
        self.tags = tags;
    }
    fn tracker_id(&self) -> i64 {
        self.tracker_id
    }
    fn set_tracker_id(&mut self, id: i64) {
        self.tracker_id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewItem {
    Task(Task),
    Debt(TechDebtPage),
}

macro_rules! delegate {
    ($self:ident, $item:ident => $body:expr) => {
        match $self {
            PreviewItem::Task($item) => $body,
            PreviewItem::Debt($item) => $body,
        }
    };
}

impl Editable for PreviewItem {
    fn title(&self) -> &str {
        delegate!(self, it => it.title())
    }
    fn set_title(&mut self, title: String) {
        delegate!(self, it => it.set_title(title))
    }
    fn description(&self) -> &str {
        delegate!(self, it => it.description())
    }
    fn set_description(&mut self, description: String) {
        delegate!(self, it => it.set_description(description))
    }
    fn estimate(&self) -> f32 {
        delegate!(self, it => it.estimate())
    }
    fn set_estimate(&mut self, estimate: f32) {
        delegate!(self, it => it.set_estimate(estimate))
    }
    fn tags(&self) -> &[String] {
        delegate!(self, it => it.tags())
    }
    fn set_tags(&mut self, tags: Vec<String>) {
        delegate!(self, it => it.set_tags(tags))
    }
    fn tracker_id(&self) -> i64 {
        delegate!(self, it => it.tracker_id())
    }
    fn set_tracker_id(&mut self, id: i64) {
        delegate!(self, it => it.set_tracker_id(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewTable {
    pub number: usize,
    pub items: Vec<PreviewItem>,
}

impl PreviewTable {
    pub fn from_tasks(table: &TaskTable) -> Self {
        Self {
            number: table.number,
            items: table.tasks.iter().cloned().map(PreviewItem::Task).collect(),
        }
    }

    pub fn from_debt(number: usize, pages: &[TechDebtPage]) -> Self {
        Self {
            number,
            items: pages.iter().cloned().map(PreviewItem::Debt).collect(),
        }
    }

    pub fn total_estimate(&self) -> f32 {
        self.items.iter().map(Editable::estimate).sum()
    }
}

/// Copy previewed values back onto `target`, position by position.
pub fn set_back<T: Editable>(items: &[PreviewItem], target: &mut [T]) {
    for (item, dest) in items.iter().zip(target.iter_mut()) {
        if item.title() != dest.title() {
            dest.set_title(item.title().to_string());
        }
        if item.description() != dest.description() {
            dest.set_description(item.description().to_string());
        }
        if item.estimate() != dest.estimate() {
            dest.set_estimate(item.estimate());
        }
        if item.tags() != dest.tags() {
            dest.set_tags(item.tags().to_vec());
        }
    }
}
