use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    NotCreated,
    NotUpdated,
    Skipped,
    Archived,
    NotArchived,
    Moved,
    NotMoved,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Created => "CREATED",
            Outcome::Updated => "UPDATED",
            Outcome::NotCreated => "NOT CREATED",
            Outcome::NotUpdated => "NOT UPDATED",
            Outcome::Skipped => "SKIPPED",
            Outcome::Archived => "ARCHIVED",
            Outcome::NotArchived => "NOT ARCHIVED",
            Outcome::Moved => "MOVED",
            Outcome::NotMoved => "NOT MOVED",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::NotCreated | Outcome::NotUpdated | Outcome::NotArchived | Outcome::NotMoved
        )
    }
}

/// One per-item result, printed in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub outcome: Outcome,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl StatusLine {
    pub fn new(outcome: Outcome, title: impl Into<String>) -> Self {
        Self {
            outcome,
            title: title.into(),
            tracker_id: None,
            cause: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.tracker_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.outcome.label(), self.title)?;
        if let Some(id) = self.tracker_id {
            write!(f, " (#{id})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

/// Summary of one engine run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Pages re-parented, by archival or by an explicit move.
    pub archived: usize,
    /// True when the run pushed at least one new page version.
    pub page_written: bool,
    /// False when the user declined the preview.
    pub approved: bool,
    pub lines: Vec<StatusLine>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn record(&mut self, line: StatusLine) {
        match line.outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Archived | Outcome::Moved => self.archived += 1,
            Outcome::NotCreated | Outcome::NotUpdated | Outcome::NotArchived | Outcome::NotMoved => {
                self.failed += 1
            }
        }
        self.lines.push(line);
    }

    /// "2 created, 1 updated, 0 skipped, 1 failed"
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} created, {} updated, {} skipped, {} failed",
            self.created, self.updated, self.skipped, self.failed
        );
        if self.archived > 0 {
            text.push_str(&format!(", {} moved", self.archived));
        }
        text
    }
}
