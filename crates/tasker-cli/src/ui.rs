//! Terminal previewer: prints the tables about to be synchronized to stderr
//! and waits for ENTER. Stdout stays reserved for results.

use crate::output::render_table;
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tasker_core::gateway::UserInterface;
use tasker_core::preview::{Editable, PreviewTable};
use tasker_core::report::StatusLine;
use tasker_core::{Result, TaskerError};
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(100);

pub struct TerminalUi {
    cancel: CancellationToken,
    /// Suppress per-item status lines (the JSON report carries them).
    quiet: bool,
}

impl TerminalUi {
    pub fn new(cancel: CancellationToken, quiet: bool) -> Self {
        Self { cancel, quiet }
    }

    /// Read one line on a helper thread so Ctrl-C can interrupt the wait.
    fn wait_for_enter(&self) -> Result<bool> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line).map(|n| (n, line));
            let _ = tx.send(read);
        });
        loop {
            if self.cancel.is_cancelled() {
                return Err(TaskerError::Aborted);
            }
            match rx.recv_timeout(POLL) {
                Ok(Ok((0, _))) => return Ok(false),
                Ok(Ok((_, line))) => return Ok(answer_is_yes(&line)),
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(false),
            }
        }
    }
}

fn answer_is_yes(line: &str) -> bool {
    !matches!(line.trim().to_lowercase().as_str(), "n" | "no" | "q")
}

fn format_estimate(hours: f32) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0}")
    } else {
        format!("{hours:.1}")
    }
}

pub fn render_preview(table: &PreviewTable) -> String {
    let rows: Vec<Vec<String>> = table
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = item.tracker_id();
            vec![
                (i + 1).to_string(),
                item.title().to_string(),
                format_estimate(item.estimate()),
                item.tags().join(", "),
                if id > 0 { id.to_string() } else { String::new() },
            ]
        })
        .collect();
    format!(
        "Table {}\n{}\nTotal: {} h",
        table.number,
        render_table(&["#", "Title", "Estimate", "Tags", "TFS"], &rows),
        format_estimate(table.total_estimate())
    )
}

impl UserInterface for TerminalUi {
    fn preview(&self, tables: &mut [PreviewTable]) -> Result<bool> {
        let mut err = std::io::stderr().lock();
        for table in tables.iter() {
            writeln!(err, "{}\n", render_preview(table))?;
        }
        write!(err, "Press ENTER to continue, n to decline, Ctrl-C to cancel: ")?;
        err.flush()?;
        drop(err);
        tokio::task::block_in_place(|| self.wait_for_enter())
    }

    fn status(&self, line: &StatusLine) {
        if !self.quiet {
            eprintln!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasker_core::preview::PreviewItem;
    use tasker_core::task::Task;

    #[test]
    fn preview_lists_items_with_total() {
        let mut a = Task::new("01. Репо", 0, 1);
        a.estimate = 7.0;
        a.tracker_id = 71711;
        let mut b = Task::new("02. Сервис", 0, 2);
        b.estimate = 1.5;
        let table = PreviewTable {
            number: 1,
            items: vec![PreviewItem::Task(a), PreviewItem::Task(b)],
        };

        let text = render_preview(&table);
        assert!(text.starts_with("Table 1\n"));
        assert!(text.contains("01. Репо"));
        assert!(text.contains("71711"));
        assert!(text.ends_with("Total: 8.5 h"));
    }

    #[test]
    fn only_explicit_no_declines() {
        assert!(answer_is_yes("\n"));
        assert!(answer_is_yes("y\n"));
        assert!(!answer_is_yes("n\n"));
        assert!(!answer_is_yes(" No \n"));
    }
}
