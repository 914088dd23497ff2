use super::scan::{cell_content_span, table_spans};
use crate::error::{Result, TaskerError};
use crate::task::Task;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub body: String,
    /// False when no anchor cell was touched; `body` is then the input.
    pub modified: bool,
}

/// Write queued tracker cells back into `body`.
///
/// Only the inner content of touched anchor cells changes; every byte
/// outside them, including the rest of each touched table, is kept.
pub fn patch_page(body: &str, tasks: &[Task]) -> Result<Patched> {
    // table -> (row, cell) -> markup
    let mut edits: BTreeMap<usize, BTreeMap<(usize, usize), &str>> = BTreeMap::new();
    for task in tasks {
        if let (Some(anchor), Some(markup)) = (task.anchor(), task.rewrite.as_deref()) {
            edits
                .entry(anchor.table)
                .or_default()
                .insert((anchor.row, anchor.cell), markup);
        }
    }

    let Some(&last_table) = edits.keys().next_back() else {
        return Ok(Patched {
            body: body.to_string(),
            modified: false,
        });
    };

    let found = table_spans(body).len();
    if last_table >= found {
        return Err(TaskerError::Structure(format!(
            "task table #{} not found, page has {found} table(s)",
            last_table + 1
        )));
    }

    let mut body = body.to_string();
    for (table, cells) in &edits {
        // Offsets shift after every splice.
        let spans = table_spans(&body);
        let span = spans.get(*table).cloned().ok_or_else(|| {
            TaskerError::Structure(format!("task table #{} disappeared while patching", table + 1))
        })?;

        let rewritten = rewrite_cells(&body[span.clone()], *table, cells)?;
        body.replace_range(span, &rewritten);
    }

    Ok(Patched {
        body,
        modified: true,
    })
}

fn rewrite_cells(
    table_markup: &str,
    table: usize,
    cells: &BTreeMap<(usize, usize), &str>,
) -> Result<String> {
    let mut located = Vec::with_capacity(cells.len());
    for (&(row, cell), markup) in cells {
        let range = cell_content_span(table_markup, row, cell).ok_or_else(|| {
            TaskerError::Structure(format!(
                "cell {} of row {} in task table #{} not found",
                cell + 1,
                row + 1,
                table + 1
            ))
        })?;
        located.push((range, *markup));
    }

    // Back to front so earlier ranges stay valid.
    located.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    let mut out = table_markup.to_string();
    for (range, markup) in located {
        out.replace_range(range, markup);
    }
    Ok(out)
}

/// Legacy tech-debt write-back: `fragment` goes in front of the body as is.
pub fn prepend_fragment(body: &str, fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + body.len());
    out.push_str(fragment);
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{macros, parse_tasks};

    const BODY: &str = "<h1>План</h1>\n<p>Задачи</p>\n<table class=\"wrapped\"><colgroup><col /><col /></colgroup><tbody>\n<tr><th>Задача</th><th>Оценка</th><th>TFS</th></tr>\n<tr><td>Репо</td><td>7</td><td><br /></td></tr>\n<tr><td>Сервис</td><td>3</td><td></td></tr>\n</tbody></table>\n<p>Задачи</p><table><tbody><tr><th>Задача</th><th>Оценка</th><th>TFS</th></tr><tr><td>UI</td><td>2</td><td>  </td></tr></tbody></table><p>конец <ac:emoticon ac:name=\"smile\" /></p>";

    #[test]
    fn untouched_tasks_leave_body_unchanged() {
        let parsed = parse_tasks(BODY).unwrap();
        assert_eq!(parsed.tasks.len(), 3);
        let patched = patch_page(BODY, &parsed.tasks).unwrap();
        assert!(!patched.modified);
        assert_eq!(patched.body, BODY);
    }

    #[test]
    fn only_anchor_cells_change() {
        let mut parsed = parse_tasks(BODY).unwrap();
        parsed.tasks[1].mark_synced(101, macros::work_item_cell(101));
        parsed.tasks[2].mark_synced(102, macros::work_item_cell(102));

        let patched = patch_page(BODY, &parsed.tasks).unwrap();
        assert!(patched.modified);

        let reparsed = parse_tasks(&patched.body).unwrap();
        let ids: Vec<i64> = reparsed.tasks.iter().map(|t| t.tracker_id).collect();
        assert_eq!(ids, vec![0, 101, 102]);
        let titles: Vec<&str> = reparsed.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Репо", "Сервис", "UI"]);

        // first row and everything around the tables is byte-identical
        assert!(patched.body.starts_with("<h1>План</h1>\n<p>Задачи</p>\n<table class=\"wrapped\"><colgroup><col /><col /></colgroup>"));
        assert!(patched.body.contains("<tr><td>Репо</td><td>7</td><td><br /></td></tr>"));
        assert!(patched.body.ends_with("<p>конец <ac:emoticon ac:name=\"smile\" /></p>"));
    }

    #[test]
    fn bytes_outside_table_spans_are_preserved() {
        let mut parsed = parse_tasks(BODY).unwrap();
        parsed.tasks[0].mark_synced(7, macros::work_item_cell(7));
        let patched = patch_page(BODY, &parsed.tasks).unwrap();

        let outside = |body: &str| {
            let spans = table_spans(body);
            let mut rest = String::new();
            let mut cursor = 0;
            for span in spans {
                rest.push_str(&body[cursor..span.start]);
                cursor = span.end;
            }
            rest.push_str(&body[cursor..]);
            rest
        };
        assert_eq!(outside(BODY), outside(&patched.body));
        assert_eq!(table_spans(BODY)[1].len(), table_spans(&patched.body)[1].len());
    }

    #[test]
    fn missing_table_is_a_structure_error() {
        let mut task = Task::new("x", 5, 1);
        task.anchor_cell = Some(0);
        task.mark_synced(1, "m".into());
        let err = patch_page(BODY, &[task]).unwrap_err();
        assert!(matches!(err, TaskerError::Structure(_)));
    }

    #[test]
    fn missing_cell_is_a_structure_error() {
        let mut task = Task::new("x", 0, 9);
        task.anchor_cell = Some(2);
        task.mark_synced(1, "m".into());
        assert!(matches!(
            patch_page(BODY, &[task]),
            Err(TaskerError::Structure(_))
        ));
    }

    #[test]
    fn patching_twice_is_stable() {
        let mut parsed = parse_tasks(BODY).unwrap();
        parsed.tasks[0].mark_synced(11, macros::work_item_cell(11));
        let first = patch_page(BODY, &parsed.tasks).unwrap();

        let again = parse_tasks(&first.body).unwrap();
        assert_eq!(again.tasks[0].tracker_id, 11);
        let second = patch_page(&first.body, &again.tasks).unwrap();
        assert!(!second.modified);
        assert_eq!(second.body, first.body);
    }

    #[test]
    fn prepend_keeps_body() {
        assert_eq!(prepend_fragment("<p>b</p>", "<p>a</p>"), "<p>a</p><p>b</p>");
    }
}
