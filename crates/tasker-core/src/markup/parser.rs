use super::{fix_markup, restore_markup};
use crate::error::Result;
use crate::task::Task;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Name of the structured macro that renders a tracker work item.
pub const WORK_ITEM_MACRO: &str = "work-item-tfs";

static TASKS_LABEL_RE: OnceLock<Regex> = OnceLock::new();
static NON_LETTER_RE: OnceLock<Regex> = OnceLock::new();
static OPEN_GAP_RE: OnceLock<Regex> = OnceLock::new();
static CLOSE_GAP_RE: OnceLock<Regex> = OnceLock::new();
static TABLE_SEL: OnceLock<Selector> = OnceLock::new();
static ROW_SEL: OnceLock<Selector> = OnceLock::new();

fn tasks_label_re() -> &'static Regex {
    TASKS_LABEL_RE.get_or_init(|| Regex::new(r"(?i)задач").unwrap())
}

fn non_letter_re() -> &'static Regex {
    NON_LETTER_RE.get_or_init(|| Regex::new(r"\PL+").unwrap())
}

fn open_gap_re() -> &'static Regex {
    OPEN_GAP_RE.get_or_init(|| Regex::new(r"[ \t\r\n]+<").unwrap())
}

fn close_gap_re() -> &'static Regex {
    CLOSE_GAP_RE.get_or_init(|| Regex::new(r">[ \t\r\n]+").unwrap())
}

fn table_sel() -> &'static Selector {
    TABLE_SEL.get_or_init(|| Selector::parse("table").unwrap())
}

fn row_sel() -> &'static Selector {
    ROW_SEL.get_or_init(|| Selector::parse("tr").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Column {
    Title,
    Description,
    Estimate,
    Tracker,
    Tags,
}

impl Column {
    fn from_header(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "задача" => Some(Column::Title),
            "описание" => Some(Column::Description),
            "оценка" => Some(Column::Estimate),
            "tfs" => Some(Column::Tracker),
            "тег" | "теги" => Some(Column::Tags),
            _ => None,
        }
    }
}

/// A row dropped because its tracker cell holds something other than a
/// work item macro.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub title: String,
    pub table: usize,
    pub row: usize,
    pub cell_text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Valid rows in document order.
    pub tasks: Vec<Task>,
    pub skipped: Vec<SkippedRow>,
    /// Number of top-level tables recognised as task tables.
    pub task_tables: usize,
}

/// Extract tasks from every task table of a storage-format body.
///
/// The HTML5 parser recovers from any input, so an error here only means the
/// body could not be read as markup at all.
pub fn parse_tasks(body: &str) -> Result<ParsedPage> {
    let doc = Html::parse_fragment(&fix_markup(body));
    let mut page = ParsedPage::default();

    let top_level = doc
        .select(table_sel())
        .filter(|table| !table.ancestors().filter_map(ElementRef::wrap).any(is_table));

    for (index, table) in top_level.enumerate() {
        if table.descendants().skip(1).filter_map(ElementRef::wrap).any(is_table) {
            continue;
        }
        if !preceded_by_tasks_label(table) {
            continue;
        }
        page.task_tables += 1;
        read_table(index, table, &mut page);
    }

    Ok(page)
}

fn is_table(el: ElementRef<'_>) -> bool {
    el.value().name().eq_ignore_ascii_case("table")
}

fn preceded_by_tasks_label(table: ElementRef<'_>) -> bool {
    for sibling in table.prev_siblings() {
        match sibling.value() {
            Node::Text(text) if text.trim().is_empty() => continue,
            Node::Comment(_) => continue,
            Node::Text(text) => return tasks_label_re().is_match(text),
            Node::Element(_) => {
                return ElementRef::wrap(sibling)
                    .map(|el| tasks_label_re().is_match(&text_of(el)))
                    .unwrap_or(false)
            }
            _ => return false,
        }
    }
    false
}

fn read_table(index: usize, table: ElementRef<'_>, page: &mut ParsedPage) {
    let rows: Vec<ElementRef<'_>> = table.select(row_sel()).collect();
    let Some(header) = rows.first() else {
        return;
    };

    // Header cells are th only; td in the first row does not map.
    let mut columns: BTreeMap<usize, Column> = BTreeMap::new();
    for (i, th) in child_cells(*header, "th").into_iter().enumerate() {
        if let Some(column) = Column::from_header(&text_of(th)) {
            columns.insert(i, column);
        }
    }
    if columns.is_empty() {
        return;
    }

    // Body cells are td only and paired with header th by position, so a
    // th opening each body row (highlighted first column) shifts the
    // mapping. scan::cell_content_span counts cells the same way.
    for (row_index, row) in rows.iter().enumerate().skip(1) {
        let cells = child_cells(*row, "td");
        if cells.len() < columns.len() {
            continue;
        }

        let mut task = Task::new(String::new(), index, row_index);
        let mut tracker_text = String::new();

        for (&cell_index, column) in &columns {
            let Some(cell) = cells.get(cell_index) else {
                continue;
            };
            match column {
                Column::Title => task.title = text_of(*cell).trim().to_string(),
                Column::Description => task.description = description_of(*cell),
                Column::Estimate => task.estimate = estimate_of(*cell),
                Column::Tracker => {
                    task.anchor_cell = Some(cell_index);
                    tracker_text = text_of(*cell).trim().to_string();
                    task.tracker_id = tracker_id_of(*cell, &tracker_text);
                }
                Column::Tags => task.tags = tags_of(*cell),
            }
        }

        if task.tracker_id < 0 {
            tracing::warn!(table = index, row = row_index, title = %task.title, "tracker cell is not a work item reference");
            page.skipped.push(SkippedRow {
                title: task.title,
                table: index,
                row: row_index,
                cell_text: tracker_text,
            });
            continue;
        }
        if task.is_valid() {
            page.tasks.push(task);
        }
    }
}

fn child_cells<'a>(row: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case(name))
        .collect()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn description_of(cell: ElementRef<'_>) -> String {
    let html = restore_markup(&cell.inner_html());
    let html = open_gap_re().replace_all(&html, "<");
    close_gap_re().replace_all(&html, ">").trim().to_string()
}

fn estimate_of(cell: ElementRef<'_>) -> f32 {
    text_of(cell)
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Id from the first `itemID` parameter; `-1` when the cell has other text.
fn tracker_id_of(cell: ElementRef<'_>, cell_text: &str) -> i64 {
    let parsed = find_parameter(cell, "itemID").and_then(|v| v.trim().parse::<i64>().ok());
    match parsed {
        Some(id) if id >= 0 => id,
        Some(_) => -1,
        None if cell_text.is_empty() => 0,
        None => -1,
    }
}

fn tags_of(cell: ElementRef<'_>) -> Vec<String> {
    non_letter_re()
        .split(&text_of(cell))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text of the first descendant `<ac:parameter ac:name="{name}">`.
fn find_parameter(root: ElementRef<'_>, name: &str) -> Option<String> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "ac:parameter" && el.value().attr("ac:name") == Some(name)
        })
        .map(text_of)
}

// ---------------------------------------------------------------------------
// Whole-page summary (tech-debt pages)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    /// Work item ids referenced by `work-item-tfs` macros, in document order.
    pub item_ids: Vec<i64>,
    /// True when the rendered text of the body is blank.
    pub is_blank: bool,
}

/// Collect work item references and blankness of a page body.
pub fn scan_page(body: &str) -> Result<PageSummary> {
    let doc = Html::parse_fragment(&fix_markup(body));
    let root = doc.root_element();

    let mut item_ids = Vec::new();
    for el in root.descendants().filter_map(ElementRef::wrap) {
        if el.value().name() != "ac:structured-macro"
            || el.value().attr("ac:name") != Some(WORK_ITEM_MACRO)
        {
            continue;
        }
        if let Some(raw) = find_parameter(el, "itemID") {
            let id = raw.trim().parse::<i64>().map_err(|e| {
                crate::error::TaskerError::Markup(format!("work item id '{}': {e}", raw.trim()))
            })?;
            item_ids.push(id);
        }
    }

    let is_blank = root.text().all(|t| t.trim().is_empty());
    Ok(PageSummary { item_ids, is_blank })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
