//! Byte-level boundaries inside storage-format markup.
//!
//! Works on the original body so that everything outside a rewritten cell is
//! emitted byte for byte. Comments and CDATA sections are skipped as opaque.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

static TABLE_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static CELL_TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn table_token_re() -> &'static Regex {
    TABLE_TOKEN_RE.get_or_init(|| {
        Regex::new(r"(?is)<!\[CDATA\[.*?\]\]>|<!--.*?-->|<table\b[^>]*>|</table\s*>").unwrap()
    })
}

fn cell_token_re() -> &'static Regex {
    CELL_TOKEN_RE.get_or_init(|| {
        Regex::new(
            r"(?is)<!\[CDATA\[.*?\]\]>|<!--.*?-->|<table\b[^>]*>|</table\s*>|<tr\b[^>]*>|</tr\s*>|<t[dh]\b[^>]*>|</t[dh]\s*>|</?(?:tbody|thead|tfoot)\b[^>]*>",
        )
        .unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Opaque,
    TableOpen,
    TableClose,
    RowOpen,
    RowClose,
    CellOpen { header: bool, self_closing: bool },
    CellClose,
    Section,
}

fn classify(tag: &str) -> Token {
    if tag.starts_with("<!") {
        return Token::Opaque;
    }
    let closing = tag.starts_with("</");
    let name: String = tag
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match (name.as_str(), closing) {
        ("table", false) => Token::TableOpen,
        ("table", true) => Token::TableClose,
        ("tr", false) => Token::RowOpen,
        ("tr", true) => Token::RowClose,
        ("td" | "th", false) => Token::CellOpen {
            header: name == "th",
            self_closing: tag.ends_with("/>"),
        },
        ("td" | "th", true) => Token::CellClose,
        _ => Token::Section,
    }
}

/// Byte spans of every top-level `<table>…</table>`, in document order.
/// An unterminated trailing table is not reported.
pub fn table_spans(body: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for m in table_token_re().find_iter(body) {
        match classify(m.as_str()) {
            Token::TableOpen => {
                if depth == 0 {
                    start = m.start();
                }
                depth += 1;
            }
            Token::TableClose if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(start..m.end());
                }
            }
            _ => {}
        }
    }

    spans
}

/// Range of the inner content of `<td>` number `cell` in `<tr>` number `row`
/// of a single table's markup. Rows and cells of nested tables do not count.
pub fn cell_content_span(table: &str, row: usize, cell: usize) -> Option<Range<usize>> {
    let mut depth = 0usize;
    let mut rows_seen = 0usize;
    let mut in_target_row = false;
    let mut cells_seen = 0usize;
    let mut content_start: Option<usize> = None;

    for m in cell_token_re().find_iter(table) {
        let token = classify(m.as_str());

        if let Some(start) = content_start {
            // Inside the target cell: anything at the same depth that ends
            // or begins a cell, row or section terminates it.
            match token {
                Token::TableOpen => depth += 1,
                Token::TableClose if depth > 1 => depth -= 1,
                Token::Opaque => {}
                _ if depth > 1 => {}
                _ => return Some(start..m.start()),
            }
            continue;
        }

        match token {
            Token::TableOpen => depth += 1,
            Token::TableClose => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return None;
                }
            }
            Token::RowOpen if depth == 1 => {
                in_target_row = rows_seen == row;
                rows_seen += 1;
                cells_seen = 0;
            }
            Token::RowClose if depth == 1 => in_target_row = false,
            // th cells in body rows are not counted, as in the parser.
            Token::CellOpen {
                header: false,
                self_closing,
            } if depth == 1 && in_target_row => {
                if cells_seen == cell {
                    if self_closing {
                        return None;
                    }
                    content_start = Some(m.end());
                }
                cells_seen += 1;
            }
            _ => {}
        }
    }

    None
}
