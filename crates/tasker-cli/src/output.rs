use serde::Serialize;
use tasker_core::report::SyncReport;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Aligned plain-text table. Widths count characters, not bytes.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let width = |s: &str| s.chars().count();
    let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(width(cell));
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.to_vec()));
    out.push(line(sep.iter().map(String::as_str).collect()));
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

/// Final result of a run: the whole report as JSON, or its summary.
pub fn print_report(report: &SyncReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    if !report.approved {
        eprintln!("canceled by user");
        return Ok(());
    }
    println!("{}", report.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_by_characters() {
        let rows = vec![
            vec!["1".to_string(), "Репо".to_string()],
            vec!["12".to_string(), "ab".to_string()],
        ];
        let text = render_table(&["#", "Title"], &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#   Title");
        assert_eq!(lines[1], "--  -----");
        assert_eq!(lines[2], "1   Репо");
        assert_eq!(lines[3], "12  ab");
    }
}
