//! Structured macros emitted into storage format.

use uuid::Uuid;

/// `work-item-tfs` macro rendering tracker item `id` with status and assignee.
pub fn work_item_macro(id: i64) -> String {
    work_item_macro_with_id(id, Uuid::new_v4())
}

pub fn work_item_macro_with_id(id: i64, macro_id: Uuid) -> String {
    format!(
        r#"<ac:structured-macro ac:name="work-item-tfs" ac:schema-version="1" ac:macro-id="{macro_id}"><ac:parameter ac:name="itemID">{id}</ac:parameter><ac:parameter ac:name="host">1</ac:parameter><ac:parameter ac:name="assigned">true</ac:parameter><ac:parameter ac:name="status">true</ac:parameter></ac:structured-macro>"#
    )
}

/// Content placed into a task row's tracker cell.
pub fn work_item_cell(id: i64) -> String {
    format!(
        r#"<div class="content-wrapper"><p>{}</p></div>"#,
        work_item_macro(id)
    )
}

/// Paragraph prepended to a tech-debt page body.
pub fn work_item_paragraph(id: i64) -> String {
    format!("<p>{}</p>", work_item_macro(id))
}

/// Wrap markdown source in the `markdown` macro.
pub fn markdown_macro(content: &str) -> String {
    format!(
        r#"<ac:structured-macro ac:name="markdown" ac:schema-version="1" ac:macro-id="{}"><ac:parameter ac:name="allowHtml">true</ac:parameter><ac:parameter ac:name="headerLinks">true</ac:parameter><ac:parameter ac:name="atlassian-macro-output-type">BLOCK</ac:parameter><ac:plain-text-body><![CDATA[{}]]></ac:plain-text-body></ac:structured-macro>"#,
        Uuid::new_v4(),
        escape_cdata(content)
    )
}

/// Collapsed table of contents down to heading `max_level`.
pub fn toc_macro(max_level: u8) -> String {
    format!(
        r#"<ac:structured-macro ac:name="expand" ac:schema-version="1" ac:macro-id="{}"><ac:parameter ac:name="title">Table of Contents</ac:parameter><ac:rich-text-body><p><ac:structured-macro ac:name="toc" ac:schema-version="1" ac:macro-id="{}"><ac:parameter ac:name="maxLevel">{max_level}</ac:parameter></ac:structured-macro></p></ac:rich-text-body></ac:structured-macro>"#,
        Uuid::new_v4(),
        Uuid::new_v4()
    )
}

// `]]>` cannot appear inside a CDATA section; split it across two.
fn escape_cdata(content: &str) -> String {
    content.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::scan_page;

    #[test]
    fn work_item_macro_is_readable_back() {
        let id = Uuid::nil();
        let markup = work_item_macro_with_id(71711, id);
        assert!(markup.starts_with(
            r#"<ac:structured-macro ac:name="work-item-tfs" ac:schema-version="1" ac:macro-id="00000000-0000-0000-0000-000000000000">"#
        ));
        assert_eq!(scan_page(&work_item_cell(42)).unwrap().item_ids, vec![42]);
        assert_eq!(scan_page(&markup).unwrap().item_ids, vec![71711]);
    }

    #[test]
    fn fresh_macro_ids_differ() {
        assert_ne!(work_item_macro(1), work_item_macro(1));
    }

    #[test]
    fn markdown_content_is_kept_in_cdata() {
        let m = markdown_macro("# Title\n\n`a]]>b`");
        assert!(m.contains("<![CDATA[# Title\n\n`a]]]]><![CDATA[>b`]]>"));
        assert!(m.contains(r#"ac:name="markdown""#));
    }

    #[test]
    fn toc_sits_inside_expand() {
        let m = toc_macro(3);
        assert!(m.starts_with(r#"<ac:structured-macro ac:name="expand""#));
        assert!(m.contains(r#"<ac:parameter ac:name="maxLevel">3</ac:parameter>"#));
    }
}
