//! Wiki storage-format handling.
//!
//! `parser` reads task tables and macro references through an HTML DOM;
//! `patcher` writes back by splicing the original bytes, using `scan` to find
//! table and cell boundaries. `macros` renders the structured macros we emit.

pub mod macros;
pub mod parser;
pub mod patcher;
pub mod scan;

pub use parser::{parse_tasks, scan_page, PageSummary, ParsedPage, SkippedRow};
pub use patcher::{patch_page, prepend_fragment, Patched};

use regex::{Captures, Regex};
use std::sync::OnceLock;

static SELF_CLOSING_RE: OnceLock<Regex> = OnceLock::new();
static REWRITTEN_PAIR_RE: OnceLock<Regex> = OnceLock::new();
static CDATA_RE: OnceLock<Regex> = OnceLock::new();
static CDATA_COMMENT_RE: OnceLock<Regex> = OnceLock::new();

/// Self-closing namespaced element such as `<ac:emoticon ac:name="smile" />`.
fn self_closing_re() -> &'static Regex {
    SELF_CLOSING_RE
        .get_or_init(|| Regex::new(r"(?i)<([a-z]+:[a-z0-9-]+)(\s[^<>]*?)?\s*/>").unwrap())
}

/// Marks the open/close pairs produced by [`fix_markup`].
const VOID_MARKER: &str = "data-tasker-void";

/// Pair carrying [`VOID_MARKER`] as its last attribute.
fn rewritten_pair_re() -> &'static Regex {
    REWRITTEN_PAIR_RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?i)<([a-z]+:[a-z0-9-]+)(\s[^<>]*?)?\s+{VOID_MARKER}=""></([a-z]+:[a-z0-9-]+)>"#
        ))
        .unwrap()
    })
}

fn cdata_re() -> &'static Regex {
    CDATA_RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap())
}

fn cdata_comment_re() -> &'static Regex {
    CDATA_COMMENT_RE.get_or_init(|| Regex::new(r"(?s)<!--\[CDATA\[(.*?)\]\]-->").unwrap())
}

/// Make storage format digestible for an HTML5 parser: self-closing
/// namespaced elements (emoticons, attachments, user links) become
/// open/close pairs and CDATA sections become comments. Rewritten pairs carry
/// a marker attribute so [`restore_markup`] collapses only those.
pub fn fix_markup(body: &str) -> String {
    let paired = format!(r#"<$1$2 {VOID_MARKER}=""></$1>"#);
    let body = self_closing_re().replace_all(body, paired.as_str());
    cdata_re().replace_all(&body, "<!--[CDATA[$1]]-->").into_owned()
}

/// Inverse of [`fix_markup`] for fragments serialized out of the DOM. Empty
/// pairs written as such in the source stay pairs.
pub fn restore_markup(fragment: &str) -> String {
    let fragment = cdata_comment_re().replace_all(fragment, "<![CDATA[$1]]>");
    rewritten_pair_re()
        .replace_all(&fragment, |caps: &Captures| {
            if caps[1].eq_ignore_ascii_case(&caps[3]) {
                let attrs = caps.get(2).map_or("", |m| m.as_str());
                format!("<{}{} />", &caps[1], attrs)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_closing_elements_are_paired_and_restored() {
        let body = r#"<p>ok <ac:emoticon ac:name="smile" /> done</p>"#;
        let fixed = fix_markup(body);
        assert_eq!(
            fixed,
            r#"<p>ok <ac:emoticon ac:name="smile" data-tasker-void=""></ac:emoticon> done</p>"#
        );
        assert_eq!(restore_markup(&fixed), body);

        let image = r#"<ac:image><ri:attachment ri:filename="a.png" /></ac:image>"#;
        let fixed = fix_markup(image);
        assert!(fixed.contains(
            r#"<ri:attachment ri:filename="a.png" data-tasker-void=""></ri:attachment>"#
        ));
        assert_eq!(restore_markup(&fixed), image);
    }

    #[test]
    fn source_empty_pairs_stay_pairs() {
        let body = r#"<p><ac:link><ri:page ri:content-title="План"></ri:page></ac:link><ac:emoticon ac:name="tick" /></p>"#;
        let restored = restore_markup(&fix_markup(body));
        assert_eq!(restored, body);
        assert!(restored.contains(r#"<ri:page ri:content-title="План"></ri:page>"#));
    }

    #[test]
    fn plain_html_void_elements_are_left_alone() {
        assert_eq!(fix_markup("<p>a<br/>b</p>"), "<p>a<br/>b</p>");
    }

    #[test]
    fn cdata_survives_as_comment() {
        let body = "<ac:plain-text-body><![CDATA[a < b\n]]></ac:plain-text-body>";
        let fixed = fix_markup(body);
        assert_eq!(fixed, "<ac:plain-text-body><!--[CDATA[a < b\n]]--></ac:plain-text-body>");
        assert_eq!(restore_markup(&fixed), body);
    }
}
