//! Wiki maintenance: moving pages and replacing page content.

use crate::error::{Result, TaskerError};
use crate::gateway::guarded;
use crate::markup::macros;
use crate::report::{Outcome, StatusLine, SyncReport};
use crate::session::Session;
use crate::types::Page;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub content: String,
    /// Wrap `content` in the markdown macro instead of storing it as is.
    pub markdown: bool,
    /// Prepend a collapsed table of contents down to this heading level.
    pub toc: Option<u8>,
}

impl Upload {
    /// Storage-format body that replaces the page content.
    pub fn render(&self) -> String {
        let content = if self.markdown {
            macros::markdown_macro(&self.content)
        } else {
            self.content.clone()
        };
        match self.toc {
            Some(level) => format!("{}{content}", macros::toc_macro(level)),
            None => content,
        }
    }
}

pub struct WikiOps<'a> {
    session: &'a Session,
    space_key: Option<String>,
}

impl<'a> WikiOps<'a> {
    /// `space_key` is used to resolve pages given by title.
    pub fn new(session: &'a Session, space_key: Option<String>) -> Self {
        Self { session, space_key }
    }

    async fn resolve(&self, id_or_title: &str) -> Result<Page> {
        let s = self.session;
        s.pages
            .resolve(s.wiki.as_ref(), &s.cancel, self.space_key.as_deref(), id_or_title)
            .await
    }

    /// Re-parent every page under `target`. Pages and target may be ids or titles.
    pub async fn move_pages(&self, pages: &[String], target: &str) -> Result<SyncReport> {
        let s = self.session;
        let mut report = s.start_report();
        let target = self.resolve(target).await?;
        tracing::debug!(target_id = %target.id, count = pages.len(), "moving pages");

        for wanted in pages {
            let page = match self.resolve(wanted).await {
                Ok(page) => page,
                Err(TaskerError::Aborted) => return Err(TaskerError::Aborted),
                Err(e) => {
                    s.emit(
                        &mut report,
                        StatusLine::new(Outcome::NotMoved, wanted.as_str()).with_cause(e.to_string()),
                    );
                    continue;
                }
            };

            let moved = guarded(
                &s.cancel,
                s.wiki.move_page(&page.space_key, &page.id, &target.id),
            )
            .await;
            let line = match moved {
                Ok(()) => {
                    s.pages.forget(&page.id);
                    StatusLine::new(Outcome::Moved, format!("{} {}", page.id, page.title))
                }
                Err(TaskerError::Aborted) => return Err(TaskerError::Aborted),
                Err(e) => StatusLine::new(Outcome::NotMoved, format!("{} {}", page.id, page.title))
                    .with_cause(e.to_string()),
            };
            s.emit(&mut report, line);
        }
        Ok(s.finish(report))
    }

    /// Replace the body of `page` and return the new version number.
    pub async fn upload(&self, page: &str, upload: &Upload) -> Result<u32> {
        let s = self.session;
        let page = self.resolve(page).await?;
        s.write_page(&page, upload.render()).await?;
        Ok(page.version + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::scan::table_spans;
    use crate::testing::{FakeTracker, FakeWiki, ScriptedUi};
    use crate::tracker::TrackerSettings;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn page(id: &str, title: &str) -> Page {
        Page {
            id: id.into(),
            kind: "page".into(),
            title: title.into(),
            space_key: "DEV".into(),
            version: 4,
            body: "<p>old</p>".into(),
            ..Default::default()
        }
    }

    fn session(wiki: &Arc<FakeWiki>) -> Session {
        Session::new(
            Arc::new(FakeTracker::default()),
            wiki.clone(),
            Arc::new(ScriptedUi::approving()),
            TrackerSettings::default(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn markdown_upload_is_wrapped_and_toc_comes_first() {
        let upload = Upload {
            content: "# Title".into(),
            markdown: true,
            toc: Some(3),
        };
        let body = upload.render();
        let toc = body.find(r#"ac:name="toc""#).unwrap();
        let markdown = body.find(r#"ac:name="markdown""#).unwrap();
        assert!(toc < markdown);
        assert!(body.contains(r#"<ac:parameter ac:name="maxLevel">3</ac:parameter>"#));
        assert!(body.contains("<![CDATA[# Title]]>"));
    }

    #[test]
    fn plain_upload_is_stored_verbatim() {
        let upload = Upload {
            content: "<table><tr><td>x</td></tr></table>".into(),
            ..Default::default()
        };
        assert_eq!(upload.render(), upload.content);
        assert_eq!(table_spans(&upload.render()).len(), 1);
    }

    #[tokio::test]
    async fn moves_pages_by_id_and_title() {
        let wiki = Arc::new(FakeWiki::default());
        wiki.add_page(page("1", "Черновик"));
        wiki.add_page(page("2", "Заметки"));
        wiki.add_page(page("9", "Архив"));
        let s = session(&wiki);
        let ops = WikiOps::new(&s, Some("DEV".into()));

        let pages = vec!["1".to_string(), "Заметки".to_string(), "Нет такой".to_string()];
        let report = ops.move_pages(&pages, "Архив").await.unwrap();

        assert_eq!(report.archived, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.lines[0].title, "1 Черновик");
        assert_eq!(report.lines[2].outcome, Outcome::NotMoved);
        let targets: Vec<String> = wiki.moves().into_iter().map(|(_, _, t)| t).collect();
        assert_eq!(targets, vec!["9", "9"]);
    }

    #[tokio::test]
    async fn unknown_target_fails_before_moving() {
        let wiki = Arc::new(FakeWiki::default());
        wiki.add_page(page("1", "Черновик"));
        let s = session(&wiki);
        let err = WikiOps::new(&s, Some("DEV".into()))
            .move_pages(&["1".to_string()], "Нет")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskerError::PageNotFound(_)));
        assert!(wiki.moves().is_empty());
    }

    #[tokio::test]
    async fn upload_writes_next_version() {
        let wiki = Arc::new(FakeWiki::default());
        wiki.add_page(page("1", "Черновик"));
        let s = session(&wiki);
        let upload = Upload {
            content: "<p>new</p>".into(),
            ..Default::default()
        };

        let version = WikiOps::new(&s, None).upload("1", &upload).await.unwrap();
        assert_eq!(version, 5);
        assert_eq!(wiki.page("1").unwrap().body, "<p>new</p>");
    }
}
