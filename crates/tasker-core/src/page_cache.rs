use crate::error::{Result, TaskerError};
use crate::gateway::{guarded, WikiGateway};
use crate::types::Page;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Wiki pages fetched during one command, by id and by (space, title).
///
/// Lives exactly as long as the invocation that created it. Concurrent
/// writers only ever insert distinct ids.
#[derive(Debug, Default)]
pub struct PageCache {
    by_id: RwLock<HashMap<String, Page>>,
    by_title: RwLock<HashMap<(String, String), String>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Page> {
        self.by_id.read().ok()?.get(id).cloned()
    }

    pub fn get_by_title(&self, space_key: &str, title: &str) -> Option<Page> {
        let id = self
            .by_title
            .read()
            .ok()?
            .get(&(space_key.to_string(), title.to_string()))
            .cloned()?;
        self.get(&id)
    }

    pub fn insert(&self, page: Page) {
        if let Ok(mut titles) = self.by_title.write() {
            titles.insert((page.space_key.clone(), page.title.clone()), page.id.clone());
        }
        if let Ok(mut pages) = self.by_id.write() {
            pages.insert(page.id.clone(), page);
        }
    }

    /// Drop a page after writing it, so the next lookup sees the new version.
    pub fn forget(&self, id: &str) {
        if let Ok(mut pages) = self.by_id.write() {
            pages.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn page(
        &self,
        wiki: &dyn WikiGateway,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Page> {
        if let Some(page) = self.get(id) {
            return Ok(page);
        }
        let page = guarded(cancel, wiki.get_page(id)).await?;
        self.insert(page.clone());
        Ok(page)
    }

    /// Resolve a page id or a title. All-digit input is treated as an id.
    pub async fn resolve(
        &self,
        wiki: &dyn WikiGateway,
        cancel: &CancellationToken,
        space_key: Option<&str>,
        id_or_title: &str,
    ) -> Result<Page> {
        if is_page_id(id_or_title) {
            return self.page(wiki, cancel, id_or_title).await;
        }
        let space = space_key.ok_or_else(|| {
            TaskerError::Config(format!(
                "wikiSpaceKey is required to look up page '{id_or_title}' by title"
            ))
        })?;
        if let Some(page) = self.get_by_title(space, id_or_title) {
            return Ok(page);
        }

        let mut found = guarded(cancel, wiki.find_pages_by_title(space, id_or_title)).await?;
        match found.len() {
            0 => Err(TaskerError::PageNotFound(id_or_title.to_string())),
            1 => {
                let page = found.remove(0);
                self.insert(page.clone());
                Ok(page)
            }
            _ => Err(TaskerError::AmbiguousPage {
                space: space.to_string(),
                title: id_or_title.to_string(),
            }),
        }
    }
}

pub fn is_page_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWiki;

    fn page(id: &str, title: &str) -> Page {
        Page {
            id: id.into(),
            kind: "page".into(),
            title: title.into(),
            space_key: "DEV".into(),
            version: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fetches_once_per_id() {
        let wiki = FakeWiki::default();
        wiki.add_page(page("1", "Plan"));
        let cache = PageCache::new();
        let token = CancellationToken::new();

        cache.page(&wiki, &token, "1").await.unwrap();
        cache.page(&wiki, &token, "1").await.unwrap();
        assert_eq!(wiki.fetch_count("1"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn resolves_titles_within_space() {
        let wiki = FakeWiki::default();
        wiki.add_page(page("7", "Архив"));
        let cache = PageCache::new();
        let token = CancellationToken::new();

        let found = cache.resolve(&wiki, &token, Some("DEV"), "Архив").await.unwrap();
        assert_eq!(found.id, "7");
        assert!(cache.get_by_title("DEV", "Архив").is_some());

        let missing = cache.resolve(&wiki, &token, Some("DEV"), "Nope").await;
        assert!(matches!(missing, Err(TaskerError::PageNotFound(_))));

        let no_space = cache.resolve(&wiki, &token, None, "Архив").await;
        assert!(matches!(no_space, Err(TaskerError::Config(_))));
    }

    #[test]
    fn forget_drops_stale_page() {
        let cache = PageCache::new();
        cache.insert(page("1", "a"));
        cache.forget("1");
        assert!(cache.get("1").is_none());
        assert!(cache.get_by_title("DEV", "a").is_none());
    }

    #[test]
    fn page_ids_are_digits() {
        assert!(is_page_id("123"));
        assert!(!is_page_id("Plan 2"));
        assert!(!is_page_id(""));
    }
}
