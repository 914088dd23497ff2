pub mod config;
pub mod sync;
pub mod task;
pub mod tech;
pub mod wiki;

use crate::root;
use crate::ui::TerminalUi;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tasker_api::{ConfluenceClient, TfsClient};
use tasker_core::config::Config;
use tasker_core::gateway::{AutoApprove, UserInterface, WikiGateway};
use tasker_core::session::Session;
use tasker_core::tracker::TrackerSettings;
use tasker_core::types::{Page, PageRef, PageUpdate};
use tasker_core::{Result, TaskerError};
use tokio_util::sync::CancellationToken;

/// Flags shared by every command.
pub struct Globals {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub yes: bool,
    pub cancel: CancellationToken,
}

impl Globals {
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        root::config_path(self.config.as_deref()).ok_or_else(|| TaskerError::NotConfigured.into())
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let path = self.config_path()?;
        let cfg = Config::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    fn ui(&self) -> Arc<dyn UserInterface> {
        if self.yes {
            Arc::new(AutoApprove)
        } else {
            Arc::new(TerminalUi::new(self.cancel.clone(), self.json))
        }
    }

    /// Clients and previewer for one invocation.
    pub fn session(&self, cfg: &Config) -> anyhow::Result<Session> {
        let tracker = TfsClient::from_config(cfg).context("invalid tfsBaseAddress")?;
        let wiki: Arc<dyn WikiGateway> = if cfg.wiki_base_address.trim().is_empty() {
            Arc::new(NoWiki)
        } else {
            Arc::new(ConfluenceClient::from_config(cfg).context("invalid wikiBaseAddress")?)
        };
        Ok(Session::new(
            Arc::new(tracker),
            wiki,
            self.ui(),
            TrackerSettings::from(cfg),
            self.cancel.clone(),
        ))
    }
}

/// Stand-in for commands that never touch the wiki when none is configured.
struct NoWiki;

impl NoWiki {
    fn missing<T>() -> Result<T> {
        Err(TaskerError::Config("wikiBaseAddress is not set".into()))
    }
}

#[async_trait]
impl WikiGateway for NoWiki {
    async fn get_page(&self, _id: &str) -> Result<Page> {
        Self::missing()
    }

    async fn find_pages_by_title(&self, _space_key: &str, _title: &str) -> Result<Vec<Page>> {
        Self::missing()
    }

    async fn child_pages(&self, _id: &str) -> Result<Vec<PageRef>> {
        Self::missing()
    }

    async fn update_page(&self, _update: &PageUpdate) -> Result<()> {
        Self::missing()
    }

    async fn move_page(&self, _space_key: &str, _page_id: &str, _target_id: &str) -> Result<()> {
        Self::missing()
    }
}
