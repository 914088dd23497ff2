//! `tasker-api`: HTTP gateways behind the `tasker-core` seams.
//!
//! # Architecture
//!
//! ```text
//! tasker-core engine
//!     │  TrackerGateway            WikiGateway
//!     ▼                                ▼
//! TfsClient                       ConfluenceClient
//!     │  JSON Patch, WIQL              │  /rest/api/content, movepage.action
//!     ▼                                ▼
//! Azure DevOps Server (TFS)       Confluence Server
//! ```
//!
//! Both clients are cheap to clone and safe to share across tasks; the
//! engine holds them as `Arc<dyn …>`.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tasker_api::{ConfluenceClient, TfsClient};
//!
//! let cfg = tasker_core::config::Config::load(path)?;
//! let tracker = Arc::new(TfsClient::from_config(&cfg)?);
//! let wiki = Arc::new(ConfluenceClient::from_config(&cfg)?);
//! ```

pub mod confluence;
pub mod error;
pub mod tfs;
pub mod types;

pub(crate) mod http;


pub use confluence::ConfluenceClient;
pub use error::ApiError;
pub use tfs::TfsClient;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ApiError>;
