pub mod config;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod markup;
pub mod page_cache;
pub mod preview;
pub mod report;
pub mod session;
pub mod sync;
pub mod task;
pub mod tech_debt;
pub mod tracker;
pub mod types;
pub mod wiki;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, TaskerError};
