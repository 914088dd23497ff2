use std::path::{Path, PathBuf};
use tasker_core::config;

/// Resolve the config file.
///
/// Priority:
/// 1. `--config` flag / `TASKER_CONFIG` env var (passed in as `explicit`)
/// 2. `.tasker.yaml` in the working directory
/// 3. `.tasker.yaml` in the home directory
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let home = home::home_dir();
    config::locate(explicit, &cwd, home.as_deref())
}
