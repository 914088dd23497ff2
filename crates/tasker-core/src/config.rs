use crate::error::{Result, TaskerError};
use crate::types::WorkItemKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file names looked up in the working and home directories.
pub const CONFIG_FILE_NAMES: &[&str] = &[".tasker.yaml", ".tasker.yml"];

const REDACTED: &str = "********";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DebtItemKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtItemKind {
    #[default]
    Task,
    Requirement,
}

impl From<DebtItemKind> for WorkItemKind {
    fn from(kind: DebtItemKind) -> Self {
        match kind {
            DebtItemKind::Task => WorkItemKind::Task,
            DebtItemKind::Requirement => WorkItemKind::Requirement,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub tfs_base_address: String,
    #[serde(default)]
    pub tfs_access_token: String,
    #[serde(default)]
    pub tfs_project: String,
    #[serde(default)]
    pub tfs_team: String,
    #[serde(default = "default_discipline")]
    pub tfs_discipline: String,
    /// Identity search filter; empty means "whoever the token belongs to".
    #[serde(default)]
    pub tfs_user_filter: String,
    #[serde(default)]
    pub tfs_common_user_story_name_pattern: String,
    #[serde(default)]
    pub tfs_bugfix_user_story_name_pattern: String,
    /// Title of bugfix tasks; `{{.ID}}` and `{{.Title}}` come from the bug.
    #[serde(default)]
    pub tfs_bug_title_template: String,
    #[serde(default = "default_parent_type")]
    pub tfs_parent_work_item_type: String,
    /// Also look for parents in past iterations.
    #[serde(default)]
    pub tfs_search_past_iterations: bool,
    #[serde(default = "default_requirement_type")]
    pub tfs_requirement_type: String,
    #[serde(default = "default_value_area")]
    pub tfs_value_area: String,

    #[serde(default)]
    pub wiki_base_address: String,
    #[serde(default)]
    pub wiki_access_token: String,
    #[serde(default)]
    pub wiki_user_name: String,
    #[serde(default)]
    pub wiki_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_space_key: Option<String>,

    #[serde(default = "default_sync_tags")]
    pub sync_default_tags: Vec<String>,
    #[serde(default)]
    pub tech_debt_item_kind: DebtItemKind,
    #[serde(default = "default_debt_tags")]
    pub tech_debt_tags: Vec<String>,
}

fn default_discipline() -> String {
    "Разработка".to_string()
}

fn default_parent_type() -> String {
    "Requirement".to_string()
}

fn default_requirement_type() -> String {
    "Functional".to_string()
}

fn default_value_area() -> String {
    "Architectural".to_string()
}

fn default_sync_tags() -> Vec<String> {
    vec!["разработка".to_string()]
}

fn default_debt_tags() -> Vec<String> {
    vec!["Tech".to_string(), "TechBacklog".to_string()]
}

/// How to authenticate against the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WikiAuth {
    Bearer(String),
    Basic { user: String, password: String },
    Anonymous,
}

impl Config {
    pub fn new(tfs_base_address: impl Into<String>) -> Self {
        Self {
            tfs_base_address: tfs_base_address.into(),
            tfs_access_token: String::new(),
            tfs_project: String::new(),
            tfs_team: String::new(),
            tfs_discipline: default_discipline(),
            tfs_user_filter: String::new(),
            tfs_common_user_story_name_pattern: String::new(),
            tfs_bugfix_user_story_name_pattern: String::new(),
            tfs_bug_title_template: String::new(),
            tfs_parent_work_item_type: default_parent_type(),
            tfs_search_past_iterations: false,
            tfs_requirement_type: default_requirement_type(),
            tfs_value_area: default_value_area(),
            wiki_base_address: String::new(),
            wiki_access_token: String::new(),
            wiki_user_name: String::new(),
            wiki_password: String::new(),
            wiki_space_key: None,
            sync_default_tags: default_sync_tags(),
            tech_debt_item_kind: DebtItemKind::default(),
            tech_debt_tags: default_debt_tags(),
        }
    }

    /// Read `path`, then apply `TASKER_*` secret overrides from the process
    /// environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if !path.exists() {
            return Err(TaskerError::NotConfigured);
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        cfg.apply_env(env);
        if cfg.tfs_base_address.trim().is_empty() {
            return Err(TaskerError::Config("tfsBaseAddress is required".into()));
        }
        Ok(cfg)
    }

    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 4] = [
            ("TASKER_TFS_ACCESS_TOKEN", &mut self.tfs_access_token),
            ("TASKER_WIKI_ACCESS_TOKEN", &mut self.wiki_access_token),
            ("TASKER_WIKI_USER_NAME", &mut self.wiki_user_name),
            ("TASKER_WIKI_PASSWORD", &mut self.wiki_password),
        ];
        for (key, slot) in overrides {
            if let Some(value) = env(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn wiki_auth(&self) -> WikiAuth {
        if !self.wiki_access_token.is_empty() {
            WikiAuth::Bearer(self.wiki_access_token.clone())
        } else if !self.wiki_user_name.is_empty() {
            WikiAuth::Basic {
                user: self.wiki_user_name.clone(),
                password: self.wiki_password.clone(),
            }
        } else {
            WikiAuth::Anonymous
        }
    }

    pub fn tech_debt_kind(&self) -> WorkItemKind {
        self.tech_debt_item_kind.into()
    }

    /// Copy safe to print: secrets replaced by a fixed mask.
    pub fn redacted(&self) -> Config {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };
        Config {
            tfs_access_token: mask(&self.tfs_access_token),
            wiki_access_token: mask(&self.wiki_access_token),
            wiki_password: mask(&self.wiki_password),
            ..self.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message,
            })
        };

        if !self.tfs_base_address.starts_with("http://")
            && !self.tfs_base_address.starts_with("https://")
        {
            warn(format!(
                "tfsBaseAddress '{}' is not an http(s) URL",
                self.tfs_base_address
            ));
        }
        if self.tfs_project.is_empty() {
            warn("tfsProject is empty; work items cannot be created".into());
        }
        if self.tfs_team.is_empty() {
            warn("tfsTeam is empty; iteration lookup will fail".into());
        }
        if self.wiki_base_address.is_empty() {
            warn("wikiBaseAddress is empty; wiki commands are unavailable".into());
        } else if self.wiki_auth() == WikiAuth::Anonymous {
            warn("no wiki credentials: set wikiAccessToken or wikiUserName/wikiPassword".into());
        }
        if !self.wiki_user_name.is_empty()
            && self.wiki_password.is_empty()
            && self.wiki_access_token.is_empty()
        {
            warn("wikiUserName is set without wikiPassword".into());
        }

        warnings
    }
}

/// First existing config file: `explicit`, else `cwd`, else `home`.
/// An explicit path is returned even when it does not exist, so the caller
/// reports that exact path.
pub fn locate(explicit: Option<&Path>, cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    std::iter::once(cwd)
        .chain(home)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = "tfsBaseAddress: https://tfs.example.com/tfs/Main\n";

    fn write(dir: &Path, name: &str, data: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), ".tasker.yaml", MINIMAL);
        let cfg = Config::load_with_env(&path, |_| None).unwrap();
        assert_eq!(cfg.tfs_parent_work_item_type, "Requirement");
        assert_eq!(cfg.tfs_requirement_type, "Functional");
        assert_eq!(cfg.tfs_value_area, "Architectural");
        assert_eq!(cfg.sync_default_tags, vec!["разработка"]);
        assert_eq!(cfg.tech_debt_kind(), WorkItemKind::Task);
        assert!(!cfg.tfs_search_past_iterations);
    }

    #[test]
    fn camel_case_keys_are_read() {
        let dir = TempDir::new().unwrap();
        let yaml = "tfsBaseAddress: https://tfs\ntfsProject: Main\ntfsTeam: Core\n\
                    tfsSearchPastIterations: true\ntechDebtItemKind: requirement\n\
                    wikiBaseAddress: https://wiki\nwikiAccessToken: abc\n";
        let path = write(dir.path(), ".tasker.yaml", yaml);
        let cfg = Config::load_with_env(&path, |_| None).unwrap();
        assert_eq!(cfg.tfs_project, "Main");
        assert!(cfg.tfs_search_past_iterations);
        assert_eq!(cfg.tech_debt_kind(), WorkItemKind::Requirement);
        assert_eq!(cfg.wiki_auth(), WikiAuth::Bearer("abc".into()));
    }

    #[test]
    fn missing_file_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_with_env(&dir.path().join("nope.yaml"), |_| None).unwrap_err();
        assert!(matches!(err, TaskerError::NotConfigured));
    }

    #[test]
    fn missing_base_address_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), ".tasker.yaml", "tfsProject: Main\n");
        let err = Config::load_with_env(&path, |_| None).unwrap_err();
        assert!(matches!(err, TaskerError::Config(_)));
    }

    #[test]
    fn env_overrides_secrets() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), ".tasker.yaml", MINIMAL);
        let cfg = Config::load_with_env(&path, |key| match key {
            "TASKER_WIKI_USER_NAME" => Some("jdoe".into()),
            "TASKER_WIKI_PASSWORD" => Some("pw".into()),
            "TASKER_TFS_ACCESS_TOKEN" => Some("pat".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.tfs_access_token, "pat");
        assert_eq!(
            cfg.wiki_auth(),
            WikiAuth::Basic {
                user: "jdoe".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn redaction_masks_only_secrets() {
        let mut cfg = Config::new("https://tfs");
        cfg.tfs_access_token = "pat".into();
        cfg.wiki_password = "pw".into();
        let shown = cfg.redacted();
        assert_eq!(shown.tfs_access_token, REDACTED);
        assert_eq!(shown.wiki_password, REDACTED);
        assert_eq!(shown.wiki_access_token, "");
        assert_eq!(shown.tfs_base_address, "https://tfs");
    }

    #[test]
    fn validate_reports_gaps() {
        let cfg = Config::new("https://tfs");
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("tfsProject")));
        assert!(warnings.iter().any(|w| w.message.contains("wikiBaseAddress")));

        let mut full = Config::new("https://tfs");
        full.tfs_project = "Main".into();
        full.tfs_team = "Core".into();
        full.wiki_base_address = "https://wiki".into();
        full.wiki_access_token = "t".into();
        assert!(full.validate().is_empty());
    }

    #[test]
    fn locate_prefers_cwd_over_home() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let home_cfg = write(home.path(), ".tasker.yaml", MINIMAL);
        assert_eq!(locate(None, cwd.path(), Some(home.path())), Some(home_cfg));

        let cwd_cfg = write(cwd.path(), ".tasker.yml", MINIMAL);
        assert_eq!(locate(None, cwd.path(), Some(home.path())), Some(cwd_cfg));

        let explicit = cwd.path().join("custom.yaml");
        assert_eq!(
            locate(Some(&explicit), cwd.path(), None),
            Some(explicit.clone())
        );
        assert_eq!(locate(None, TempDir::new().unwrap().path(), None), None);
    }
}
