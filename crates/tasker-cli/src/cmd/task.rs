use crate::cmd::Globals;
use crate::output::print_json;
use clap::{Args, Subcommand};
use tasker_core::config::Config;
use tasker_core::sync::{create_bugfix_task, create_single_task};
use tasker_core::tracker::{Draft, ParentSelector};
use tasker_core::types::WorkItem;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a task in the current sprint
    Create {
        title: String,

        description: Option<String>,

        #[command(flatten)]
        flags: TaskFlags,
    },

    /// Create a task for fixing a bug, linked to the bug
    Bugfix {
        bug_id: i64,

        description: Option<String>,

        #[command(flatten)]
        flags: TaskFlags,
    },
}

#[derive(Args)]
pub struct TaskFlags {
    /// Original estimate in person-hours
    #[arg(short = 'e', long)]
    pub estimate: f32,

    /// Parent work item id (default: search by the configured name pattern)
    #[arg(short = 'p', long)]
    pub parent: Option<i64>,

    /// Task tag (repeatable, comma separated)
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Leave the task unassigned
    #[arg(short = 'u', long)]
    pub unassigned: bool,

    /// Open the created task in the browser
    #[arg(short = 'o', long)]
    pub open: bool,

    /// Overrides tfsProject
    #[arg(long)]
    pub project: Option<String>,

    /// Overrides tfsTeam
    #[arg(long)]
    pub team: Option<String>,

    /// Overrides tfsDiscipline
    #[arg(long)]
    pub discipline: Option<String>,

    /// Overrides tfsUserFilter
    #[arg(long)]
    pub user: Option<String>,
}

impl TaskFlags {
    fn apply(&self, cfg: &mut Config) {
        let overrides = [
            (&self.project, &mut cfg.tfs_project),
            (&self.team, &mut cfg.tfs_team),
            (&self.discipline, &mut cfg.tfs_discipline),
            (&self.user, &mut cfg.tfs_user_filter),
        ];
        for (flag, slot) in overrides {
            if let Some(value) = flag {
                *slot = value.clone();
            }
        }
    }

    fn parent(&self, pattern: &str) -> ParentSelector {
        match self.parent {
            Some(id) => ParentSelector::Id(id),
            None => ParentSelector::Pattern(pattern.to_string()),
        }
    }

    fn draft(&self, title: String, description: Option<String>) -> Draft {
        Draft {
            title,
            description: description.unwrap_or_default(),
            estimate: self.estimate,
            tags: self.tags.clone(),
            priority: None,
        }
    }
}

pub async fn run(globals: &Globals, subcmd: TaskSubcommand) -> anyhow::Result<()> {
    let mut cfg = globals.load_config()?;

    let (item, flags) = match subcmd {
        TaskSubcommand::Create {
            title,
            description,
            flags,
        } => {
            flags.apply(&mut cfg);
            let session = globals.session(&cfg)?;
            let parent = flags.parent(&cfg.tfs_common_user_story_name_pattern);
            let draft = flags.draft(title, description);
            let item = create_single_task(&session, &draft, &parent, !flags.unassigned).await?;
            (item, flags)
        }
        TaskSubcommand::Bugfix {
            bug_id,
            description,
            flags,
        } => {
            flags.apply(&mut cfg);
            let session = globals.session(&cfg)?;
            let parent = flags.parent(&cfg.tfs_bugfix_user_story_name_pattern);
            let draft = flags.draft(String::new(), description);
            let item = create_bugfix_task(
                &session,
                bug_id,
                &cfg.tfs_bug_title_template,
                draft,
                &parent,
                !flags.unassigned,
            )
            .await?;
            (item, flags)
        }
    };

    report(&item, globals.json)?;
    if flags.open {
        if let Err(e) = open::that(item.browser_url()) {
            tracing::warn!(error = %e, "failed to open browser");
        }
    }
    Ok(())
}

fn report(item: &WorkItem, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(item);
    }
    println!("{}", item.browser_url());
    Ok(())
}
