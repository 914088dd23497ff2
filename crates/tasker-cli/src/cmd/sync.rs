use crate::cmd::Globals;
use crate::output::print_report;
use clap::Args;
use tasker_core::sync::{SyncEngine, SyncOptions};
use tasker_core::task::{union_tags, SyncMode, TitleOptions};
use tasker_core::tracker::ParentSelector;

#[derive(Args)]
pub struct SyncArgs {
    /// Wiki page id
    pub page_id: String,

    /// Parent work item id (default: first number in the page title)
    #[arg(short = 'f', long = "feature", conflicts_with = "pattern")]
    pub feature: Option<i64>,

    /// Find the parent by title words in the current iterations
    #[arg(long)]
    pub pattern: Option<String>,

    /// Only create work items for rows without one
    #[arg(long, conflicts_with = "update_only")]
    pub create_only: bool,

    /// Only update rows already linked to a work item
    #[arg(long)]
    pub update_only: bool,

    /// Text put in front of every title
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Do not number titles
    #[arg(long)]
    pub no_auto_prefix: bool,

    /// Extra tag for every task (repeatable, comma separated)
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Only this task table (1-based)
    #[arg(short = 'p', long)]
    pub part: Option<usize>,

    /// Prepend "[tag]" to titles for every tag
    #[arg(long)]
    pub append_tags_to_title: bool,
}

impl SyncArgs {
    fn options(self, default_tags: &[String]) -> SyncOptions {
        let parent = match (self.feature, self.pattern) {
            (Some(id), _) => Some(ParentSelector::Id(id)),
            (None, Some(pattern)) => Some(ParentSelector::Pattern(pattern)),
            (None, None) => None,
        };
        SyncOptions {
            parent,
            mode: SyncMode::from_flags(self.create_only, self.update_only),
            titles: TitleOptions {
                auto_prefix: !self.no_auto_prefix,
                custom_prefix: self.prefix,
                tags_in_title: self.append_tags_to_title,
            },
            tags: union_tags(default_tags, &self.tags),
            part: self.part,
        }
    }
}

pub async fn run(globals: &Globals, args: SyncArgs) -> anyhow::Result<()> {
    let cfg = globals.load_config()?;
    let session = globals.session(&cfg)?;
    let page_id = args.page_id.clone();
    let opts = args.options(&cfg.sync_default_tags);
    tracing::debug!(page_id = %page_id, ?opts, "sync");

    let report = SyncEngine::new(&session).sync_page(&page_id, &opts).await?;
    print_report(&report, globals.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: SyncArgs,
    }

    fn parse(argv: &[&str]) -> SyncOptions {
        let mut full = vec!["sync"];
        full.extend_from_slice(argv);
        Wrapper::parse_from(full).args.options(&["разработка".to_string()])
    }

    #[test]
    fn defaults_number_titles_and_take_parent_from_title() {
        let opts = parse(&["100"]);
        assert_eq!(opts.parent, None);
        assert_eq!(opts.mode, SyncMode::Both);
        assert!(opts.titles.auto_prefix);
        assert_eq!(opts.tags, vec!["разработка"]);
    }

    #[test]
    fn flags_map_onto_options() {
        let opts = parse(&[
            "100", "-f", "71500", "--create-only", "--no-auto-prefix", "-t", "a,b", "-p", "2",
        ]);
        assert_eq!(opts.parent, Some(ParentSelector::Id(71500)));
        assert_eq!(opts.mode, SyncMode::CreateOnly);
        assert!(!opts.titles.auto_prefix);
        assert_eq!(opts.tags, vec!["разработка", "a", "b"]);
        assert_eq!(opts.part, Some(2));
    }

    #[test]
    fn create_and_update_only_conflict() {
        let parsed = Wrapper::try_parse_from(["sync", "100", "--create-only", "--update-only"]);
        assert!(parsed.is_err());
    }
}
