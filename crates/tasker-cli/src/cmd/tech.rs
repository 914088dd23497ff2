use crate::cmd::Globals;
use crate::output::print_report;
use clap::Subcommand;
use tasker_core::tech_debt::{DebtSource, TechDebtFlow, TechDebtOptions};

#[derive(Subcommand)]
pub enum TechSubcommand {
    /// Create tracker items for tech-debt pages and link them back
    Sync {
        /// Parent requirement of the created items
        #[arg(short = 'r', long = "requirement")]
        requirement: i64,

        /// Take every child of this page
        #[arg(
            short = 'p',
            long = "parent-page",
            conflicts_with = "debt_pages",
            required_unless_present = "debt_pages"
        )]
        parent_page: Option<String>,

        /// Individual debt page (repeatable)
        #[arg(short = 'd', long = "debt-page")]
        debt_pages: Vec<String>,

        /// Create items even for pages that already link one
        #[arg(long)]
        force: bool,
    },

    /// Move children whose work items are all closed under the archive page
    Archive {
        #[arg(short = 'p', long = "parent-page")]
        parent_page: String,

        #[arg(short = 'a', long = "archive-page")]
        archive_page: String,
    },
}

pub async fn run(globals: &Globals, subcmd: TechSubcommand) -> anyhow::Result<()> {
    let cfg = globals.load_config()?;
    let session = globals.session(&cfg)?;
    let flow = TechDebtFlow::new(&session);

    let report = match subcmd {
        TechSubcommand::Sync {
            requirement,
            parent_page,
            debt_pages,
            force,
        } => {
            let source = match parent_page {
                Some(parent) => DebtSource::Parent(parent),
                None => DebtSource::Pages(debt_pages),
            };
            let opts = TechDebtOptions {
                source,
                requirement_id: requirement,
                force,
                tags: cfg.tech_debt_tags.clone(),
                kind: cfg.tech_debt_kind(),
            };
            flow.sync(&opts).await?
        }
        TechSubcommand::Archive {
            parent_page,
            archive_page,
        } => flow.archive(&parent_page, &archive_page).await?,
    };
    print_report(&report, globals.json)
}
