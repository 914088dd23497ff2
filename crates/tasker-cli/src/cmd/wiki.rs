use crate::cmd::Globals;
use crate::output::{print_json, print_report};
use anyhow::Context;
use clap::Subcommand;
use std::path::PathBuf;
use tasker_core::wiki::{Upload, WikiOps};

#[derive(Subcommand)]
pub enum WikiSubcommand {
    /// Move pages under a new parent (ids or titles)
    Move {
        #[arg(required = true, num_args = 1..)]
        pages: Vec<String>,

        /// New parent page
        target: String,
    },

    /// Replace a page's content with a file
    Upload {
        /// Page id or title
        page: String,

        file: PathBuf,

        /// Store the file through the markdown macro
        #[arg(long)]
        markdown: bool,

        /// Prepend a table of contents down to this heading level
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=6))]
        toc: Option<u8>,
    },
}

pub async fn run(globals: &Globals, subcmd: WikiSubcommand) -> anyhow::Result<()> {
    let cfg = globals.load_config()?;
    let session = globals.session(&cfg)?;
    let ops = WikiOps::new(&session, cfg.wiki_space_key.clone());

    match subcmd {
        WikiSubcommand::Move { pages, target } => {
            let report = ops.move_pages(&pages, &target).await?;
            print_report(&report, globals.json)
        }
        WikiSubcommand::Upload {
            page,
            file,
            markdown,
            toc,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let upload = Upload {
                content,
                markdown,
                toc,
            };
            let version = ops.upload(&page, &upload).await?;
            if globals.json {
                print_json(&serde_json::json!({ "page": page, "version": version }))?;
            } else {
                println!("{page}: version {version}");
            }
            Ok(())
        }
    }
}
