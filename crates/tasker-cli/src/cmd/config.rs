use crate::cmd::Globals;
use crate::output::print_json;
use clap::Subcommand;
use tasker_core::config::{ConfigWarning, WarnLevel};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the resolved configuration with secrets masked
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(globals: &Globals, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(globals),
        ConfigSubcommand::Validate => validate(globals),
    }
}

fn print_warnings(warnings: &[ConfigWarning]) {
    for w in warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("[{prefix}] {}", w.message);
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(globals: &Globals) -> anyhow::Result<()> {
    let path = globals.config_path()?;
    let config = globals.load_config()?;
    let warnings = config.validate();
    let redacted = config.redacted();

    if globals.json {
        let value = serde_json::json!({
            "path": path,
            "config": redacted,
            "warnings": warnings,
        });
        return print_json(&value);
    }

    println!("# {}", path.display());
    print!("{}", serde_yaml::to_string(&redacted)?);
    print_warnings(&warnings);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let warnings = config.validate();

    if globals.json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        print_warnings(&warnings);
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
