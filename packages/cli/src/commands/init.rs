use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use arbor_editor::TieBreak;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Actor id of the local replica
    #[arg(short, long, default_value = "local")]
    pub actor: String,

    /// Let the higher actor id win ties instead of the lower one
    #[arg(long)]
    pub higher_wins: bool,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = build_config(&args);
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("Next steps:");
    println!("  {} arbor apply doc.json deltas.json", "$".bright_black());
    println!("  {} arbor converge doc.json a.json b.json", "$".bright_black());

    Ok(())
}

fn build_config(args: &InitArgs) -> Config {
    let mut config = Config::default();
    config.session.actor_id = args.actor.clone();
    if args.higher_wins {
        config.session.tie_break = TieBreak::HigherActorWins;
    }
    config
}
