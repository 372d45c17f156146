//! ember config command

use crate::app::{load_config, Sources};
use clap::{Args, Subcommand};
use console::style;

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the configuration
    Check,
    /// Print the effective configuration
    Show,
}

impl ConfigCommand {
    pub fn run(&self, sources: &Sources) -> anyhow::Result<()> {
        let config = load_config(sources.config.as_deref())?;
        match &self.command {
            ConfigSubcommand::Check => {
                println!("{} configuration is valid", style("✓").green());
            }
            ConfigSubcommand::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        Ok(())
    }
}
