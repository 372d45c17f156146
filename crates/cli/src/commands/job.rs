//! ember job command

use crate::app::{App, Sources};
use clap::{Args, Subcommand};
use console::style;
use engine::{register_default_jobs, Scheduler};

#[derive(Debug, Args)]
pub struct JobCommand {
    #[command(subcommand)]
    pub command: JobSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum JobSubcommand {
    /// List the configured jobs
    List,
    /// Run a job once, now
    Trigger {
        /// Job name
        name: String,
    },
}

impl JobCommand {
    pub async fn run(&self, sources: &Sources, json: bool) -> anyhow::Result<()> {
        let app = App::build(sources)?;
        let scheduler = Scheduler::new(app.config.scheduler.history_limit);
        register_default_jobs(&scheduler, &app.config, app.engine.clone());

        match &self.command {
            JobSubcommand::List => {
                let status = scheduler.status();
                if json {
                    println!("{}", serde_json::to_string_pretty(&status.active_jobs)?);
                    return Ok(());
                }
                for job in status.active_jobs {
                    let state = if job.enabled {
                        style("enabled").green()
                    } else {
                        style("paused").yellow()
                    };
                    println!("{:<20} every {:>6}s  {}", job.name, job.cadence_secs, state);
                }
            }
            JobSubcommand::Trigger { name } => {
                let run = scheduler.trigger_job(name).await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&run)?);
                } else if run.success {
                    println!("{} {}: {}", style("✓").green(), run.job_name, run.summary);
                } else {
                    println!("{} {}: {}", style("✗").red(), run.job_name, run.summary);
                }
                if !run.success {
                    anyhow::bail!("job '{}' failed", run.job_name);
                }
            }
        }
        Ok(())
    }
}
