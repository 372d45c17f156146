//! ember run command

use crate::app::{App, Sources};
use clap::Args;
use console::style;
use engine::{register_default_jobs, Scheduler};
use std::time::Duration;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
}

impl RunCommand {
    pub async fn run(&self, sources: &Sources, json: bool) -> anyhow::Result<()> {
        let app = App::build(sources)?;
        let scheduler = Scheduler::new(app.config.scheduler.history_limit);
        register_default_jobs(&scheduler, &app.config, app.engine.clone());

        scheduler.start();
        println!(
            "{} scheduler running with jobs: {}",
            style("●").green(),
            scheduler.job_names().join(", ")
        );

        match self.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => tokio::signal::ctrl_c().await?,
        }

        tracing::info!("Shutting down");
        app.engine.shutdown();
        scheduler.stop().await;

        let status = scheduler.status();
        let stats = app.traces.stats();
        if json {
            let summary = serde_json::json!({ "scheduler": status, "traces": stats });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!(
                "{} job runs, {} workflow runs ({} succeeded, {} failed)",
                status.job_history.len(),
                stats.total,
                stats.succeeded,
                stats.failed
            );
        }
        Ok(())
    }
}
