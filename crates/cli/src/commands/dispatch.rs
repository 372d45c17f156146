//! ember dispatch command

use crate::app::{App, Sources};
use clap::Args;
use console::style;
use engine::RunReport;
use gateway::{OracleDecision, ReasoningOracle, ScriptedOracle};
use shared::{ActorId, EntityId, Trigger};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct DispatchCommand {
    /// Trigger to fire, e.g. `event:message_received`
    pub trigger: Trigger,

    /// Actor the run is for
    #[arg(short, long)]
    pub actor: String,

    /// Entity that caused the trigger (message, post or invite id)
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Scripted decision as JSON, used instead of the configured oracle.
    /// Repeat for multi-iteration runs.
    #[arg(long = "decide", value_name = "JSON")]
    pub decisions: Vec<String>,
}

impl DispatchCommand {
    pub async fn run(&self, sources: &Sources, json: bool) -> anyhow::Result<()> {
        let oracle = self.scripted_oracle()?;
        let app = App::build_with_oracle(sources, oracle)?;

        let report = app
            .engine
            .dispatch(
                self.trigger.clone(),
                ActorId::new(&self.actor),
                self.subject.as_deref().map(EntityId::new),
            )
            .await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }

    fn scripted_oracle(&self) -> anyhow::Result<Option<Arc<dyn ReasoningOracle>>> {
        if self.decisions.is_empty() {
            return Ok(None);
        }
        let oracle = ScriptedOracle::new();
        for raw in &self.decisions {
            let decision: OracleDecision = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Invalid --decide payload '{}': {}", raw, e))?;
            oracle.push(decision);
        }
        Ok(Some(Arc::new(oracle)))
    }
}

fn print_report(report: &RunReport) {
    let status = if report.success() {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!("{} {}", status, report.summary());
    println!("  run:        {}", report.run_id);
    println!("  iterations: {}", report.iterations);
    println!("  duration:   {}ms", report.duration_ms);

    for record in &report.decisions {
        println!("  [{}] {} {:?}", record.iteration, record.decision, record.outcome);
    }
    for error in &report.errors {
        println!("  {} {}: {}", style("error").red(), error.code(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::events;

    fn command(decisions: Vec<&str>) -> DispatchCommand {
        DispatchCommand {
            trigger: Trigger::event(events::MESSAGE_RECEIVED),
            actor: "npc-mira".to_string(),
            subject: Some("msg-1".to_string()),
            decisions: decisions.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn test_no_decisions_uses_configured_oracle() {
        assert!(command(vec![]).scripted_oracle().unwrap().is_none());
    }

    #[test]
    fn test_bad_decision_json_is_rejected() {
        let err = command(vec!["{not json"]).scripted_oracle().err().unwrap();
        assert!(err.to_string().contains("Invalid --decide payload"));
    }

    #[tokio::test]
    async fn test_dispatch_with_scripted_reply() {
        let cmd = command(vec![
            r#"{"action": "REPLY", "targetId": "msg-1", "parameters": {"content": "Aye"}}"#,
        ]);
        assert!(cmd.run(&Sources::default(), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_trigger_is_an_error() {
        let mut cmd = command(vec![]);
        cmd.trigger = Trigger::event("earthquake");
        assert!(cmd.run(&Sources::default(), true).await.is_err());
    }
}
