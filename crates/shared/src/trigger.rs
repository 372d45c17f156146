//! Triggers - what caused a workflow run

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Well-known event trigger names
pub mod events {
    pub const MESSAGE_RECEIVED: &str = "message_received";
    pub const POST_CREATED: &str = "post_created";
    pub const GROUP_INVITE: &str = "group_invite";
}

/// Well-known schedule trigger names
pub mod schedules {
    pub const AGENT_CYCLE: &str = "agent_cycle";
}

/// The two kinds of trigger sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Event,
    Schedule,
}

impl core::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TriggerType::Event => write!(f, "event"),
            TriggerType::Schedule => write!(f, "schedule"),
        }
    }
}

/// Cause of a workflow run. Immutable once created.
///
/// Serialized as `{"type": "event", "name": "message_received"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    Event { name: String },
    Schedule { name: String },
}

impl Trigger {
    pub fn event(name: impl Into<String>) -> Self {
        Trigger::Event { name: name.into() }
    }

    pub fn schedule(name: impl Into<String>) -> Self {
        Trigger::Schedule { name: name.into() }
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Trigger::Event { .. } => TriggerType::Event,
            Trigger::Schedule { .. } => TriggerType::Schedule,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Trigger::Event { name } | Trigger::Schedule { name } => name,
        }
    }

    /// Registry lookup key
    pub fn key(&self) -> TriggerKey {
        TriggerKey::new(self.trigger_type(), self.name())
    }
}

impl core::fmt::Display for Trigger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.trigger_type(), self.name())
    }
}

impl FromStr for Trigger {
    type Err = String;

    /// Parse `event:<name>` or `schedule:<name>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid trigger '{}': expected '<event|schedule>:<name>'", s))?;

        if name.is_empty() {
            return Err(format!("Invalid trigger '{}': empty name", s));
        }

        match kind {
            "event" => Ok(Trigger::event(name)),
            "schedule" => Ok(Trigger::schedule(name)),
            other => Err(format!("Invalid trigger type '{}'", other)),
        }
    }
}

/// `(type, name)` pair used to look up workflow handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerKey {
    pub trigger_type: TriggerType,
    pub name: String,
}

impl TriggerKey {
    pub fn new(trigger_type: TriggerType, name: impl Into<String>) -> Self {
        Self {
            trigger_type,
            name: name.into(),
        }
    }
}

impl core::fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.trigger_type, self.name)
    }
}
