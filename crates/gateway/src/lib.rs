//! # Ember Gateway
//!
//! Ports to the collaborators the engine calls but does not own:
//! the persistence service (reads and mutations) and the reasoning oracle.
//!
//! ## Adapters
//!
//! - [`HttpOracle`]: JSON-over-HTTP reasoning oracle client
//! - [`InMemoryWorld`]: in-process data service and mutator, seeded from YAML
//! - [`ScriptedOracle`]: queued decisions for tests and local runs

mod data_service;
mod http_oracle;
mod mutator;
mod oracle;
mod scripted;
mod world;

pub use data_service::{ActorProfile, DataService};
pub use http_oracle::HttpOracle;
pub use mutator::{MutationOutcome, Mutator};
pub use oracle::{OracleDecision, OracleRequest, ReasoningOracle};
pub use scripted::ScriptedOracle;
pub use world::{
    CommentRecord, GroupRecord, InMemoryWorld, InviteRecord, MemoryRecord, MessageRecord,
    PostRecord, ReactionRecord, RelationshipRecord, TerritoryRecord, WorldSeed,
};
