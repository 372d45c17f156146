//! # Ember Shared
//!
//! Common types used across all Ember crates: identifiers, triggers,
//! the action catalog, data categories, the error taxonomy and the
//! engine configuration.

pub mod action;
pub mod config;
pub mod data;
pub mod error;
pub mod ids;
pub mod trigger;

// Re-exports
pub use action::*;
pub use config::*;
pub use data::*;
pub use error::*;
pub use ids::*;
pub use trigger::*;
