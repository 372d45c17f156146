//! CLI Commands

pub mod config;
pub mod dispatch;
pub mod job;
pub mod run;

pub use config::ConfigCommand;
pub use dispatch::DispatchCommand;
pub use job::JobCommand;
pub use run::RunCommand;
