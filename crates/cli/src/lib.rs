//! Ember CLI library: command definitions and engine wiring

pub mod app;
pub mod commands;
