//! Application layer: CLI parsing, configuration and startup wiring

pub mod cli;
pub mod config;
pub mod startup;
