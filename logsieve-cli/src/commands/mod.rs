//! Command handlers -- one module per subcommand

pub mod clear;
pub mod config;
pub mod rules;
pub mod show;
