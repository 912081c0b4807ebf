//! Command handlers: bridge CLI args -> core types -> output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod watch;
