//! Command handlers: bridge CLI args -> client calls -> stdout.

pub mod config_cmd;
pub mod status;
pub mod tail;
