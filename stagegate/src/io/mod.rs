//! I/O helpers for stagegate commands.

pub mod config;
pub mod hook;
pub mod init;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod run_state;
