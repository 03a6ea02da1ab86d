//! Stable exit codes for stagegate CLI commands.
//!
//! `2` is left to clap for usage errors such as unknown flags.

/// Command succeeded, including steps that allow or block.
pub const OK: i32 = 0;
/// Invalid input, an initialization conflict, or an I/O failure.
pub const INVALID: i32 = 1;
/// The run state document is corrupted; the run must be reinitialized.
pub const HALTED: i32 = 3;
