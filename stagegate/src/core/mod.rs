//! Deterministic, pure logic shared by the stagegate commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod gate;
pub mod invariants;
pub mod template;
pub mod transition;
pub mod types;
