//! Stage-gated workflow orchestrator.
//!
//! A run walks a frozen, ordered plan of stages. Each `step` invocation is a
//! fresh process that reloads the persisted run state, gates the active stage
//! on an observable exit condition, and either loops, advances, or finishes
//! before writing the state back. The crate enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, invariants, transitions).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (state store, probes, templates,
//!   hook codec). Probes never fail; state I/O always propagates.
//!
//! Orchestration modules ([`step`], [`start`], [`status`], [`cancel`]) coordinate
//! core logic with I/O to implement CLI commands.

pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod start;
pub mod status;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
