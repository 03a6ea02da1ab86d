//! `stagegate cancel`: discard the current run.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::io::init::GatePaths;
use crate::io::run_state::{load_run_state_if_present, remove_run_state};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// There was no state document.
    NothingToCancel,
    /// The state document was deleted. `stage` is `None` when it was unreadable.
    Cancelled { stage: Option<String> },
}

/// Delete the run state for `root`. Templates and config stay in place.
///
/// A corrupted document is still deleted; cancelling is one way out of it.
pub fn cancel_run(root: &Path) -> Result<CancelOutcome> {
    let paths = GatePaths::new(root);
    let stage = match load_run_state_if_present(&paths.run_state_path) {
        Ok(None) => return Ok(CancelOutcome::NothingToCancel),
        Ok(Some(state)) => Some(state.active_stage),
        Err(err) if err.is_corruption() => {
            warn!(err = %err.detail(), "discarding corrupted run state");
            None
        }
        Err(err) => return Err(err.into()),
    };
    if !remove_run_state(&paths.run_state_path)? {
        return Ok(CancelOutcome::NothingToCancel);
    }
    info!(stage = stage.as_deref().unwrap_or("unknown"), "run cancelled");
    Ok(CancelOutcome::Cancelled { stage })
}
