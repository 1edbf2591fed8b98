//! Completion handling: side effects, then the (possibly delayed) advance

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    services::DispatchOutcome,
    state::{AppState, CompletionReport},
};

/// Dispatch the side effects of an already claimed completion and advance.
///
/// With auto-start the advance waits `advance_delay` in `finished`; any
/// control operation in that window wins and the advance is dropped. The
/// side effects run either way.
pub async fn finish_completion(state: Arc<AppState>, report: CompletionReport) -> DispatchOutcome {
    let outcome = state.dispatch_completion(&report);
    if !outcome.failures.is_empty() {
        warn!(failures = outcome.failures.len(), "completion finished with failed steps");
    }

    if report.auto_start {
        debug!(delay = ?state.options.advance_delay, "delaying auto-start");
        sleep(state.options.advance_delay).await;
    }

    match state.advance_after_completion(report.epoch) {
        Some(snapshot) => info!(phase = %snapshot.phase, lifecycle = %snapshot.lifecycle, "advanced after completion"),
        None => debug!("advance cancelled by a newer control operation"),
    }
    outcome
}

/// Claim a pending completion and finish it.
///
/// Returns `None` when there is nothing to claim, e.g. the ticker already
/// claimed it.
pub async fn run_completion(state: Arc<AppState>) -> Option<DispatchOutcome> {
    let report = state.claim_completion()?;
    Some(finish_completion(state, report).await)
}

/// Finish whatever a previous run left in the `finished` state.
///
/// An unclaimed completion is dispatched now. One that was claimed before
/// the process stopped only needs its advance.
pub async fn resume_after_restart(state: Arc<AppState>) {
    if let Some(epoch) = state.claimed_finish_epoch() {
        info!("Resuming advance of an already dispatched completion");
        state.advance_after_completion(epoch);
        return;
    }
    if run_completion(Arc::clone(&state)).await.is_some() {
        info!("Dispatched completion that finished while stopped");
    }
}
