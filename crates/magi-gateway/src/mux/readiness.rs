//! Debugger-readiness wait.
//!
//! A freshly created page is not immediately ready to accept debugger
//! commands. The first session on a page waits through three phases
//! before its binding dispatches anything: a short settle delay, then -
//! when a load is in flight - load completion (or failure), bounded by a
//! total timeout, then a final settle delay. On timeout the attach
//! proceeds anyway; the debugger either works or returns a normal CDP
//! error.

use std::time::Duration;

use magi_fleet::{PageEvent, PageHandle, Surface};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

/// Tuning for the readiness wait.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Settle delay before the loading check.
    pub initial_settle: Duration,
    /// Upper bound on the whole wait.
    pub total_timeout: Duration,
    /// Settle delay after load completion.
    pub final_settle: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_settle: Duration::from_millis(100),
            total_timeout: Duration::from_secs(10),
            final_settle: Duration::from_millis(50),
        }
    }
}

impl ReadinessConfig {
    /// A near-zero-wait tuning for tests.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial_settle: Duration::from_millis(1),
            total_timeout: Duration::from_millis(250),
            final_settle: Duration::from_millis(1),
        }
    }
}

/// Observed page phase during the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyPhase {
    Fresh,
    Loading,
    Idle,
}

/// Wait until the page is ready for debugger commands, bounded by
/// `config.total_timeout`. Never fails; a timeout degrades to proceeding.
pub(crate) async fn await_page_ready(
    surface: &dyn Surface,
    page: PageHandle,
    config: &ReadinessConfig,
) {
    let deadline = Instant::now() + config.total_timeout;

    sleep(clamp_to(config.initial_settle, deadline)).await;

    // Subscribe before sampling so a load finishing in between is not missed.
    let events = surface.page_events(page).ok();
    let loading = match surface.page_state(page).await {
        Ok(state) => state.loading,
        Err(err) => {
            debug!(error = %err, "page state poll failed during readiness wait");
            false
        }
    };
    let mut phase = if loading {
        ReadyPhase::Loading
    } else {
        ReadyPhase::Fresh
    };

    if phase == ReadyPhase::Loading {
        if let Some(mut events) = events {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let settled = timeout(remaining, async {
                loop {
                    match events.recv().await {
                        Ok(
                            PageEvent::LoadFinished
                            | PageEvent::LoadFailed { .. }
                            | PageEvent::Closed,
                        ) => break,
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    }
                }
            })
            .await;
            if settled.is_err() {
                warn!(page = page.raw(), "readiness wait timed out, attaching anyway");
            }
        }
    }

    phase = ReadyPhase::Idle;
    debug!(page = page.raw(), ?phase, "page ready for debugger");
    sleep(clamp_to(config.final_settle, deadline)).await;
}

fn clamp_to(wanted: Duration, deadline: Instant) -> Duration {
    wanted.min(deadline.saturating_duration_since(Instant::now()))
}
