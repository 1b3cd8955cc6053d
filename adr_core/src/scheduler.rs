//! Fixed-period cycle scheduler with work compensation.
//!
//! Each cycle's instrument I/O takes a variable slice of the period; the
//! scheduler sleeps only for the remainder so the cycle cadence stays near
//! the configured period instead of drifting by the work time every tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use adr_traits::clock::Clock;

use crate::error::Result;
use crate::status::{Completion, CycleStatus};
use crate::util::compensated_delay;

/// Cooperative cancellation handle, cloneable across threads. A ctrl-c
/// handler flips it; the scheduler observes it between cycles.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a scheduled run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Completion),
    Cancelled,
}

pub struct CycleScheduler {
    period: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl CycleScheduler {
    pub fn new(period: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { period, clock }
    }

    /// Drive `tick` once per period until it reports completion, it fails,
    /// or `cancel` fires. Cancellation is checked before each tick, so a
    /// cancelled run never issues another instrument command.
    pub fn run<F>(&self, cancel: &CancelToken, mut tick: F) -> Result<RunOutcome>
    where
        F: FnMut() -> Result<CycleStatus>,
    {
        loop {
            if cancel.is_cancelled() {
                tracing::info!("cycle run cancelled");
                return Ok(RunOutcome::Cancelled);
            }
            let started = self.clock.now();
            match tick()? {
                CycleStatus::Complete(c) => return Ok(RunOutcome::Completed(c)),
                CycleStatus::Idle => return Ok(RunOutcome::Cancelled),
                CycleStatus::Running => {}
            }
            let work = self.clock.now().saturating_duration_since(started);
            if work > self.period {
                tracing::warn!(
                    work_ms = work.as_millis() as u64,
                    period_ms = self.period.as_millis() as u64,
                    "cycle overran its period"
                );
            }
            self.clock.sleep(compensated_delay(self.period, work));
        }
    }
}
