//! Background temperature monitor.
//!
//! Spawns a thread that owns the stage thermometer, walks the bridge
//! multiplexer according to the channel policy, pushes the latest stage
//! temperatures via a bounded channel, and tracks the last-ok timestamp for
//! watchdog logic.
//!
//! The bridge channels cannot be read back to back: after a channel switch
//! the AC bridge filter needs `settle_factor` time constants before its
//! reading means anything, so the monitor only samples a bridge channel once
//! that window has elapsed, then moves the multiplexer on.
//!
//! Safety: each `TelemetryMonitor` spawns exactly one thread that is shut
//! down when the monitor is dropped, preventing thread leaks.

use crossbeam_channel as xch;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use adr_config::ChannelPolicy;
use adr_traits::clock::Clock;
use adr_traits::{StageChannel, StageThermometer};

use crate::config::FaultSentinels;
use crate::record::TempRecord;

/// One pass over the four stages. Bridge channels the policy excludes, or
/// that returned a fault code, are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTemps {
    pub elapsed_s: f64,
    pub stage_60k: Option<f64>,
    pub stage_3k: Option<f64>,
    pub ggg_k: Option<f64>,
    pub faa_k: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MonitorCfg {
    pub policy: ChannelPolicy,
    pub settle_factor: f64,
    pub period: Duration,
    pub io: Duration,
    pub sentinels: FaultSentinels,
}

pub struct TelemetryMonitor {
    rx: xch::Receiver<StageTemps>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryMonitor {
    pub fn spawn<T, C, W>(
        mut thermometer: T,
        cfg: MonitorCfg,
        clock: C,
        mut record: Option<TempRecord<W>>,
    ) -> Self
    where
        T: StageThermometer + Send + 'static,
        C: Clock + Send + Sync + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            // Bridge readings persist between passes; a channel that is not
            // settled this pass keeps its previous value.
            let mut ggg_k: Option<f64> = None;
            let mut faa_k: Option<f64> = None;
            if let Some(first) = first_channel(cfg.policy)
                && let Err(e) = thermometer.select(first, cfg.io)
            {
                tracing::debug!(error = %e, "initial bridge channel select failed");
            }
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("monitor thread received shutdown signal");
                    break;
                }

                let stage_60k = read_diode(&mut thermometer, StageChannel::Stage60K, cfg.io);
                let stage_3k = read_diode(&mut thermometer, StageChannel::Stage3K, cfg.io);
                sample_bridge(&mut thermometer, &cfg, &mut ggg_k, &mut faa_k);

                let temps = StageTemps {
                    elapsed_s: clock.secs_since(epoch),
                    stage_60k,
                    stage_3k,
                    ggg_k: if wants_ggg(cfg.policy) { ggg_k } else { None },
                    faa_k: if wants_faa(cfg.policy) { faa_k } else { None },
                };
                if let Some(rec) = record.as_mut()
                    && let Err(e) = rec.append(&temps)
                {
                    tracing::warn!(error = %e, "temperature record write failed");
                }
                match tx.try_send(temps) {
                    Ok(()) => {}
                    // Consumer lagging; drop this sample, the record file
                    // still has it.
                    Err(xch::TrySendError::Full(_)) => {}
                    Err(xch::TrySendError::Disconnected(_)) => {
                        tracing::debug!("monitor consumer disconnected, exiting thread");
                        break;
                    }
                }
                if stage_60k.is_some() || stage_3k.is_some() {
                    last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(cfg.period);
            }
            tracing::trace!("monitor thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent stage temperatures, draining anything queued.
    pub fn latest(&self) -> Option<StageTemps> {
        self.rx.try_iter().last()
    }

    /// Milliseconds since the last successful diode read.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = {
            let dur = Instant::now().saturating_duration_since(self.epoch);
            (dur.as_millis().min(u128::from(u64::MAX))) as u64
        };
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
}

impl Drop for TelemetryMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits between reads or after the in-flight instrument
        // read completes, bounded by the io timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("monitor thread joined successfully"),
                Err(e) => tracing::warn!(?e, "monitor thread panicked during shutdown"),
            }
        }
    }
}

fn wants_ggg(policy: ChannelPolicy) -> bool {
    matches!(policy, ChannelPolicy::Ggg | ChannelPolicy::Alternate)
}

fn wants_faa(policy: ChannelPolicy) -> bool {
    matches!(policy, ChannelPolicy::Faa | ChannelPolicy::Alternate)
}

fn first_channel(policy: ChannelPolicy) -> Option<StageChannel> {
    match policy {
        ChannelPolicy::Ggg => Some(StageChannel::Ggg),
        ChannelPolicy::Faa | ChannelPolicy::Alternate => Some(StageChannel::Faa),
    }
}

fn read_diode<T: StageThermometer>(
    thermometer: &mut T,
    channel: StageChannel,
    io: Duration,
) -> Option<f64> {
    match thermometer.temperature(channel, io) {
        Ok(k) if k.is_finite() => Some(k),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(?channel, error = %e, "diode read failed");
            None
        }
    }
}

/// Read the currently selected bridge channel if it has settled, then move
/// the multiplexer to the next channel the policy wants.
fn sample_bridge<T: StageThermometer>(
    thermometer: &mut T,
    cfg: &MonitorCfg,
    ggg_k: &mut Option<f64>,
    faa_k: &mut Option<f64>,
) {
    let selected = thermometer.selected();
    if !selected.is_bridge() {
        return;
    }
    let settle = match thermometer.settling_time(cfg.io) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "settling time read failed");
            return;
        }
    };
    if thermometer.seconds_since_select() < cfg.settle_factor * settle {
        return;
    }
    match thermometer.temperature(selected, cfg.io) {
        Ok(k) => {
            let value = if cfg.sentinels.is_fault(selected, k) {
                None
            } else {
                Some(k)
            };
            match selected {
                StageChannel::Ggg => *ggg_k = value,
                StageChannel::Faa => *faa_k = value,
                _ => {}
            }
        }
        Err(e) => tracing::debug!(?selected, error = %e, "bridge read failed"),
    }
    let next = match (cfg.policy, selected) {
        (ChannelPolicy::Alternate, StageChannel::Faa) => StageChannel::Ggg,
        (ChannelPolicy::Alternate, _) => StageChannel::Faa,
        (ChannelPolicy::Ggg, _) => StageChannel::Ggg,
        (ChannelPolicy::Faa, _) => StageChannel::Faa,
    };
    if next != selected
        && let Err(e) = thermometer.select(next, cfg.io)
    {
        tracing::debug!(?next, error = %e, "bridge channel select failed");
    }
}
