//! The unified magnet control loop (`AdrControl`).
//!
//! One struct owns the instrument ports and runs both closed loops as
//! per-cycle state machines: the mag-up ramp and the temperature regulation
//! law, each feeding every proposed voltage delta through the `limiter`
//! clamp chain before anything is commanded. The mode field is the mutual
//! exclusion between the two loops; there is no other lock because only one
//! logical writer exists by construction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adr_traits::clock::Clock;
use adr_traits::{MagnetVoltmeter, PowerSupply, StageChannel, StageThermometer};
use eyre::WrapErr;

use crate::config::{FaultSentinels, Limits, RegulateGains, Timeouts};
use crate::error::{ControlError, Result};
use crate::hw_error::map_hw_error;
use crate::limiter::{LimiterCtx, clamp_delta};
use crate::status::{Completion, ControllerMode, CycleStatus};
use crate::telemetry::Telemetry;
use crate::util::DT_EPS_S;

pub struct AdrControl<P: PowerSupply, V: MagnetVoltmeter, T: StageThermometer> {
    pub(crate) supply: P,
    pub(crate) voltmeter: V,
    pub(crate) thermometer: T,
    pub(crate) limits: Limits,
    pub(crate) gains: RegulateGains,
    pub(crate) timeouts: Timeouts,
    pub(crate) sentinels: FaultSentinels,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,

    pub(crate) mode: ControllerMode,
    // Per-run history; reseeded by start_*() and meaningless while Idle.
    pub(crate) run_started: Instant,
    pub(crate) last_current_a: f64,
    pub(crate) last_back_emf_v: f64,
    pub(crate) last_sample: Instant,
    pub(crate) cached_stage_k: Option<f64>,
    pub(crate) target_k: f64,
    pub(crate) last_telemetry: Option<Telemetry>,
}

impl<P: PowerSupply, V: MagnetVoltmeter, T: StageThermometer> core::fmt::Debug
    for AdrControl<P, V, T>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdrControl")
            .field("mode", &self.mode)
            .field("last_current_a", &self.last_current_a)
            .field("target_k", &self.target_k)
            .finish()
    }
}

impl<P: PowerSupply, V: MagnetVoltmeter, T: StageThermometer> AdrControl<P, V, T> {
    /// Which loop currently owns the supply.
    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// Most recent per-cycle telemetry snapshot, if a cycle has run.
    pub fn telemetry(&self) -> Option<Telemetry> {
        self.last_telemetry
    }

    /// Last supply current observed by the active (or most recent) run.
    pub fn last_current(&self) -> f64 {
        self.last_current_a
    }

    /// Tear down the controller and hand the instrument ports back.
    pub fn into_parts(self) -> (P, V, T) {
        (self.supply, self.voltmeter, self.thermometer)
    }

    fn io(&self) -> Duration {
        Duration::from_millis(self.timeouts.io_ms)
    }

    /// Begin the mag-up ramp toward `limits.current_a`.
    ///
    /// Rejected while regulation (or another ramp) is active, and when the
    /// supply is unreachable.
    pub fn start_mag_up(&mut self) -> Result<()> {
        self.ensure_startable("mag up")?;
        let io = self.io();
        let i_now = self
            .supply
            .current(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading supply current")?;
        let now = self.clock.now();
        self.seed_history(now, i_now);
        self.mode = ControllerMode::MaggingUp;
        tracing::info!(
            target_a = self.limits.current_a,
            from_a = i_now,
            "beginning mag up"
        );
        Ok(())
    }

    /// Begin regulating the feedback stage at `target_k`.
    pub fn start_regulate(&mut self, target_k: f64) -> Result<()> {
        self.ensure_startable("regulate")?;
        if !target_k.is_finite() || target_k <= 0.0 || target_k > self.gains.max_target_k {
            return Err(eyre::Report::new(ControlError::Config(format!(
                "regulation target {target_k} K outside (0, {}]",
                self.gains.max_target_k
            ))));
        }
        let io = self.io();
        let i_now = self
            .supply
            .current(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading supply current")?;
        let now = self.clock.now();
        self.seed_history(now, i_now);
        self.target_k = target_k;
        self.seed_feedback_temp();
        self.mode = ControllerMode::Regulating;
        tracing::info!(target_k, from_a = i_now, "beginning regulation");
        Ok(())
    }

    /// Stop whichever loop is active. Calling this while Idle is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.mode {
            ControllerMode::Idle => Ok(()),
            ControllerMode::MaggingUp => {
                self.mode = ControllerMode::Idle;
                tracing::info!(current_a = self.last_current_a, "mag up stopped");
                Ok(())
            }
            ControllerMode::Regulating => {
                self.mode = ControllerMode::Idle;
                tracing::info!(current_a = self.last_current_a, "regulation stopped");
                Ok(())
            }
        }
    }

    /// One control cycle of the active loop.
    ///
    /// A hardware failure aborts the cycle, drops the controller back to
    /// Idle, and propagates the error; the loop is never silently retried
    /// against an unresponsive instrument.
    pub fn step(&mut self) -> Result<CycleStatus> {
        let res = match self.mode {
            ControllerMode::Idle => return Ok(CycleStatus::Idle),
            ControllerMode::MaggingUp => self.mag_up_cycle(),
            ControllerMode::Regulating => self.regulate_cycle(),
        };
        match res {
            Ok(CycleStatus::Complete(c)) => {
                self.mode = ControllerMode::Idle;
                Ok(CycleStatus::Complete(c))
            }
            Ok(s) => Ok(s),
            Err(e) => {
                self.mode = ControllerMode::Idle;
                tracing::error!(error = %e, alert = true, "control cycle failed; loop halted");
                Err(e)
            }
        }
    }

    // ── Private: shared cycle plumbing ───────────────────────────────────────

    fn ensure_startable(&mut self, what: &str) -> Result<()> {
        if !self.supply.is_connected() {
            tracing::warn!(alert = true, "cannot {what}: power supply not connected");
            return Err(eyre::Report::new(ControlError::NotConnected));
        }
        match self.mode {
            ControllerMode::Idle => Ok(()),
            other => Err(eyre::Report::new(ControlError::State(format!(
                "cannot {what}: controller busy ({other:?})"
            )))),
        }
    }

    fn seed_history(&mut self, now: Instant, i_now: f64) {
        self.run_started = now;
        self.last_sample = now;
        self.last_current_a = i_now;
        self.last_back_emf_v = 0.0;
        self.cached_stage_k = None;
        self.last_telemetry = None;
    }

    /// Sample the instruments and roll the finite-difference history.
    /// Returns (telemetry, di_a, dt_s).
    fn sample_cycle(&mut self) -> Result<(Telemetry, f64, f64)> {
        let io = self.io();
        let back_emf = self
            .voltmeter
            .back_emf(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading back-EMF")?;
        let i_now = self
            .supply
            .current(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading supply current")?;
        let v_now = self
            .supply
            .voltage(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading supply voltage")?;

        let now = self.clock.now();
        let dt_s = now
            .saturating_duration_since(self.last_sample)
            .as_secs_f64();
        let di_a = i_now - self.last_current_a;
        self.last_sample = now;
        self.last_current_a = i_now;
        self.last_back_emf_v = back_emf;

        let telemetry = Telemetry {
            back_emf_v: back_emf,
            supply_current_a: i_now,
            supply_voltage_v: v_now,
            stage_temp_k: self.cached_stage_k,
            elapsed_s: now.saturating_duration_since(self.run_started).as_secs_f64(),
        };
        self.last_telemetry = Some(telemetry);
        Ok((telemetry, di_a, dt_s))
    }

    fn command_voltage(&mut self, volts: f64) -> Result<()> {
        self.supply
            .set_voltage(volts, self.io())
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("commanding supply voltage")
    }

    // ── Mag-up ───────────────────────────────────────────────────────────────

    /// One ramp cycle: raise voltage by the fixed step while current, EMF and
    /// dI/dt allow it; done when the current limit is reached.
    fn mag_up_cycle(&mut self) -> Result<CycleStatus> {
        let (t, di_a, dt_s) = self.sample_cycle()?;

        if t.supply_current_a >= self.limits.current_a {
            tracing::info!(current_a = t.supply_current_a, "mag up finished");
            return Ok(CycleStatus::Complete(Completion::TargetCurrentReached));
        }

        let rate_ok = dt_s <= DT_EPS_S || (di_a / dt_s).abs() < self.limits.didt_mag_up_a_per_s;
        let proposed = if t.back_emf_v < self.limits.magnet_voltage_v && rate_ok {
            self.limits.mag_up_step_v
        } else {
            // Hold this cycle; EMF or current slew is at its ceiling.
            0.0
        };

        let ctx = LimiterCtx {
            supply_voltage_v: t.supply_voltage_v,
            supply_current_a: t.supply_current_a,
            back_emf_v: t.back_emf_v,
            di_a,
            dt_s,
        };
        let out = clamp_delta(proposed, &ctx, &self.limits, self.limits.didt_mag_up_a_per_s);
        // The floor can only fire here while holding at 0 V; that is a hold,
        // not a termination, during a ramp.
        let v_cmd = if out.floored {
            0.0
        } else {
            t.supply_voltage_v + out.dv
        };
        self.command_voltage(v_cmd)?;
        tracing::trace!(
            v_now = t.supply_voltage_v,
            back_emf = t.back_emf_v,
            dv = out.dv,
            "mag up cycle"
        );
        Ok(CycleStatus::Running)
    }

    // ── Regulate ─────────────────────────────────────────────────────────────

    /// One regulation cycle: propose `kp * (target - T) - kd * backEMF`, run
    /// the full clamp chain, command the result. The non-negative floor ends
    /// the run — the magnet is out of current to shed.
    fn regulate_cycle(&mut self) -> Result<CycleStatus> {
        let (t, di_a, dt_s) = self.sample_cycle()?;
        self.refresh_feedback_temp()?;

        let Some(stage_k) = self.cached_stage_k else {
            // No valid feedback reading yet; hold rather than chase NaN.
            tracing::warn!("no feedback temperature available; holding voltage");
            return Ok(CycleStatus::Running);
        };

        let proposed = self.gains.kp * (self.target_k - stage_k) - t.back_emf_v * self.gains.kd;
        let ctx = LimiterCtx {
            supply_voltage_v: t.supply_voltage_v,
            supply_current_a: t.supply_current_a,
            back_emf_v: t.back_emf_v,
            di_a,
            dt_s,
        };
        let out = clamp_delta(
            proposed,
            &ctx,
            &self.limits,
            self.limits.didt_regulate_a_per_s,
        );

        if out.floored {
            self.command_voltage(0.0)?;
            tracing::info!(
                current_a = t.supply_current_a,
                "regulation complete; mag up and try again"
            );
            return Ok(CycleStatus::Complete(Completion::VoltageFloored));
        }

        self.command_voltage(t.supply_voltage_v + out.dv)?;
        tracing::trace!(
            v_now = t.supply_voltage_v,
            back_emf = t.back_emf_v,
            stage_k,
            dv = out.dv,
            "regulate cycle"
        );
        Ok(CycleStatus::Running)
    }

    /// Seed the feedback temperature at start; a bridge fault code falls back
    /// to the 3 K diode so the first proposals are not built on NaN.
    fn seed_feedback_temp(&mut self) {
        let io = self.io();
        let ch = self.gains.feedback_channel;
        match self.thermometer.temperature(ch, io) {
            Ok(k) if !self.sentinels.is_fault(ch, k) => {
                self.cached_stage_k = Some(k);
            }
            _ => match self.thermometer.temperature(StageChannel::Stage3K, io) {
                Ok(k) if k.is_finite() => {
                    tracing::warn!(diode_k = k, "bridge reading stale; seeding from 3K diode");
                    self.cached_stage_k = Some(k);
                }
                _ => {
                    tracing::warn!("no usable feedback temperature at start");
                    self.cached_stage_k = None;
                }
            },
        }
    }

    /// Re-sample the bridge only when its multiplexer already sits on the
    /// feedback channel and the filter has settled; otherwise the cached
    /// value stands. The bridge time constant makes per-cycle resampling
    /// invalid, so "stale cache" beats "fresh garbage".
    fn refresh_feedback_temp(&mut self) -> Result<()> {
        let ch = self.gains.feedback_channel;
        if self.thermometer.selected() != ch {
            return Ok(());
        }
        let io = self.io();
        let settle = self
            .thermometer
            .settling_time(io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading bridge settling time")?;
        if self.thermometer.seconds_since_select() < self.gains.settle_factor * settle {
            return Ok(());
        }
        let k = self
            .thermometer
            .temperature(ch, io)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading feedback temperature")?;
        if self.sentinels.is_fault(ch, k) {
            // Out-of-range code: treat as no data and keep the cached value.
            tracing::debug!(reading = k, "feedback channel returned fault code");
        } else {
            self.cached_stage_k = Some(k);
        }
        Ok(())
    }
}
