//! Instrument backends for the ADR controller.
//!
//! The simulated rig models the magnet as a first-order circuit: the coil
//! current relaxes toward `V / R` with a configurable time constant, the
//! back-EMF is the inductive part of the terminal voltage, and the FAA pill
//! cools as current builds. All three instrument handles share one rig state
//! so the loop sees a consistent picture, and the rig can be "unplugged" to
//! exercise disconnect handling.

pub mod error;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use adr_traits::{
    MagnetVoltmeter, OperatingMode, PowerSupply, StageChannel, StageThermometer,
};

use crate::error::HwError;

const MAGNET_RESISTANCE_OHM: f64 = 1.0 / 3.0;

struct SimState {
    v_set: f64,
    i_limit: f64,
    i: f64,
    output_on: bool,
    connected: bool,
    tau_s: f64,
    last_advance: Instant,
    selected: StageChannel,
    selected_at: Instant,
    settle_s: f64,
}

impl SimState {
    /// Relax the coil current toward its asymptote for the wall time that
    /// has passed since the last call.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last_advance)
            .as_secs_f64();
        self.last_advance = now;
        if dt <= 0.0 {
            return;
        }
        let target = if self.output_on {
            self.v_set / MAGNET_RESISTANCE_OHM
        } else {
            // Supply off: the superconducting coil holds its current.
            self.i
        };
        let decay = (-dt / self.tau_s).exp();
        self.i = target + (self.i - target) * decay;
        // The supply regulates at its programmed limit (CC mode).
        if self.i > self.i_limit {
            self.i = self.i_limit;
        }
    }

    fn back_emf(&self) -> f64 {
        if self.output_on {
            self.v_set - self.i * MAGNET_RESISTANCE_OHM
        } else {
            0.0
        }
    }

    fn temperature(&self, channel: StageChannel) -> f64 {
        match channel {
            StageChannel::Stage60K => 55.0,
            StageChannel::Stage3K => 3.2,
            // The pills warm during the ramp and cool as current is shed.
            StageChannel::Ggg => (1.2 - 0.08 * self.i).max(0.3),
            StageChannel::Faa => (4.2 - 0.46 * self.i).max(0.045),
        }
    }

    fn ensure_connected(&self) -> Result<(), HwError> {
        if self.connected {
            Ok(())
        } else {
            Err(HwError::NotConnected)
        }
    }
}

/// Owner handle for the simulated rig; hands out the three instrument ports
/// and keeps a control handle for tests and demos.
#[derive(Clone)]
pub struct SimRig {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRig {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: Arc::new(Mutex::new(SimState {
                v_set: 0.0,
                i_limit: 9.0,
                i: 0.0,
                output_on: false,
                connected: true,
                tau_s: 20.0,
                last_advance: now,
                selected: StageChannel::Faa,
                selected_at: now,
                settle_s: 0.3,
            })),
        }
    }

    /// Shrink the electrical and filter time constants so a full run fits in
    /// a test.
    pub fn with_time_constants(self, tau_s: f64, settle_s: f64) -> Self {
        {
            let mut s = self.lock();
            s.tau_s = tau_s;
            s.settle_s = settle_s;
        }
        self
    }

    pub fn supply(&self) -> SimSupply {
        SimSupply(self.clone())
    }

    pub fn voltmeter(&self) -> SimVoltmeter {
        SimVoltmeter(self.clone())
    }

    pub fn thermometer(&self) -> SimThermometer {
        SimThermometer(self.clone())
    }

    /// Unplug or replug the whole rig.
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn coil_current(&self) -> f64 {
        let mut s = self.lock();
        s.advance();
        s.i
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(g) => g,
            // A poisoned rig mutex means a test thread panicked mid-cycle;
            // the state itself is still plain-old-data.
            Err(p) => p.into_inner(),
        }
    }
}

pub struct SimSupply(SimRig);

impl PowerSupply for SimSupply {
    fn current(&mut self, _t: Duration) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        Ok(s.i)
    }

    fn voltage(&mut self, _t: Duration) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let s = self.0.lock();
        s.ensure_connected()?;
        Ok(if s.output_on { s.v_set } else { 0.0 })
    }

    fn set_voltage(
        &mut self,
        volts: f64,
        _t: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        s.v_set = volts;
        tracing::trace!(volts, "sim supply voltage programmed");
        Ok(())
    }

    fn set_current(
        &mut self,
        amps: f64,
        _t: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.i_limit = amps;
        Ok(())
    }

    fn output_on(&mut self, _t: Duration) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        s.output_on = true;
        Ok(())
    }

    fn reset(&mut self, _t: Duration) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.v_set = 0.0;
        s.output_on = false;
        Ok(())
    }

    fn operating_mode(
        &mut self,
        _t: Duration,
    ) -> Result<OperatingMode, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        Ok(if !s.output_on {
            OperatingMode::OutputOff
        } else if s.i >= s.i_limit - 1e-9 {
            OperatingMode::ConstantCurrent
        } else {
            OperatingMode::ConstantVoltage
        })
    }

    fn is_connected(&self) -> bool {
        self.0.lock().connected
    }
}

pub struct SimVoltmeter(SimRig);

impl MagnetVoltmeter for SimVoltmeter {
    fn back_emf(&mut self, _t: Duration) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        Ok(s.back_emf())
    }
}

pub struct SimThermometer(SimRig);

impl StageThermometer for SimThermometer {
    fn temperature(
        &mut self,
        channel: StageChannel,
        _t: Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        s.advance();
        Ok(s.temperature(channel))
    }

    fn select(
        &mut self,
        channel: StageChannel,
        _t: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.0.lock();
        s.ensure_connected()?;
        if s.selected != channel {
            s.selected = channel;
            s.selected_at = Instant::now();
        }
        Ok(())
    }

    fn selected(&self) -> StageChannel {
        self.0.lock().selected
    }

    fn seconds_since_select(&self) -> f64 {
        let s = self.0.lock();
        Instant::now()
            .saturating_duration_since(s.selected_at)
            .as_secs_f64()
    }

    fn settling_time(
        &mut self,
        _t: Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let s = self.0.lock();
        s.ensure_connected()?;
        Ok(s.settle_s)
    }
}
