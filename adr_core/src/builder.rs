//! Builder for [`AdrControl`].

use std::sync::Arc;

use adr_traits::clock::{Clock, MonotonicClock};
use adr_traits::{MagnetVoltmeter, PowerSupply, StageThermometer};

use crate::config::{FaultSentinels, Limits, RegulateGains, Timeouts};
use crate::core::AdrControl;
use crate::error::BuildError;
use crate::status::ControllerMode;

/// Assembles an [`AdrControl`] from its three instrument ports plus tuning.
///
/// All three ports are mandatory; tuning falls back to the stock magnet
/// parameters when not supplied.
pub struct AdrControlBuilder<P, V, T> {
    supply: Option<P>,
    voltmeter: Option<V>,
    thermometer: Option<T>,
    limits: Limits,
    gains: RegulateGains,
    timeouts: Timeouts,
    sentinels: FaultSentinels,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<P: PowerSupply, V: MagnetVoltmeter, T: StageThermometer> Default
    for AdrControlBuilder<P, V, T>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PowerSupply, V: MagnetVoltmeter, T: StageThermometer> AdrControlBuilder<P, V, T> {
    pub fn new() -> Self {
        Self {
            supply: None,
            voltmeter: None,
            thermometer: None,
            limits: Limits::default(),
            gains: RegulateGains::default(),
            timeouts: Timeouts::default(),
            sentinels: FaultSentinels::default(),
            clock: Arc::new(MonotonicClock),
        }
    }

    pub fn supply(mut self, supply: P) -> Self {
        self.supply = Some(supply);
        self
    }

    pub fn voltmeter(mut self, voltmeter: V) -> Self {
        self.voltmeter = Some(voltmeter);
        self
    }

    pub fn thermometer(mut self, thermometer: T) -> Self {
        self.thermometer = Some(thermometer);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn gains(mut self, gains: RegulateGains) -> Self {
        self.gains = gains;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn sentinels(mut self, sentinels: FaultSentinels) -> Self {
        self.sentinels = sentinels;
        self
    }

    /// Apply the limit, gain, timeout and sentinel sections of a loaded
    /// configuration in one go.
    pub fn config(mut self, cfg: &adr_config::Config) -> Self {
        self.limits = (&cfg.limits).into();
        self.gains = (&cfg.regulate).into();
        self.timeouts = (&cfg.timeouts).into();
        self.sentinels = (&cfg.faults).into();
        self
    }

    /// Swap the time source; tests inject a deterministic clock here.
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<AdrControl<P, V, T>, BuildError> {
        let supply = self.supply.ok_or(BuildError::MissingSupply)?;
        let voltmeter = self.voltmeter.ok_or(BuildError::MissingVoltmeter)?;
        let thermometer = self.thermometer.ok_or(BuildError::MissingThermometer)?;

        let l = &self.limits;
        if !(l.current_a > 0.0 && l.current_a.is_finite()) {
            return Err(BuildError::InvalidConfig("current limit must be positive"));
        }
        if !(l.voltage_v > 0.0 && l.voltage_v.is_finite()) {
            return Err(BuildError::InvalidConfig("voltage limit must be positive"));
        }
        if !(l.magnet_voltage_v > 0.0) || l.magnet_voltage_v >= l.voltage_v {
            return Err(BuildError::InvalidConfig(
                "magnet voltage band must be positive and below the output ceiling",
            ));
        }
        if !(l.mag_up_step_v > 0.0) || l.mag_up_step_v >= l.voltage_v {
            return Err(BuildError::InvalidConfig(
                "mag-up step must be positive and below the output ceiling",
            ));
        }
        if !(l.dvdt_v_per_s > 0.0 && l.didt_mag_up_a_per_s > 0.0 && l.didt_regulate_a_per_s > 0.0)
        {
            return Err(BuildError::InvalidConfig("rate limits must be positive"));
        }
        if !(self.gains.kp.is_finite() && self.gains.kd.is_finite()) {
            return Err(BuildError::InvalidConfig("regulation gains must be finite"));
        }
        if self.timeouts.io_ms == 0 {
            return Err(BuildError::InvalidConfig("io timeout must be non-zero"));
        }

        let now = self.clock.now();
        Ok(AdrControl {
            supply,
            voltmeter,
            thermometer,
            limits: self.limits,
            gains: self.gains,
            timeouts: self.timeouts,
            sentinels: self.sentinels,
            clock: self.clock,
            mode: ControllerMode::Idle,
            run_started: now,
            last_current_a: 0.0,
            last_back_emf_v: 0.0,
            last_sample: now,
            cached_stage_k: None,
            target_k: 0.0,
            last_telemetry: None,
        })
    }
}
