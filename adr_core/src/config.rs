//! Runtime configuration structs for the control engine.
//!
//! These mirror the safety envelope of the magnet and its supply. They are
//! separate from the TOML-deserialized schema in `adr_config`; see
//! `conversions` for the bridge.

use adr_traits::StageChannel;

/// Hard electrical envelope. Violating any of these risks quenching the
/// magnet or damaging the supply, so every clamp in `limiter` keys off them.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum supply current (A).
    pub current_a: f64,
    /// Maximum supply voltage (V).
    pub voltage_v: f64,
    /// Back-EMF ceiling across the magnet (V).
    pub magnet_voltage_v: f64,
    /// Mag-up voltage increment per cycle (V).
    pub mag_up_step_v: f64,
    /// Current slew ceiling during mag-up (A/s).
    pub didt_mag_up_a_per_s: f64,
    /// Current slew ceiling during regulation (A/s).
    pub didt_regulate_a_per_s: f64,
    /// Voltage slew ceiling (V/s).
    pub dvdt_v_per_s: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            current_a: 9.0,
            voltage_v: 3.0,
            magnet_voltage_v: 0.1,
            mag_up_step_v: 0.003,
            didt_mag_up_a_per_s: 9.0 / (30.0 * 60.0),
            didt_regulate_a_per_s: 9.0 / (40.0 * 60.0),
            dvdt_v_per_s: 0.008,
        }
    }
}

/// Regulation law gains and feedback thermometer policy.
///
/// The law is `dV = kp * (target - T) - kd * backEMF`: temperature error
/// drives voltage, back-EMF feeds back negatively to suppress overshoot.
/// Not a textbook PID; do not "fix" it.
#[derive(Debug, Clone, Copy)]
pub struct RegulateGains {
    /// Proportional gain on temperature error (V/K).
    pub kp: f64,
    /// Back-EMF feedback gain (dimensionless).
    pub kd: f64,
    /// Bridge channel feeding the regulation law.
    pub feedback_channel: StageChannel,
    /// A bridge reading counts as settled once
    /// `seconds_since_select >= settle_factor * settling_time`.
    pub settle_factor: f64,
    /// Upper bound accepted for a regulation target (K).
    pub max_target_k: f64,
}

impl Default for RegulateGains {
    fn default() -> Self {
        Self {
            kp: 1.0,
            kd: 0.07,
            feedback_channel: StageChannel::Faa,
            settle_factor: 10.0,
            max_target_k: 10.0,
        }
    }
}

/// Per-call instrument I/O budget.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Max wait per sensor/actuator call (ms).
    pub io_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { io_ms: 750 }
    }
}

/// Out-of-range codes the resistance bridge reports instead of data; a
/// reading equal to its channel's sentinel is "no data", not a temperature.
#[derive(Debug, Clone, Copy)]
pub struct FaultSentinels {
    pub ggg_k: f64,
    pub faa_k: f64,
}

impl Default for FaultSentinels {
    fn default() -> Self {
        Self {
            ggg_k: 20.0,
            faa_k: 45.0,
        }
    }
}

impl FaultSentinels {
    /// Whether `reading` on `channel` is a fault code rather than data.
    pub fn is_fault(&self, channel: StageChannel, reading: f64) -> bool {
        if !reading.is_finite() {
            return true;
        }
        match channel {
            StageChannel::Ggg => reading == self.ggg_k,
            StageChannel::Faa => reading == self.faa_k,
            _ => false,
        }
    }
}
