#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the ADR magnet controller.
//!
//! `Config` and sub-structs are deserialized from TOML and validated before
//! anything touches the supply. Every safety envelope lives here; `validate()`
//! rejects (never silently clamps) values that would let the control loops
//! run outside the hardware limits — in particular a cycle period shorter
//! than the slowest sensor's sampling interval, which makes feedback stale
//! and commands runaway.

use serde::Deserialize;

/// Hard electrical/mechanical envelope for the magnet and its supply.
///
/// Defaults are the HPD shield-cooled ADR values: 9 A, 3 V, 100 mV back-EMF
/// ceiling, 3 mV voltage steps, 9 A over 30 min (mag-up) / 40 min (regulate)
/// current slew, 8 mV/s voltage slew.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LimitsCfg {
    /// Maximum supply current in amps.
    pub current_a: f64,
    /// Maximum supply voltage in volts.
    pub voltage_v: f64,
    /// Back-EMF ceiling across the magnet in volts.
    pub magnet_voltage_v: f64,
    /// Mag-up voltage increment per cycle in volts.
    pub mag_up_step_v: f64,
    /// Current slew ceiling during mag-up, amps per second.
    pub didt_mag_up_a_per_s: f64,
    /// Current slew ceiling during regulation, amps per second.
    pub didt_regulate_a_per_s: f64,
    /// Voltage slew ceiling, volts per second.
    pub dvdt_v_per_s: f64,
}

impl Default for LimitsCfg {
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

/// Which bridge channels the telemetry monitor multiplexes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPolicy {
    /// Park on the FAA (50 mK) pill only.
    #[default]
    Faa,
    /// Park on the GGG (1 K) pill only.
    Ggg,
    /// Alternate between both pills each settle window.
    Alternate,
}

/// Regulation-loop gains and thermometer policy.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RegulateCfg {
    /// Proportional gain on temperature error, volts per kelvin.
    pub kp: f64,
    /// Back-EMF feedback gain (the derivative-flavored term).
    pub kd: f64,
    /// Bridge channel feeding the regulation law.
    pub feedback_channel: FeedbackChannel,
    /// Bridge multiplexing policy for the telemetry monitor.
    pub channels: ChannelPolicy,
    /// A bridge reading is fresh once `seconds_since_select >=
    /// settle_factor * settling_time`.
    pub settle_factor: f64,
    /// Upper bound accepted for a regulation target in kelvin.
    pub max_target_k: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackChannel {
    #[default]
    Faa,
    Ggg,
}

impl From<FeedbackChannel> for adr_traits::StageChannel {
    fn from(c: FeedbackChannel) -> Self {
        match c {
            FeedbackChannel::Faa => adr_traits::StageChannel::Faa,
            FeedbackChannel::Ggg => adr_traits::StageChannel::Ggg,
        }
    }
}

impl Default for RegulateCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            kd: 0.07,
            feedback_channel: FeedbackChannel::Faa,
            channels: ChannelPolicy::Faa,
            settle_factor: 10.0,
            max_target_k: 10.0,
        }
    }
}

/// Cycle scheduling discipline.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CycleCfg {
    /// Control/telemetry cycle period in milliseconds.
    pub period_ms: u64,
    /// Slowest sensor's sampling interval in milliseconds; the cycle period
    /// may never undercut this.
    pub min_sample_interval_ms: u64,
}

impl Default for CycleCfg {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            min_sample_interval_ms: 1000,
        }
    }
}

/// Per-call instrument I/O budgets.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timeouts {
    /// Max wait per sensor/actuator call (ms). Kept below the cycle period so
    /// one wedged read cannot smear into the next tick.
    pub io_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { io_ms: 750 }
    }
}

/// Out-of-range sentinel codes the bridge returns instead of data.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FaultSentinels {
    /// GGG channel out-of-range code in kelvin.
    pub ggg_k: f64,
    /// FAA channel out-of-range code in kelvin.
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    /// Path to .log (JSON lines)
    pub file: Option<String>,
    /// "info", "debug", ...
    pub level: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Directory for the tab-separated temperature record files.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Recording {
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsCfg,
    pub regulate: RegulateCfg,
    pub cycle: CycleCfg,
    pub timeouts: Timeouts,
    pub faults: FaultSentinels,
    pub logging: Logging,
    pub recording: Recording,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Limits
        let l = &self.limits;
        for (name, v) in [
            ("limits.current_a", l.current_a),
            ("limits.voltage_v", l.voltage_v),
            ("limits.magnet_voltage_v", l.magnet_voltage_v),
            ("limits.mag_up_step_v", l.mag_up_step_v),
            ("limits.didt_mag_up_a_per_s", l.didt_mag_up_a_per_s),
            ("limits.didt_regulate_a_per_s", l.didt_regulate_a_per_s),
            ("limits.dvdt_v_per_s", l.dvdt_v_per_s),
        ] {
            if !v.is_finite() || v <= 0.0 {
                eyre::bail!("{name} must be finite and > 0");
            }
        }
        if l.mag_up_step_v >= l.voltage_v {
            eyre::bail!("limits.mag_up_step_v must be below limits.voltage_v");
        }
        if l.magnet_voltage_v >= l.voltage_v {
            eyre::bail!("limits.magnet_voltage_v must be below limits.voltage_v");
        }

        // Regulate
        if !self.regulate.kp.is_finite() || self.regulate.kp <= 0.0 {
            eyre::bail!("regulate.kp must be finite and > 0");
        }
        if !self.regulate.kd.is_finite() || self.regulate.kd < 0.0 {
            eyre::bail!("regulate.kd must be finite and >= 0");
        }
        if !self.regulate.settle_factor.is_finite() || self.regulate.settle_factor < 1.0 {
            eyre::bail!("regulate.settle_factor must be >= 1");
        }
        if !self.regulate.max_target_k.is_finite() || self.regulate.max_target_k <= 0.0 {
            eyre::bail!("regulate.max_target_k must be finite and > 0");
        }

        // Cycle: undercutting the sensor sampling interval makes feedback
        // stale, so it is a hard reject rather than a clamp.
        if self.cycle.min_sample_interval_ms == 0 {
            eyre::bail!("cycle.min_sample_interval_ms must be >= 1");
        }
        if self.cycle.period_ms < self.cycle.min_sample_interval_ms {
            eyre::bail!(
                "cycle.period_ms ({}) must be >= cycle.min_sample_interval_ms ({})",
                self.cycle.period_ms,
                self.cycle.min_sample_interval_ms
            );
        }

        // Timeouts
        if self.timeouts.io_ms == 0 {
            eyre::bail!("timeouts.io_ms must be >= 1");
        }

        // Fault sentinels
        if !self.faults.ggg_k.is_finite() || !self.faults.faa_k.is_finite() {
            eyre::bail!("faults sentinels must be finite");
        }

        Ok(())
    }
}
