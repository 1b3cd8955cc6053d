pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Operating mode reported by the magnet power supply front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    OutputOff,
    ConstantVoltage,
    ConstantCurrent,
}

/// Cryostat stage thermometer channels.
///
/// The diode channels read continuously; the bridge channels (GGG, FAA) share
/// a multiplexed resistance bridge and are only valid once the bridge has
/// settled on the selected channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageChannel {
    /// 60 K stage diode.
    Stage60K,
    /// 3 K stage diode.
    Stage3K,
    /// 1 K stage RuOx pill (bridge channel 1).
    Ggg,
    /// 50 mK stage RuOx pill (bridge channel 2).
    Faa,
}

impl StageChannel {
    /// Whether this channel goes through the multiplexed resistance bridge.
    pub fn is_bridge(self) -> bool {
        matches!(self, StageChannel::Ggg | StageChannel::Faa)
    }
}

/// The magnet power supply: both actuator (voltage/current programming) and
/// sensor (readback of what it is actually delivering).
pub trait PowerSupply {
    fn current(&mut self, timeout: Duration) -> Result<f64, BoxError>;
    fn voltage(&mut self, timeout: Duration) -> Result<f64, BoxError>;
    fn set_voltage(&mut self, volts: f64, timeout: Duration) -> Result<(), BoxError>;
    fn set_current(&mut self, amps: f64, timeout: Duration) -> Result<(), BoxError>;
    fn output_on(&mut self, timeout: Duration) -> Result<(), BoxError>;
    fn reset(&mut self, timeout: Duration) -> Result<(), BoxError>;
    fn operating_mode(&mut self, timeout: Duration) -> Result<OperatingMode, BoxError>;
    fn is_connected(&self) -> bool;
}

/// Differential voltmeter across the magnet coil; the back-EMF it reads is
/// the primary real-time safety signal.
pub trait MagnetVoltmeter {
    fn back_emf(&mut self, timeout: Duration) -> Result<f64, BoxError>;
}

/// Multi-channel stage thermometer (diode monitor + multiplexed bridge).
pub trait StageThermometer {
    /// Read the given channel in kelvin. Bridge channels return the bridge's
    /// current display; callers gate freshness via the settling helpers.
    fn temperature(&mut self, channel: StageChannel, timeout: Duration) -> Result<f64, BoxError>;

    /// Switch the bridge multiplexer to `channel` (no-op for diode channels).
    fn select(&mut self, channel: StageChannel, timeout: Duration) -> Result<(), BoxError>;

    /// Bridge channel currently selected on the multiplexer.
    fn selected(&self) -> StageChannel;

    /// Seconds since the bridge channel was last switched.
    fn seconds_since_select(&self) -> f64;

    /// Bridge filter settling time constant in seconds.
    fn settling_time(&mut self, timeout: Duration) -> Result<f64, BoxError>;
}
