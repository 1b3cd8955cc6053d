//! Test and helper mocks for adr_core

use std::time::Duration;

use adr_traits::{StageChannel, StageThermometer};

/// A thermometer that tracks channel selection but always errors on read;
/// useful when driving the control loop from externally supplied readings.
#[derive(Debug)]
pub struct NoopThermometer {
    selected: StageChannel,
}

impl Default for NoopThermometer {
    fn default() -> Self {
        Self {
            selected: StageChannel::Stage3K,
        }
    }
}

impl StageThermometer for NoopThermometer {
    fn temperature(
        &mut self,
        _channel: StageChannel,
        _timeout: Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop thermometer")))
    }

    fn select(
        &mut self,
        channel: StageChannel,
        _timeout: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.selected = channel;
        Ok(())
    }

    fn selected(&self) -> StageChannel {
        self.selected
    }

    fn seconds_since_select(&self) -> f64 {
        0.0
    }

    fn settling_time(
        &mut self,
        _timeout: Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop thermometer")))
    }
}
