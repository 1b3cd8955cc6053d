//! Supply bring-up: put the power supply into a known constant-voltage
//! state before either loop takes over.

use std::time::Duration;

use adr_traits::{OperatingMode, PowerSupply};
use eyre::WrapErr;

use crate::config::Limits;
use crate::error::{ControlError, Result};
use crate::hw_error::map_hw_error;

/// Prepare `supply` for closed-loop control.
///
/// The sequence depends on the state the supply is found in:
/// - output off: reset, program the current limit, zero the voltage, enable
///   the output;
/// - constant voltage: program the current limit, leave the output alone;
/// - constant current: re-command the present voltage first so programming
///   the current limit cannot step the output.
///
/// Refuses to proceed when the supply already sits above the current limit;
/// that needs a manual ramp-down, not software.
pub fn prepare_supply<P: PowerSupply>(
    supply: &mut P,
    limits: &Limits,
    io: Duration,
) -> Result<()> {
    if !supply.is_connected() {
        return Err(eyre::Report::new(ControlError::NotConnected));
    }
    let i_now = supply
        .current(io)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("reading supply current")?;
    // Small tolerance so a supply sitting exactly at the limit still passes.
    if i_now - 0.01 >= limits.current_a {
        tracing::error!(
            current_a = i_now,
            limit_a = limits.current_a,
            alert = true,
            "supply current above limit; lower it manually before running"
        );
        return Err(eyre::Report::new(ControlError::State(format!(
            "supply current {i_now} A at or above limit {} A",
            limits.current_a
        ))));
    }

    let mode = supply
        .operating_mode(io)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("reading supply operating mode")?;
    match mode {
        OperatingMode::OutputOff => {
            tracing::info!(
                limit_a = limits.current_a,
                "output off; programming current limit and 0 V, enabling output"
            );
            supply
                .reset(io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("resetting supply")?;
            supply
                .set_current(limits.current_a, io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("programming current limit")?;
            supply
                .set_voltage(0.0, io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("zeroing supply voltage")?;
            supply
                .output_on(io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("enabling supply output")?;
        }
        OperatingMode::ConstantVoltage => {
            tracing::info!(
                limit_a = limits.current_a,
                "starting in CV mode; programming current limit"
            );
            supply
                .set_current(limits.current_a, io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("programming current limit")?;
        }
        OperatingMode::ConstantCurrent => {
            let v_now = supply
                .voltage(io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("reading supply voltage")?;
            tracing::info!(
                limit_a = limits.current_a,
                voltage_v = v_now,
                "starting in CC mode; holding voltage while programming current limit"
            );
            supply
                .set_voltage(v_now, io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("re-commanding present voltage")?;
            supply
                .set_current(limits.current_a, io)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("programming current limit")?;
        }
    }
    Ok(())
}
