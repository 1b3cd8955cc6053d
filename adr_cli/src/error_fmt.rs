//! Human-readable error descriptions and structured JSON error formatting.

use adr_core::{BuildError, ControlError};

pub fn error_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "BuildError";
    }
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::NotConnected) => "NotConnected",
        Some(ControlError::Timeout) => "Timeout",
        Some(ControlError::Hardware(_)) => "Hardware",
        Some(ControlError::HardwareFault(_)) => "HardwareFault",
        Some(ControlError::State(_)) => "State",
        Some(ControlError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSupply => {
                "What happened: No power supply was provided to the control engine.\nLikely causes: Supply failed to initialize or was not wired into the builder.\nHow to fix: Ensure the supply handle is created successfully and passed via supply(...).".to_string()
            }
            BuildError::MissingVoltmeter => {
                "What happened: No magnet voltmeter was provided to the control engine.\nLikely causes: Voltmeter failed to initialize or was not wired into the builder.\nHow to fix: Ensure the voltmeter handle is created successfully and passed via voltmeter(...).".to_string()
            }
            BuildError::MissingThermometer => {
                "What happened: No stage thermometer was provided to the control engine.\nLikely causes: Thermometer failed to initialize or was not wired into the builder.\nHow to fix: Ensure the thermometer handle is created successfully and passed via thermometer(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::NotConnected => {
                "What happened: The power supply is not connected.\nLikely causes: Bus cable unplugged, supply powered off, or wrong address.\nHow to fix: Check the instrument bus and power, then rerun.".to_string()
            }
            ControlError::Timeout => {
                "What happened: An instrument did not answer within the I/O budget.\nLikely causes: Bus contention, a wedged instrument, or timeouts.io_ms set too low.\nHow to fix: Check the bus, and consider raising timeouts.io_ms in the config.".to_string()
            }
            ControlError::State(msg) => format!(
                "What happened: The controller refused the request ({msg}).\nLikely causes: A loop is already running, or the supply sits outside its envelope.\nHow to fix: Stop the active loop (ctrl-c) or resolve the supply state, then retry."
            ),
            ControlError::Config(msg) => format!(
                "What happened: Invalid control parameter ({msg}).\nLikely causes: Target outside the usable range, or bad gains in the TOML.\nHow to fix: Adjust the command arguments or the [regulate] section."
            ),
            ControlError::Hardware(msg) | ControlError::HardwareFault(msg) => format!(
                "What happened: An instrument reported a fault ({msg}).\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed control errors to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::NotConnected) => 2,
        Some(ControlError::Timeout) => 3,
        Some(ControlError::Hardware(_) | ControlError::HardwareFault(_)) => 4,
        Some(ControlError::State(_)) => 5,
        Some(ControlError::Config(_)) => 6,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({ "reason": error_name(err), "message": humanize(err) }).to_string()
}
