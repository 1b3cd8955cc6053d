#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core control logic for an ADR magnet power supply (hardware-agnostic).
//!
//! All instrument interactions go through the `adr_traits` ports
//! (`PowerSupply`, `MagnetVoltmeter`, `StageThermometer`).
//!
//! ## Architecture
//!
//! - **SafetyLimiter**: the ordered six-clamp voltage-delta pipeline
//!   (`limiter` module). The clamp order is a contract, not a tuning detail.
//! - **Controller**: `AdrControl` — mag-up ramp and temperature regulation as
//!   one per-cycle state machine with an exclusive mode (`core` module)
//! - **Scheduling**: `CycleScheduler`, a work-compensated fixed-period driver
//!   with cooperative cancellation (`scheduler` module)
//! - **Telemetry**: background thermometer monitor thread and the
//!   tab-separated temperature record writer (`monitor`, `record` modules)
//! - **Bring-up**: power supply initialization sequence (`bringup` module)
//!
//! Engineering units are `f64` volts / amps / kelvin / seconds throughout.

pub mod bringup;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod core;
pub mod error;
pub mod hw_error;
pub mod limiter;
pub mod mocks;
pub mod monitor;
pub mod record;
pub mod scheduler;
pub mod status;
pub mod telemetry;
pub mod util;

pub use bringup::prepare_supply;
pub use builder::AdrControlBuilder;
pub use config::{FaultSentinels, Limits, RegulateGains, Timeouts};
pub use core::AdrControl;
pub use error::{BuildError, ControlError};
pub use limiter::{Clamped, LimiterCtx, clamp_delta};
pub use monitor::{MonitorCfg, StageTemps, TelemetryMonitor};
pub use record::TempRecord;
pub use scheduler::{CancelToken, CycleScheduler, RunOutcome};
pub use status::{Completion, ControllerMode, CycleStatus};
pub use telemetry::Telemetry;
