//! Quick Start Example
//!
//! Demonstrates driving a mag-up ramp against the simulated rig and stepping
//! the controller by hand instead of through the scheduler.
//!
//! Run with `cargo run --example quick_start` (the `hardware-errors` default
//! feature pulls in the simulated rig).

use std::time::Duration;

use adr_core::{AdrControlBuilder, CycleStatus, Limits};
use adr_hardware::SimRig;
use adr_traits::clock::{Clock, MonotonicClock};

fn main() -> Result<(), eyre::Report> {
    let clock = MonotonicClock::new();

    // A fast rig and a low current target so the demo finishes in seconds.
    let rig = SimRig::new().with_time_constants(2.0, 0.0);
    let limits = Limits {
        current_a: 2.0,
        mag_up_step_v: 0.05,
        dvdt_v_per_s: 1.0,
        didt_mag_up_a_per_s: 5.0,
        ..Limits::default()
    };

    // Bring the supply into a known CV state before handing it to the loop.
    let mut supply = rig.supply();
    adr_core::prepare_supply(&mut supply, &limits, Duration::from_millis(100))?;

    let mut ctl = AdrControlBuilder::new()
        .supply(supply)
        .voltmeter(rig.voltmeter())
        .thermometer(rig.thermometer())
        .limits(limits)
        .build()?;

    ctl.start_mag_up()?;

    // 50 ms tick; throttle prints to ~500 ms
    let tick = Duration::from_millis(50);
    let mut last_print = clock.now();

    loop {
        match ctl.step()? {
            CycleStatus::Running => {
                if clock.ms_since(last_print) >= 500
                    && let Some(t) = ctl.telemetry()
                {
                    println!(
                        "I = {:.3} A, V = {:.3} V, back-EMF = {:.3} V",
                        t.supply_current_a, t.supply_voltage_v, t.back_emf_v
                    );
                    last_print = clock.now();
                }
            }
            CycleStatus::Complete(c) => {
                println!("mag up finished: {c:?} at {:.3} A", ctl.last_current());
                break;
            }
            CycleStatus::Idle => break,
        }
        clock.sleep(tick);
    }

    Ok(())
}
