use std::time::Duration;

use adr_hardware::SimRig;
use adr_traits::{MagnetVoltmeter, OperatingMode, PowerSupply, StageChannel, StageThermometer};
use rstest::rstest;

const IO: Duration = Duration::from_millis(50);

#[rstest]
#[case(StageChannel::Stage60K, 55.0)]
#[case(StageChannel::Stage3K, 3.2)]
#[case(StageChannel::Ggg, 1.2)]
#[case(StageChannel::Faa, 4.2)]
fn idle_rig_stage_temperatures(#[case] channel: StageChannel, #[case] expected_k: f64) {
    let rig = SimRig::new();
    let mut therm = rig.thermometer();
    let k = therm.temperature(channel, IO).expect("read");
    assert!((k - expected_k).abs() < 1e-9, "{channel:?}: {k}");
}

#[test]
fn current_relaxes_toward_the_programmed_voltage() {
    let rig = SimRig::new().with_time_constants(0.02, 0.0);
    let mut supply = rig.supply();

    supply.output_on(IO).expect("output on");
    supply.set_voltage(3.0, IO).expect("set voltage");
    std::thread::sleep(Duration::from_millis(200));

    // 10 time constants later the coil sits at V/R = 9 A.
    let i = supply.current(IO).expect("current");
    assert!((i - 9.0).abs() < 0.1, "coil current {i} not near 9 A");
    assert!(matches!(
        supply.operating_mode(IO).expect("mode"),
        OperatingMode::ConstantCurrent
    ));
}

#[test]
fn back_emf_decays_as_the_ramp_settles() {
    let rig = SimRig::new().with_time_constants(0.05, 0.0);
    let mut supply = rig.supply();
    let mut meter = rig.voltmeter();

    supply.output_on(IO).expect("output on");
    supply.set_voltage(1.5, IO).expect("set voltage");
    let early = meter.back_emf(IO).expect("early emf");
    std::thread::sleep(Duration::from_millis(500));
    let late = meter.back_emf(IO).expect("late emf");

    assert!(early > 0.5, "fresh step should show large EMF, got {early}");
    assert!(late < 0.1, "settled coil should show small EMF, got {late}");
}

#[test]
fn faa_pill_cools_as_current_builds() {
    let rig = SimRig::new().with_time_constants(0.02, 0.0);
    let mut supply = rig.supply();
    let mut therm = rig.thermometer();

    let warm = therm.temperature(StageChannel::Faa, IO).expect("warm");
    supply.output_on(IO).expect("output on");
    supply.set_voltage(3.0, IO).expect("set voltage");
    std::thread::sleep(Duration::from_millis(200));
    let cold = therm.temperature(StageChannel::Faa, IO).expect("cold");

    assert!(cold < warm, "pill did not cool: {warm} -> {cold}");
    assert!(cold > 0.0);
}

#[test]
fn select_restarts_the_settling_window() {
    let rig = SimRig::new();
    let mut therm = rig.thermometer();

    therm.select(StageChannel::Ggg, IO).expect("select");
    assert_eq!(therm.selected(), StageChannel::Ggg);
    assert!(therm.seconds_since_select() < 0.5);

    // Re-selecting the same channel must not reset the window.
    std::thread::sleep(Duration::from_millis(50));
    let before = therm.seconds_since_select();
    therm.select(StageChannel::Ggg, IO).expect("reselect");
    assert!(therm.seconds_since_select() >= before);
}

#[test]
fn unplugged_rig_reports_not_connected() {
    let rig = SimRig::new();
    let mut supply = rig.supply();
    let mut meter = rig.voltmeter();
    let mut therm = rig.thermometer();

    rig.set_connected(false);
    assert!(!supply.is_connected());
    assert!(supply.current(IO).is_err());
    assert!(supply.set_voltage(1.0, IO).is_err());
    assert!(meter.back_emf(IO).is_err());
    assert!(therm.temperature(StageChannel::Faa, IO).is_err());

    rig.set_connected(true);
    assert!(supply.current(IO).is_ok());
}

#[test]
fn supply_off_holds_the_coil_current() {
    let rig = SimRig::new().with_time_constants(0.02, 0.0);
    let mut supply = rig.supply();

    supply.output_on(IO).expect("output on");
    supply.set_voltage(1.0, IO).expect("set voltage");
    std::thread::sleep(Duration::from_millis(200));
    let before = rig.coil_current();

    supply.reset(IO).expect("reset");
    std::thread::sleep(Duration::from_millis(100));
    let after = rig.coil_current();
    assert!(
        (after - before).abs() < 0.05,
        "persistent current drifted: {before} -> {after}"
    );
}
