use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adr_core::{AdrControlBuilder, Completion, ControllerMode, CycleStatus};
use rstest::rstest;
use adr_traits::clock::test_clock::TestClock;
use adr_traits::{MagnetVoltmeter, OperatingMode, PowerSupply, StageChannel, StageThermometer};

/// Shared rig state: the test mutates it between cycles, the instrument
/// handles read it.
struct Shared {
    v: f64,
    i: f64,
    emf: f64,
    faa_k: f64,
    stage3_k: f64,
    since_select_s: f64,
    settle_s: f64,
    faa_reads: usize,
    commands: Vec<f64>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            v: 0.0,
            i: 0.0,
            emf: 0.0,
            faa_k: 0.1,
            stage3_k: 3.2,
            since_select_s: 100.0,
            settle_s: 0.3,
            faa_reads: 0,
            commands: Vec::new(),
        }
    }
}

type Rig = Arc<Mutex<Shared>>;

struct RigSupply(Rig);
struct RigEmf(Rig);
struct RigTherm(Rig);

impl PowerSupply for RigSupply {
    fn current(&mut self, _t: Duration) -> Result<f64, Box<dyn Error + Send + Sync>> {
        Ok(self.0.lock().unwrap().i)
    }
    fn voltage(&mut self, _t: Duration) -> Result<f64, Box<dyn Error + Send + Sync>> {
        Ok(self.0.lock().unwrap().v)
    }
    fn set_voltage(&mut self, v: f64, _t: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut s = self.0.lock().unwrap();
        s.v = v;
        s.commands.push(v);
        Ok(())
    }
    fn set_current(&mut self, _a: f64, _t: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn output_on(&mut self, _t: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn reset(&mut self, _t: Duration) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn operating_mode(
        &mut self,
        _t: Duration,
    ) -> Result<OperatingMode, Box<dyn Error + Send + Sync>> {
        Ok(OperatingMode::ConstantVoltage)
    }
    fn is_connected(&self) -> bool {
        true
    }
}

impl MagnetVoltmeter for RigEmf {
    fn back_emf(&mut self, _t: Duration) -> Result<f64, Box<dyn Error + Send + Sync>> {
        Ok(self.0.lock().unwrap().emf)
    }
}

impl StageThermometer for RigTherm {
    fn temperature(
        &mut self,
        channel: StageChannel,
        _t: Duration,
    ) -> Result<f64, Box<dyn Error + Send + Sync>> {
        let mut s = self.0.lock().unwrap();
        match channel {
            StageChannel::Faa => {
                s.faa_reads += 1;
                Ok(s.faa_k)
            }
            StageChannel::Stage3K => Ok(s.stage3_k),
            other => Err(Box::new(std::io::Error::other(format!(
                "channel {other:?} not wired"
            )))),
        }
    }
    fn select(
        &mut self,
        _c: StageChannel,
        _t: Duration,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn selected(&self) -> StageChannel {
        StageChannel::Faa
    }
    fn seconds_since_select(&self) -> f64 {
        self.0.lock().unwrap().since_select_s
    }
    fn settling_time(&mut self, _t: Duration) -> Result<f64, Box<dyn Error + Send + Sync>> {
        Ok(self.0.lock().unwrap().settle_s)
    }
}

fn build(rig: &Rig, clock: &Arc<TestClock>) -> adr_core::AdrControl<RigSupply, RigEmf, RigTherm> {
    AdrControlBuilder::new()
        .supply(RigSupply(Arc::clone(rig)))
        .voltmeter(RigEmf(Arc::clone(rig)))
        .thermometer(RigTherm(Arc::clone(rig)))
        .clock(Arc::clone(clock) as _)
        .build()
        .expect("build control")
}

#[test]
fn cooling_overshoot_is_clamped_by_the_emf_band_and_slew() {
    let rig: Rig = Arc::new(Mutex::new(Shared {
        v: 1.5,
        i: 4.0,
        emf: 0.08,
        faa_k: 0.05,
        ..Shared::default()
    }));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start");
    clock.advance(Duration::from_secs(1));
    assert_eq!(ctl.step().expect("step"), CycleStatus::Running);

    // Raw proposal kp*(0.1-0.05) - kd*0.08 = 0.0444 V; the EMF band caps it
    // at 0.02 V and the dV/dt limit at 0.008 V over the 1 s cycle.
    let s = rig.lock().unwrap();
    assert_eq!(s.commands.len(), 1);
    assert!((s.commands[0] - 1.508).abs() < 1e-9, "got {}", s.commands[0]);
}

#[test]
fn shedding_the_last_of_the_voltage_completes_the_run() {
    let rig: Rig = Arc::new(Mutex::new(Shared {
        v: 0.002,
        i: 0.01,
        emf: 0.01,
        faa_k: 0.2,
        ..Shared::default()
    }));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start");
    clock.advance(Duration::from_secs(1));
    let status = ctl.step().expect("step");
    assert_eq!(status, CycleStatus::Complete(Completion::VoltageFloored));
    assert_eq!(ctl.mode(), ControllerMode::Idle);

    let s = rig.lock().unwrap();
    assert_eq!(s.commands.as_slice(), &[0.0]);
}

#[test]
fn regulate_and_mag_up_are_mutually_exclusive() {
    let rig: Rig = Arc::new(Mutex::new(Shared::default()));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start regulate");
    assert!(ctl.start_mag_up().is_err());
    assert_eq!(ctl.mode(), ControllerMode::Regulating);
    ctl.stop().expect("stop");

    ctl.start_mag_up().expect("start mag up");
    assert!(ctl.start_regulate(0.1).is_err());
    assert_eq!(ctl.mode(), ControllerMode::MaggingUp);
}

#[rstest]
#[case(-1.0)]
#[case(0.0)]
#[case(f64::NAN)]
#[case(100.0)]
fn target_outside_the_usable_range_is_rejected(#[case] target_k: f64) {
    let rig: Rig = Arc::new(Mutex::new(Shared::default()));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    assert!(ctl.start_regulate(target_k).is_err());
    assert_eq!(ctl.mode(), ControllerMode::Idle);
}

#[test]
fn bridge_fault_code_at_start_falls_back_to_the_diode() {
    // 45.0 K is the bridge out-of-range code; the seed must come from the
    // 3 K diode instead, producing a lowering proposal against a 0.1 K target.
    let rig: Rig = Arc::new(Mutex::new(Shared {
        v: 1.5,
        i: 4.0,
        faa_k: 45.0,
        stage3_k: 3.2,
        since_select_s: 0.0,
        ..Shared::default()
    }));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start");
    clock.advance(Duration::from_secs(1));
    assert_eq!(ctl.step().expect("step"), CycleStatus::Running);

    let s = rig.lock().unwrap();
    assert_eq!(s.commands.len(), 1);
    assert!(
        s.commands[0] < 1.5,
        "diode-seeded proposal should lower the voltage, got {}",
        s.commands[0]
    );
}

#[test]
fn unsettled_bridge_is_not_resampled() {
    let rig: Rig = Arc::new(Mutex::new(Shared {
        v: 1.5,
        i: 4.0,
        faa_k: 0.1,
        since_select_s: 1.0, // below 10 * 0.3 s
        ..Shared::default()
    }));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start");
    let seeded = rig.lock().unwrap().faa_reads;
    for _ in 0..3 {
        clock.advance(Duration::from_secs(1));
        ctl.step().expect("step");
    }
    assert_eq!(
        rig.lock().unwrap().faa_reads,
        seeded,
        "bridge was resampled before its filter settled"
    );
}

#[test]
fn settled_bridge_is_resampled_each_cycle() {
    let rig: Rig = Arc::new(Mutex::new(Shared {
        v: 1.5,
        i: 4.0,
        faa_k: 0.1,
        since_select_s: 100.0,
        ..Shared::default()
    }));
    let clock = Arc::new(TestClock::new());
    let mut ctl = build(&rig, &clock);

    ctl.start_regulate(0.1).expect("start");
    let seeded = rig.lock().unwrap().faa_reads;
    for _ in 0..3 {
        clock.advance(Duration::from_secs(1));
        ctl.step().expect("step");
    }
    assert_eq!(rig.lock().unwrap().faa_reads, seeded + 3);
}
