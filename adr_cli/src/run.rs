//! Run orchestration: instrument assembly, monitor wiring, loop execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adr_config::Config;
use adr_core::monitor::{MonitorCfg, TelemetryMonitor};
use adr_core::{
    AdrControl, AdrControlBuilder, CancelToken, CycleScheduler, RunOutcome, TempRecord,
    prepare_supply,
};
use adr_hardware::{SimRig, SimSupply, SimThermometer, SimVoltmeter};
use adr_traits::clock::{Clock, MonotonicClock};
use adr_traits::{MagnetVoltmeter, PowerSupply, StageChannel, StageThermometer};
use eyre::WrapErr;

pub struct RunReport {
    pub outcome: RunOutcome,
    pub final_current_a: f64,
    pub elapsed: Duration,
}

pub struct SelfCheckReport {
    pub supply_mode: String,
    pub current_a: f64,
    pub voltage_v: f64,
    pub back_emf_v: f64,
    pub stage_60k: f64,
    pub stage_3k: f64,
    pub ggg_k: f64,
    pub faa_k: f64,
}

pub fn run_mag_up(cfg: &Config, cancel: &CancelToken) -> eyre::Result<RunReport> {
    execute(cfg, cancel, |ctl| ctl.start_mag_up())
}

pub fn run_regulate(cfg: &Config, target_k: f64, cancel: &CancelToken) -> eyre::Result<RunReport> {
    execute(cfg, cancel, move |ctl| ctl.start_regulate(target_k))
}

/// Probe every instrument once and report what it answered.
pub fn self_check(cfg: &Config) -> eyre::Result<SelfCheckReport> {
    let rig = SimRig::new();
    let io = Duration::from_millis(cfg.timeouts.io_ms);
    let mut supply = rig.supply();
    let mut meter = rig.voltmeter();
    let mut therm = rig.thermometer();

    let mode = supply
        .operating_mode(io)
        .map_err(|e| eyre::eyre!("{e}"))
        .wrap_err("supply operating mode")?;
    Ok(SelfCheckReport {
        supply_mode: format!("{mode:?}"),
        current_a: read(|| supply.current(io), "supply current")?,
        voltage_v: read(|| supply.voltage(io), "supply voltage")?,
        back_emf_v: read(|| meter.back_emf(io), "magnet voltmeter")?,
        stage_60k: read(|| therm.temperature(StageChannel::Stage60K, io), "60K diode")?,
        stage_3k: read(|| therm.temperature(StageChannel::Stage3K, io), "3K diode")?,
        ggg_k: read(|| therm.temperature(StageChannel::Ggg, io), "GGG bridge")?,
        faa_k: read(|| therm.temperature(StageChannel::Faa, io), "FAA bridge")?,
    })
}

fn read<F>(mut f: F, what: &'static str) -> eyre::Result<f64>
where
    F: FnMut() -> Result<f64, Box<dyn std::error::Error + Send + Sync>>,
{
    f().map_err(|e| eyre::eyre!("{e}")).wrap_err(what)
}

type SimControl = AdrControl<SimSupply, SimVoltmeter, SimThermometer>;

fn execute<F>(cfg: &Config, cancel: &CancelToken, start: F) -> eyre::Result<RunReport>
where
    F: FnOnce(&mut SimControl) -> eyre::Result<()>,
{
    let rig = SimRig::new();
    let io = Duration::from_millis(cfg.timeouts.io_ms);

    let mut supply = rig.supply();
    prepare_supply(&mut supply, &(&cfg.limits).into(), io)?;

    // The monitor owns its own thermometer handle so the control loop never
    // waits behind a bridge settle.
    let monitor = TelemetryMonitor::spawn(
        rig.thermometer(),
        MonitorCfg {
            policy: cfg.regulate.channels,
            settle_factor: cfg.regulate.settle_factor,
            period: adr_core::util::period(cfg.cycle.period_ms),
            io,
            sentinels: (&cfg.faults).into(),
        },
        MonotonicClock,
        open_record(cfg)?,
    );

    let mut ctl = AdrControlBuilder::new()
        .supply(supply)
        .voltmeter(rig.voltmeter())
        .thermometer(rig.thermometer())
        .config(cfg)
        .build()?;
    start(&mut ctl)?;

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock);
    let scheduler = CycleScheduler::new(adr_core::util::period(cfg.cycle.period_ms), clock);
    let started = Instant::now();
    let outcome = scheduler.run(cancel, || {
        let status = ctl.step()?;
        if let Some(t) = ctl.telemetry() {
            tracing::debug!(
                current_a = t.supply_current_a,
                voltage_v = t.supply_voltage_v,
                back_emf_v = t.back_emf_v,
                "cycle"
            );
        }
        if let Some(s) = monitor.latest() {
            tracing::debug!(
                stage_60k = ?s.stage_60k,
                stage_3k = ?s.stage_3k,
                ggg_k = ?s.ggg_k,
                faa_k = ?s.faa_k,
                "stage temperatures"
            );
        }
        Ok(status)
    })?;
    if outcome == RunOutcome::Cancelled {
        ctl.stop()?;
    }

    Ok(RunReport {
        outcome,
        final_current_a: ctl.last_current(),
        elapsed: started.elapsed(),
    })
}

/// One record file per run, named by unix epoch seconds.
fn open_record(cfg: &Config) -> eyre::Result<Option<TempRecord<std::fs::File>>> {
    let Some(dir) = cfg.recording.dir.as_deref() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("creating record dir {dir}"))?;
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = std::path::Path::new(dir).join(format!("temperatures_{stamp}.tsv"));
    let file = std::fs::File::create(&path)
        .wrap_err_with(|| format!("creating record file {}", path.display()))?;
    tracing::info!(path = %path.display(), "temperature record started");
    Ok(Some(TempRecord::new(file)))
}
