//! `adrctl` — command-line front end for the ADR magnet controller.

mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;

use adr_core::{CancelToken, Completion, RunOutcome};
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use run::RunReport;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    // color-eyre only affects panic/report rendering; failure to install is
    // not worth dying over.
    let _ = color_eyre::install();

    match real_main(&cli) {
        Ok(()) => {}
        Err(err) => {
            if cli.json {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            std::process::exit(exit_code_for_error(&err));
        }
    }
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("reading config {}", cli.config.display()))?;
    let cfg = adr_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", cli.config.display()))?;
    cfg.validate()?;

    init_logging(cli, &cfg.logging);

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            tracing::info!("interrupt received; stopping after the current cycle");
            cancel.cancel();
        })
        .wrap_err("installing ctrl-c handler")?;
    }

    match &cli.cmd {
        Commands::MagUp { print_runtime } => {
            let report = run::run_mag_up(&cfg, &cancel)?;
            print_report(cli, "mag_up", &report, *print_runtime);
        }
        Commands::Regulate {
            target_k,
            print_runtime,
        } => {
            let report = run::run_regulate(&cfg, *target_k, &cancel)?;
            print_report(cli, "regulate", &report, *print_runtime);
        }
        Commands::SelfCheck => {
            let report = run::self_check(&cfg)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "status": "ok",
                        "supply_mode": report.supply_mode,
                        "current_a": report.current_a,
                        "voltage_v": report.voltage_v,
                        "back_emf_v": report.back_emf_v,
                        "stage_60k": report.stage_60k,
                        "stage_3k": report.stage_3k,
                        "ggg_k": report.ggg_k,
                        "faa_k": report.faa_k,
                    })
                );
            } else {
                println!("self-check: ok");
                println!(
                    "  supply: {} at {:.3} A / {:.3} V, back-EMF {:.3} V",
                    report.supply_mode, report.current_a, report.voltage_v, report.back_emf_v
                );
                println!(
                    "  stages: 60K={:.2} K, 3K={:.2} K, GGG={:.3} K, FAA={:.3} K",
                    report.stage_60k, report.stage_3k, report.ggg_k, report.faa_k
                );
            }
        }
    }
    Ok(())
}

fn outcome_name(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed(Completion::TargetCurrentReached) => "target current reached",
        RunOutcome::Completed(Completion::VoltageFloored) => "voltage floored",
        RunOutcome::Cancelled => "cancelled",
    }
}

fn print_report(cli: &Cli, op: &str, report: &RunReport, print_runtime: bool) {
    if cli.json {
        println!(
            "{}",
            json!({
                "op": op,
                "outcome": outcome_name(report.outcome),
                "final_current_a": report.final_current_a,
                "elapsed_ms": report.elapsed.as_millis() as u64,
            })
        );
    } else {
        println!(
            "{op}: {} (final current {:.3} A)",
            outcome_name(report.outcome),
            report.final_current_a
        );
        if print_runtime {
            println!("runtime: {:.1} s", report.elapsed.as_secs_f64());
        }
    }
}

fn init_logging(cli: &Cli, log_cfg: &adr_config::Logging) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let level = log_cfg
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let registry = tracing_subscriber::registry().with(filter).with(console);

    if let Some(path) = &log_cfg.file {
        let p = std::path::Path::new(path);
        let dir = p.parent().filter(|d| !d.as_os_str().is_empty());
        let name = p.file_name().map_or("adrctl.log".into(), |n| {
            n.to_string_lossy().into_owned()
        });
        let dir = dir.unwrap_or_else(|| std::path::Path::new("."));
        let appender = match log_cfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(non_blocking))
            .init();
    } else {
        registry.init();
    }
}
