use ppbp::config::{self, Configuration};
use ppbp::export;
use ppbp::stats::format_throughput;
use ppbp::structs::*;
use ppbp::transport::{self, MemorySink};
use ppbp::{PpbpApplication, Simulation};
mod cmd;

use anyhow::{anyhow, Context};
use clap::Parser;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// The entry point of the application.
///
/// Errors in the configuration are reported and end the process with a non-zero exit code.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    match args.command {
        cmd::Command::Run {
            overrides,
            duration,
            start,
            transport: kind,
            outfile,
            verbose,
        } => {
            let mut config = load(&overrides)?;
            if let Some(start) = start {
                config.window.start = humantime::parse_duration(&start)
                    .with_context(|| format!("Invalid start time \"{start}\""))?;
            }
            if let Some(d) = duration {
                let d = humantime::parse_duration(&d)
                    .with_context(|| format!("Invalid duration \"{d}\""))?;
                config.window.stop = config.window.start.saturating_add(d);
            }
            config.window.validate()?;
            if let Some(s) = config.application.seed {
                log::info!("Generating with seed {s}");
            }

            let factory = match kind {
                cmd::TransportKind::Memory => MemorySink::new().factory(),
                cmd::TransportKind::Socket => transport::socket_factory(),
            };
            let mut app = PpbpApplication::new(config.application.clone(), factory)?;

            let mut threads = vec![];
            if let Some(outfile) = outfile {
                let rx = app.subscribe_tx();
                threads.push(
                    thread::Builder::new()
                        .name("Trace-export".into())
                        .spawn(move || export::run_export(rx, &outfile).map(|_| ()))?,
                );
            }
            if verbose {
                let rx = app.subscribe_tx();
                let remote = config.application.remote;
                threads.push(
                    thread::Builder::new()
                        .name("Tx-trace".into())
                        .spawn(move || {
                            log_tx(rx, remote.to_string());
                            Ok::<(), std::io::Error>(())
                        })?,
                );
            }

            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                log::info!("Ctrl-C detected");
                r.store(false, Ordering::SeqCst);
            })?;

            let mut simulation = Simulation::with_running_flag(app, running);
            simulation.run(config.window);
            let stats = simulation.app().stats().clone();
            let end = simulation.now();
            // closes the trace channels
            drop(simulation);

            for t in threads {
                t.join()
                    .map_err(|_| anyhow!("A trace thread panicked"))?
                    .context("Trace export failed")?;
            }

            log::info!(
                "{} packets ({} bytes) sent from {} bursts, {} not delivered",
                stats.packets_sent,
                stats.bytes_sent,
                stats.bursts_started,
                stats.send_failures
            );
            log::info!(
                "Average throughput: {} (peak of {} active bursts)",
                format_throughput(stats.throughput(end)),
                stats.peak_active_bursts
            );
            if let Some(rate) = config.application.expected_rate() {
                log::info!("Expected throughput: {}", format_throughput(rate));
            }
        }
        cmd::Command::Check { overrides } => {
            let config = load(&overrides)?;
            let app = &config.application;
            println!("Pareto shape: {:.3}", app.shape());
            match app.time_slot() {
                Some(slot) => println!("Time slot: {slot:.6} s"),
                None => println!("Time slot: undefined (infinite mean burst length)"),
            }
            match (app.expected_active_bursts(), app.expected_rate()) {
                (Some(n), Some(rate)) => {
                    println!("Expected active bursts: {n:.3}");
                    println!("Expected rate: {}", format_throughput(rate));
                }
                _ => println!("Expected rate: undefined (infinite mean)"),
            }
            println!(
                "Window: {} to {}",
                humantime::format_duration(config.window.start),
                humantime::format_duration(config.window.stop)
            );
        }
    }
    Ok(())
}

/// Loads the configuration file (if any) and applies the command line overrides
fn load(overrides: &cmd::Overrides) -> anyhow::Result<Configuration> {
    let mut config = match &overrides.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Cannot load {}", path.display()))?,
        None => Configuration::default(),
    };
    overrides.apply(&mut config);
    config.application.validate()?;
    config.window.validate()?;
    Ok(config)
}

fn log_tx(rx: Receiver<Packet>, remote: String) {
    for p in rx.iter() {
        log::info!(
            "At time {:.6}s PPBP sent {} bytes to {} ({} active bursts)",
            p.timestamp.as_secs_f64(),
            p.size,
            remote,
            p.active_bursts
        );
    }
}
