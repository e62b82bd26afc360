// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod executor;
mod sim_lift;
mod watchdog;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use lift_app::{init_logging, normalize_name};
use lift_core::phase::{PhaseState, StatusMsg};
use lift_core::{ActivePhase, AgentContext, DynResult, Located, PendingPhase, PhaseData};

use config::SimConfig;
use executor::LoggingExecutor;
use sim_lift::SimLift;
use watchdog::ScriptedArbiter;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - lift request phase simulator");
const SHUTDOWN_GRACE_MS: u64 = 200;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Lift to request (must match [lift].name)
    #[arg(short = 'l', long = "lift")]
    lift: Option<String>,
    /// Level to ride to
    #[arg(short = 'd', long = "destination")]
    destination: Option<String>,
    /// Agent starts inside the cabin
    #[arg(long = "inside")]
    inside: bool,
    /// Print status updates as JSON lines
    #[arg(long = "json")]
    json: bool,
}

/// Ride parameters after merging config file and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedPhase {
    lift: String,
    destination: String,
    located: Located,
}

fn resolve_phase(cli: &Cli, cfg: &SimConfig) -> DynResult<ResolvedPhase> {
    let lift = match cli.lift.as_deref() {
        Some(name) => normalize_name(name),
        None => cfg.lift.name.clone(),
    };
    if lift != cfg.lift.name {
        return Err(format!(
            "Unknown lift: {} (simulated: {})",
            lift, cfg.lift.name
        )
        .into());
    }

    let destination = match cli.destination.as_deref() {
        Some(level) => normalize_name(level),
        None => cfg.phase.destination.clone(),
    };
    let located = if cli.inside || cfg.phase.inside {
        Located::Inside
    } else {
        Located::Outside
    };

    Ok(ResolvedPhase {
        lift,
        destination,
        located,
    })
}

fn build_context(
    cfg: &SimConfig,
    lift: Arc<SimLift>,
    executor: Arc<LoggingExecutor>,
) -> Arc<AgentContext> {
    let mut context = AgentContext::new(cfg.general.agent.clone(), lift, executor);
    if let Some(requester_id) = &cfg.general.requester_id {
        context = context.with_requester_id(requester_id.clone());
    }
    if cfg.watchdog.enabled {
        context = context.with_watchdog(Arc::new(ScriptedArbiter::new(&cfg.watchdog)));
    }
    Arc::new(context)
}

fn start_phase(
    cfg: &SimConfig,
    resolved: &ResolvedPhase,
    context: Arc<AgentContext>,
) -> DynResult<ActivePhase> {
    let expected_finish =
        SystemTime::now() + Duration::from_secs(cfg.phase.expected_duration_secs);
    let data = PhaseData::new(expected_finish, resolved.located, cfg.phase.plan_id);
    let mut pending = PendingPhase::new(
        context,
        resolved.lift.clone(),
        resolved.destination.clone(),
        data,
    )
    .with_config(cfg.behavior.controller_config());

    info!(
        "{} (expected {}s)",
        pending.description(),
        pending.estimate_phase_duration().as_secs()
    );
    Ok(pending.begin()?)
}

fn format_status(msg: &StatusMsg, json: bool) -> DynResult<String> {
    if json {
        return Ok(serde_json::to_string(msg)?);
    }
    Ok(format!("[{}] {}: {}", msg.state, msg.phase, msg.text))
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", SimConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = SimConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        SimConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid simulator configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let resolved = resolve_phase(&cli, &cfg)?;
    info!(
        "Starting lift-sim (agent: {}, lift: {}, levels: {})",
        cfg.general.agent,
        cfg.lift.name,
        cfg.lift.levels.join(", ")
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (lift, lift_handle) = SimLift::spawn(&cfg.lift, shutdown_rx);
    let executor = Arc::new(LoggingExecutor::new());
    let context = build_context(&cfg, lift, executor.clone());

    let phase = start_phase(&cfg, &resolved, context)?;
    let mut status = phase.observe();
    let mut outcome = None;
    loop {
        tokio::select! {
            msg = status.recv() => match msg {
                Some(msg) => {
                    println!("{}", format_status(&msg, cli.json)?);
                    if msg.state.is_terminal() {
                        outcome = Some(msg.state);
                    }
                }
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, cancelling lift request");
                phase.cancel();
            }
        }
    }

    // Give the end-of-session request time to reach the lift.
    tokio::time::sleep(Duration::from_millis(SHUTDOWN_GRACE_MS)).await;
    let _ = shutdown_tx.send(true);
    let _ = lift_handle.await;

    if let Some(residual) = executor.take_residual() {
        info!(
            "Plan {} continues{}",
            residual.plan_id,
            if residual.resume_itinerary.is_some() {
                " with its stored itinerary"
            } else {
                ""
            }
        );
    }

    match outcome {
        Some(PhaseState::Completed) => Ok(()),
        Some(PhaseState::Cancelled) => {
            warn!("Lift request cancelled");
            Ok(())
        }
        Some(state) => Err(format!("Lift request ended {}", state).into()),
        None => Err("Lift request ended without a final status".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lift_core::lift::LiftTransport;
    use lift_core::phase::{Decision, LiftPhaseState};

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("lift-sim").chain(args.iter().copied()))
    }

    fn fast_config() -> SimConfig {
        let mut cfg = SimConfig::default();
        cfg.lift.travel_ms_per_level = 500;
        cfg.lift.door_ms = 200;
        cfg.lift.telemetry_interval_ms = 100;
        cfg.behavior.rewait_ms = 1000;
        cfg.watchdog.delay_ms = 50;
        cfg
    }

    #[test]
    fn test_resolve_phase_prefers_cli() {
        let cfg = SimConfig::default();
        let resolved = resolve_phase(&cli(&["--destination", "L3", "--inside"]), &cfg).unwrap();
        assert_eq!(resolved.lift, "LIFT-1");
        assert_eq!(resolved.destination, "L3");
        assert_eq!(resolved.located, Located::Inside);

        let resolved = resolve_phase(&cli(&[]), &cfg).unwrap();
        assert_eq!(resolved.destination, "L2");
        assert_eq!(resolved.located, Located::Outside);
    }

    #[test]
    fn test_resolve_phase_rejects_unknown_lift() {
        let cfg = SimConfig::default();
        let err = resolve_phase(&cli(&["--lift", "LIFT-9"]), &cfg).unwrap_err();
        assert!(err.to_string().contains("Unknown lift"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ride_with_hold_then_clear() {
        let cfg = fast_config();
        let resolved = resolve_phase(&cli(&[]), &cfg).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (lift, lift_handle) = SimLift::spawn(&cfg.lift, shutdown_rx);
        let mut telemetry = lift.subscribe(&cfg.lift.name).unwrap();
        let executor = Arc::new(LoggingExecutor::new());
        let context = build_context(&cfg, lift, executor.clone());

        let phase = start_phase(&cfg, &resolved, context).unwrap();
        let msgs = phase.observe().collect().await;

        let last = msgs.last().unwrap();
        assert_eq!(last.state, PhaseState::Completed);
        assert_eq!(last.rewaits, 1);
        assert!(msgs
            .iter()
            .any(|m| m.phase == LiftPhaseState::Rendezvous(Decision::Hold)));
        assert!(format_status(last, false).unwrap().starts_with("[completed]"));
        assert!(format_status(last, true).unwrap().contains("\"completed\""));

        // The hand-off releases the session.
        let released = loop {
            let state = telemetry.recv().await.unwrap();
            if state.session_id.is_empty() && state.current_level == "L2" {
                break state;
            }
        };
        assert_eq!(released.current_level, "L2");
        assert_eq!(executor.take_residual().unwrap().plan_id, 1);

        shutdown_tx.send(true).unwrap();
        lift_handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ride_to_unserved_level_fails() {
        let mut cfg = fast_config();
        cfg.watchdog.enabled = false;
        let resolved = resolve_phase(&cli(&["--destination", "L7"]), &cfg).unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (lift, _lift_handle) = SimLift::spawn(&cfg.lift, shutdown_rx);
        let context = build_context(&cfg, lift, Arc::new(LoggingExecutor::new()));

        let phase = start_phase(&cfg, &resolved, context).unwrap();
        let msgs = phase.observe().collect().await;
        assert_eq!(msgs.last().unwrap().state, PhaseState::Failed);
    }
}
