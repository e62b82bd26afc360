// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for lift-sim.
//!
//! Config is loaded from the `[lift-sim]` section of `lift-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./lift-rs.toml`
//! 3. `~/.config/lift-rs/lift-rs.toml`
//! 4. `/etc/lift-rs/lift-rs.toml`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lift_app::{ConfigError, ConfigFile};
use lift_core::lift::state::LiftMode;
use lift_core::phase::{ControllerConfig, Decision, ExponentialBackoff, FixedRewait};

/// Top-level simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// General settings
    pub general: GeneralConfig,
    /// The lift ride to request
    pub phase: PhaseConfig,
    /// Controller timing and retry behavior
    pub behavior: BehaviorConfig,
    /// Simulated lift
    pub lift: LiftConfig,
    /// Scripted boarding watchdog
    pub watchdog: WatchdogConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Agent name
    pub agent: String,
    /// Lift session id; defaults to the agent name
    pub requester_id: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            agent: "agv-1".to_string(),
            requester_id: None,
        }
    }
}

/// The requested ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Level to ride to
    pub destination: String,
    /// Agent is already inside the cabin
    pub inside: bool,
    /// Plan the phase belongs to
    pub plan_id: u64,
    /// Expected phase duration in seconds, for reporting only
    pub expected_duration_secs: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            destination: "L2".to_string(),
            inside: false,
            plan_id: 1,
            expected_duration_secs: 30,
        }
    }
}

/// Controller timing and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Republish interval for an unacknowledged call in milliseconds
    pub publish_interval_ms: u64,
    /// Interval between watchdog re-checks in milliseconds
    pub rewait_ms: u64,
    /// Maximum retry attempts for a failed call publish
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub retry_max_delay_ms: u64,
    /// Telemetry resubscription attempts before the phase fails
    pub resubscribe_attempts: u32,
    /// Unanswered watchdog checks before the phase reports degraded
    pub degraded_after: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 1000,
            rewait_ms: 5000,
            max_retries: 5,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5000,
            resubscribe_attempts: 3,
            degraded_after: 3,
        }
    }
}

impl BehaviorConfig {
    pub fn controller_config(&self) -> ControllerConfig {
        let max_delay = Duration::from_millis(self.retry_max_delay_ms);
        ControllerConfig {
            publish_interval: Duration::from_millis(self.publish_interval_ms),
            retry: Arc::new(ExponentialBackoff::new(
                self.max_retries,
                Duration::from_millis(self.retry_base_delay_ms),
                max_delay,
            )),
            resubscribe: Arc::new(ExponentialBackoff::new(
                self.resubscribe_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
                max_delay,
            )),
            rewait: Arc::new(FixedRewait::new(
                Duration::from_millis(self.rewait_ms),
                self.degraded_after,
            )),
        }
    }
}

/// Simulated lift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftConfig {
    /// Lift name
    pub name: String,
    /// Served levels, bottom to top
    pub levels: Vec<String>,
    /// Level the cabin starts at
    pub initial_level: String,
    /// Operating mode reported in telemetry
    pub mode: LiftMode,
    /// Travel time between adjacent levels in milliseconds
    pub travel_ms_per_level: u64,
    /// Door opening or closing time in milliseconds
    pub door_ms: u64,
    /// Telemetry period in milliseconds
    pub telemetry_interval_ms: u64,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            name: "LIFT-1".to_string(),
            levels: vec!["L1".to_string(), "L2".to_string(), "L3".to_string()],
            initial_level: "L1".to_string(),
            mode: LiftMode::Agv,
            travel_ms_per_level: 2000,
            door_ms: 1000,
            telemetry_interval_ms: 250,
        }
    }
}

/// Scripted boarding watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Whether a watchdog arbitrates boarding
    pub enabled: bool,
    /// Decisions handed out in order; `clear` once exhausted
    pub decisions: Vec<Decision>,
    /// Answer delay in milliseconds
    pub delay_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            decisions: vec![Decision::Hold, Decision::Clear],
            delay_ms: 300,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        if self.general.agent.trim().is_empty() {
            return Err("[general].agent must not be empty".to_string());
        }

        if self.behavior.publish_interval_ms == 0 {
            return Err("[behavior].publish_interval_ms must be > 0".to_string());
        }
        if self.behavior.rewait_ms == 0 {
            return Err("[behavior].rewait_ms must be > 0".to_string());
        }
        if self.behavior.retry_base_delay_ms == 0 {
            return Err("[behavior].retry_base_delay_ms must be > 0".to_string());
        }
        if self.behavior.retry_max_delay_ms < self.behavior.retry_base_delay_ms {
            return Err(
                "[behavior].retry_max_delay_ms must be >= retry_base_delay_ms".to_string(),
            );
        }

        if self.lift.name.trim().is_empty() {
            return Err("[lift].name must not be empty".to_string());
        }
        if self.lift.levels.is_empty() {
            return Err("[lift].levels must list at least one level".to_string());
        }
        if !self.lift.levels.contains(&self.lift.initial_level) {
            return Err(format!(
                "[lift].initial_level '{}' is not one of [lift].levels",
                self.lift.initial_level
            ));
        }
        if self.lift.telemetry_interval_ms == 0 {
            return Err("[lift].telemetry_interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load_from_default_paths()
    }

    /// Generate an example configuration wrapped under the `[lift-sim]`
    /// section header, suitable for use in a combined `lift-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "lift-sim")]
            inner: SimConfig,
        }
        let example = SimConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
                ..GeneralConfig::default()
            },
            ..SimConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for SimConfig {
    fn section_key() -> &'static str {
        "lift-sim"
    }
}
