//! # Trajectory Execution
//!
//! The slave mode control loop. Each iteration evaluates the trajectory at the current
//! trajectory time, sends the target pose to the controller, and advances the trajectory time by
//! the measured round trip time scaled by `speed_scale`. The loop cadence is therefore set by the
//! controller's response time, there is no other rate limiting.
//!
//! Every iteration adds exactly one record to the telemetry recorder, whether or not the
//! controller accepted the command. What happens after a failed command is set by the
//! [`FailurePolicy`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    hw_link::CommandError,
    telemetry::{SampleStatus, TelemetryRecord},
};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use state::{LoopState, TrajExec};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Control loop configuration, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Ratio of trajectory time to measured round trip time. Values below one play the
    /// trajectory slower than real time.
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Emit a debug trace every this many iterations, `0` disables the trace.
    #[serde(default = "default_log_every_n")]
    pub log_every_n: usize,
}

/// Statistics of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// `false` if the run stopped before the end of the trajectory.
    pub complete: bool,

    pub iterations: usize,

    pub num_failed: usize,

    pub num_retried: usize,

    /// Trajectory time reached at the end of the loop, may exceed the trajectory duration.
    ///
    /// Units: seconds
    pub final_traj_time_s: f64,

    /// Units: seconds
    pub traj_duration_s: f64,

    /// Units: seconds
    pub total_latency_s: f64,

    /// Units: seconds
    pub mean_latency_s: f64,

    /// Units: seconds
    pub max_latency_s: f64,

    /// Largest distance between a commanded pose and the pose the controller reported, `None`
    /// if no command succeeded.
    ///
    /// Units: degrees
    pub max_tracking_error_deg: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Action taken when the controller fails to execute a slave move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failed sample and stop the run.
    Abort,

    /// Record the failed sample and carry on with the trajectory.
    Skip,

    /// Send the same pose again once. If that also fails record the failed sample and carry on.
    RetryOnce,
}

#[derive(Debug, thiserror::Error)]
pub enum TrajExecError {
    #[error("Speed scale must be finite and positive, got {0}")]
    InvalidSpeedScale(f64),

    #[error("The trajectory has {traj} joints but the controller expects {link}")]
    DimensionMismatch { traj: usize, link: usize },

    #[error("Slave move {iteration} failed at trajectory time {traj_time_s:.3} s: {source}")]
    CommandFailed {
        iteration: usize,
        traj_time_s: f64,
        source: CommandError,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            speed_scale: default_speed_scale(),
            failure_policy: FailurePolicy::default(),
            log_every_n: default_log_every_n(),
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Skip
    }
}

impl RunSummary {
    /// Summarise the records of a run which stopped early.
    ///
    /// The records don't keep the commanded poses, so no tracking error is available.
    pub fn partial(records: &[TelemetryRecord], traj_duration_s: f64) -> Self {
        let total_latency_s: f64 = records.iter().map(|r| r.latency_s).sum();

        Self {
            complete: false,
            iterations: records.len(),
            num_failed: records.iter().filter(|r| r.is_failed()).count(),
            num_retried: records
                .iter()
                .filter(|r| r.status == SampleStatus::Retried)
                .count(),
            final_traj_time_s: records.last().map_or(0.0, |r| r.traj_time_s),
            traj_duration_s,
            total_latency_s,
            mean_latency_s: match records.len() {
                0 => 0.0,
                n => total_latency_s / n as f64,
            },
            max_latency_s: records.iter().map(|r| r.latency_s).fold(0.0, f64::max),
            max_tracking_error_deg: None,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iterations ({} failed, {} retried), trajectory time {:.3}/{:.3} s, \
            latency mean {:.2} ms max {:.2} ms",
            self.iterations,
            self.num_failed,
            self.num_retried,
            self.final_traj_time_s,
            self.traj_duration_s,
            self.mean_latency_s * 1e3,
            self.max_latency_s * 1e3
        )?;

        if let Some(e) = self.max_tracking_error_deg {
            write!(f, ", max tracking error {:.4} deg", e)?;
        }

        if !self.complete {
            write!(f, " (incomplete)")?;
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_speed_scale() -> f64 {
    0.5
}

fn default_log_every_n() -> usize {
    50
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: ExecConfig = toml::from_str("speed_scale = 0.25").unwrap();

        assert_eq!(config.speed_scale, 0.25);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.log_every_n, 50);

        let config: ExecConfig = toml::from_str("failure_policy = \"retry_once\"").unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::RetryOnce);
        assert_eq!(config, ExecConfig {
            failure_policy: FailurePolicy::RetryOnce,
            ..Default::default()
        });
    }

    #[test]
    fn test_partial_summary() {
        use comms_if::eqpt::ReportedPose;

        let record = |s: f64, latency_s: f64, status: SampleStatus| TelemetryRecord {
            traj_time_s: s,
            pose: ReportedPose([0.0; 6]),
            latency_s,
            status,
        };

        let records = vec![
            record(0.0, 0.01, SampleStatus::Ok),
            record(0.005, 0.03, SampleStatus::Retried),
            record(0.02, 0.02, SampleStatus::Failed {
                reason: "rejected".into(),
            }),
        ];

        let summary = RunSummary::partial(&records, 2.0);

        assert!(!summary.complete);
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.num_failed, 1);
        assert_eq!(summary.num_retried, 1);
        assert_eq!(summary.final_traj_time_s, 0.02);
        assert_eq!(summary.max_latency_s, 0.03);
        assert!((summary.mean_latency_s - 0.02).abs() < 1e-12);
        assert!(summary.max_tracking_error_deg.is_none());
        assert!(summary.to_string().ends_with("(incomplete)"));

        let empty = RunSummary::partial(&[], 2.0);
        assert_eq!(empty.iterations, 0);
        assert_eq!(empty.mean_latency_s, 0.0);
    }
}
