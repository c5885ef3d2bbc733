//! # Slave Executable Parameters
//!
//! This module provides parameters for the slave trajectory executable, loaded from
//! `params/slv_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{hw_link::NetLinkParams, traj_exec::ExecConfig};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlvExecParams {
    /// Minimum level of log messages, one of `trace`, `debug`, `info`, `warn` or `error`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Control loop configuration
    #[serde(default)]
    pub exec: ExecConfig,

    /// Connection to the real controller
    pub link: NetLinkParams,

    /// Simulated controller used with `--sim`
    #[serde(default)]
    pub sim: SimParams,

    /// Moves performed before entering slave mode
    #[serde(default)]
    pub setup: SetupParams,

    #[serde(default)]
    pub output: OutputParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Round trip time of each simulated request.
    ///
    /// Units: seconds
    pub latency_s: f64,

    /// Indices of the slave moves the simulated controller rejects
    #[serde(default)]
    pub failures: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupParams {
    /// External speed override set before any move.
    ///
    /// Units: percent
    pub ext_speed_pct: f64,

    /// Speed of the joint move to the start of the trajectory.
    ///
    /// Units: percent
    pub approach_speed_pct: f64,

    /// Wait after the approach move before entering slave mode.
    ///
    /// Units: seconds
    pub settle_time_s: f64,

    /// Record the controller's own log while the trajectory runs
    pub ctrl_log: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputParams {
    /// Stem of the telemetry file names
    pub stem: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            latency_s: 0.004,
            failures: Vec::new(),
        }
    }
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            ext_speed_pct: 100.0,
            approach_speed_pct: 25.0,
            settle_time_s: 3.0,
            ctrl_log: true,
        }
    }
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            stem: String::from("slv_traj"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_exec::FailurePolicy;

    #[test]
    fn test_load_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slv_exec.toml");
        std::fs::write(
            &path,
            r#"
            [exec]
            speed_scale = 0.5
            failure_policy = "abort"

            [link]
            endpoint = "tcp://localhost:5020"
            num_joints = 6

            [sim]
            latency_s = 0.01
            failures = [3]
            "#,
        )
        .unwrap();

        let params: SlvExecParams = util::params::load_from_path(&path).unwrap();

        assert_eq!(params.log_level, "info");
        assert_eq!(params.exec.failure_policy, FailurePolicy::Abort);
        assert_eq!(params.link.num_joints, 6);
        assert_eq!(params.link.recv_timeout_ms, -1);
        assert_eq!(params.sim.failures, vec![3]);
        assert_eq!(params.setup.approach_speed_pct, 25.0);
        assert_eq!(params.output.stem, "slv_traj");
    }
}
