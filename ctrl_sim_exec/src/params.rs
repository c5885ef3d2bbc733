//! # Controller Simulator Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CtrlSimExecParams {
    /// Endpoint the request socket binds to
    pub endpoint: String,

    /// Minimum level of log messages
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub robot: RobotParams,
}

#[derive(Debug, Deserialize)]
pub struct RobotParams {
    pub num_joints: usize,

    /// Time taken to answer each request.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub latency_ms: u64,

    /// Reject every Nth slave move, `0` never rejects
    #[serde(default)]
    pub reject_every_n: usize,
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_log_level() -> String {
    String::from("info")
}
