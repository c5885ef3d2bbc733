//! # Slave Mode Controller Commands
//!
//! Requests sent from the trajectory executable to the robot controller, and the responses the
//! controller sends back. Every request gets exactly one response.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of values in a pose reported by the controller.
pub const REPORTED_POSE_WIDTH: usize = 6;

/// Rejection code: the request could not be parsed
pub const REJECT_MALFORMED: i32 = -1;

/// Rejection code: the pose has the wrong number of joints
pub const REJECT_BAD_DIMENSION: i32 = -3;

/// Rejection code: a value is out of range
pub const REJECT_BAD_VALUE: i32 = -4;

/// Rejection code: a slave move was sent outside slave mode
pub const REJECT_NOT_IN_SLAVE_MODE: i32 = -5;

/// Rejection code: a normal mode request was sent in slave mode
pub const REJECT_IN_SLAVE_MODE: i32 = -6;

/// Rejection code: failure injected by a simulated controller
pub const REJECT_INJECTED: i32 = -100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A joint pose in the controller's wire units.
///
/// Units: degrees
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandPose {
    pub joints_deg: Vec<f64>,
}

/// The pose reported back by the controller after a slave move.
///
/// Units: degrees
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ReportedPose(pub [f64; REPORTED_POSE_WIDTH]);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Controller execution modes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlvMode {
    /// Controller runs its own stored jobs, slave moves are rejected.
    Normal,

    /// Synchronous slave mode, each slave move blocks until the controller has taken the
    /// position and returns the current pose.
    Slave,
}

/// Requests sent to the controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum SlvRequest {
    /// Check the controller is alive.
    Ping,

    /// Set the external speed override.
    SetExtSpeed { speed_pct: f64 },

    /// Perform a (blocking) joint-interpolated move to the given pose. Only valid in normal mode.
    MoveJoints { pose: CommandPose, speed_pct: f64 },

    /// Start or stop the controller's internal control log.
    SetCtrlLog { enabled: bool },

    /// Switch the controller into the given mode.
    ChangeMode(SlvMode),

    /// Command the given pose in slave mode.
    SlvMove(CommandPose),
}

/// Responses sent by the controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum SlvResponse {
    /// Request accepted.
    Ack,

    /// Slave move accepted, contains the pose reported by the controller.
    Pose(ReportedPose),

    /// Request rejected by the controller.
    Rejected { code: i32, reason: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SlvMode {
    /// The numeric mode code used by the controller.
    pub fn code(&self) -> u32 {
        match self {
            SlvMode::Normal => 0,
            SlvMode::Slave => 258,
        }
    }
}

impl std::fmt::Display for SlvMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl ReportedPose {
    /// A pose with every value set to NaN, used where no pose could be read.
    pub fn nan() -> Self {
        Self([std::f64::NAN; REPORTED_POSE_WIDTH])
    }
}
