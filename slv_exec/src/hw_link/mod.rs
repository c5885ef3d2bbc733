//! # Hardware Link
//!
//! This module abstracts the connection to the robot controller. The control loop is written
//! against the [`HardwareLink`] trait, so it can be run against the real controller over the
//! network ([`NetLink`]) or against an in-process simulation ([`SimLink`]).
//!
//! Slave moves can only be sent through a [`SlaveSession`], which holds the controller in slave
//! mode for as long as it lives.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

#[cfg(feature = "net")]
mod net_link;
mod session;
mod sim_link;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::{CommandPose, ReportedPose, SlvMode};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

#[cfg(feature = "net")]
pub use net_link::NetLink;
pub use session::{SlaveSession, SlaveSessionError};
pub use sim_link::SimLink;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// An exclusively held connection to a robot controller.
///
/// All calls block until the controller has replied.
pub trait HardwareLink {
    /// Number of joints the controller expects in each commanded pose.
    fn num_joints(&self) -> usize;

    /// Set the controller's external speed override.
    fn set_ext_speed(&mut self, speed_pct: f64) -> Result<(), LinkError>;

    /// Perform a joint move to the given pose, returns once the move is complete.
    fn move_to(&mut self, pose: &CommandPose, speed_pct: f64) -> Result<(), LinkError>;

    /// Start or stop the controller's internal control log.
    fn set_ctrl_log(&mut self, enabled: bool) -> Result<(), LinkError>;

    /// Switch the controller's execution mode.
    fn change_mode(&mut self, mode: SlvMode) -> Result<(), LinkError>;

    /// Send one slave move and wait for the controller to report its pose.
    ///
    /// Only valid while the controller is in slave mode, see [`SlaveSession`].
    fn send_pose(&mut self, pose: &CommandPose) -> Result<ReportedPose, CommandError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the network link to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetLinkParams {
    /// Endpoint of the controller, for instance `tcp://192.168.0.1:5020`
    pub endpoint: String,

    /// Number of joints on the robot.
    pub num_joints: usize,

    /// Maximum time to wait for the initial connection.
    ///
    /// Units: milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: i32,

    /// Maximum time to wait for a reply, `-1` waits forever.
    ///
    /// Units: milliseconds
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: i32,

    /// Maximum time to wait for a request to be sent, `-1` waits forever.
    ///
    /// Units: milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by setup, teardown and mode change calls. These are fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Could not connect to the controller at {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The link is not connected to the controller")]
    NotConnected,

    #[error("Message exchange with the controller failed: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    #[error("The controller rejected {request} (code {code}): {reason}")]
    Rejected {
        request: String,
        code: i32,
        reason: String,
    },

    #[error("Unexpected response to {request}: {response}")]
    UnexpectedResponse { request: String, response: String },
}

/// Failure of a single slave move. Whether this ends the run is decided by the control loop's
/// failure policy.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Slave move not delivered: {0}")]
    Link(LinkError),

    #[error("The controller rejected the slave move (code {code}): {reason}")]
    Rejected { code: i32, reason: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<L: HardwareLink + ?Sized> HardwareLink for Box<L> {
    fn num_joints(&self) -> usize {
        (**self).num_joints()
    }

    fn set_ext_speed(&mut self, speed_pct: f64) -> Result<(), LinkError> {
        (**self).set_ext_speed(speed_pct)
    }

    fn move_to(&mut self, pose: &CommandPose, speed_pct: f64) -> Result<(), LinkError> {
        (**self).move_to(pose, speed_pct)
    }

    fn set_ctrl_log(&mut self, enabled: bool) -> Result<(), LinkError> {
        (**self).set_ctrl_log(enabled)
    }

    fn change_mode(&mut self, mode: SlvMode) -> Result<(), LinkError> {
        (**self).change_mode(mode)
    }

    fn send_pose(&mut self, pose: &CommandPose) -> Result<ReportedPose, CommandError> {
        (**self).send_pose(pose)
    }
}

impl From<LinkError> for CommandError {
    fn from(e: LinkError) -> Self {
        CommandError::Link(e)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_connect_timeout_ms() -> i32 {
    1000
}

fn default_recv_timeout_ms() -> i32 {
    -1
}

fn default_send_timeout_ms() -> i32 {
    1000
}
