//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to equipment servers/clients.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

/// Slave mode controller requests and responses.
pub mod slv;

// -----------------------------------------------------------------------------------------------
// REEXPORTS
// -----------------------------------------------------------------------------------------------

pub use slv::{CommandPose, ReportedPose, SlvMode, SlvRequest, SlvResponse, REPORTED_POSE_WIDTH};
