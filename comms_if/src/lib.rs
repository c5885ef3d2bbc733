//! # Communications interface crate.
//!
//! Provides the messages exchanged between the trajectory executable and the robot controller,
//! and the network abstractions used to carry them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (the robot controller)
pub mod eqpt;

/// Network module
#[cfg(feature = "net")]
pub mod net;
