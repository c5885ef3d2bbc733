//! # Slave trajectory library.
//!
//! This library contains everything needed to play a trajectory on a robot controller in slave
//! mode, so that other crates in the workspace (and the tests) can drive the control loop without
//! the executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Clocks - measure the round trip time of each slave move
pub mod clock;

/// Hardware links - connections to the robot controller, real or simulated
pub mod hw_link;

/// Executable parameters
pub mod params;

/// Joint poses and their wire encoding
pub mod pose;

/// Telemetry recording and persistence
pub mod telemetry;

/// Trajectories - the curves which are played on the robot
pub mod traj;

/// Trajectory execution - the slave mode control loop
pub mod traj_exec;
