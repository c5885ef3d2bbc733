//! # Joint poses
//!
//! Internally poses are held in radians. The controller works in degrees, so every pose crosses
//! a [`PoseEncoder`] on its way to the wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::CommandPose;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position of every actuated joint.
///
/// Units: radians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JointPose(pub Vec<f64>);

/// Encoder for controllers which take joint positions in degrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegEncoder;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Converts joint poses to and from the controller's wire representation.
pub trait PoseEncoder {
    /// Encode a pose to be sent to the controller.
    fn encode(&self, pose: &JointPose) -> CommandPose;

    /// Decode a pose in wire units back into a joint pose.
    fn decode(&self, cmd: &CommandPose) -> JointPose;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointPose {
    /// Number of joints in the pose.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for JointPose {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl PoseEncoder for DegEncoder {
    fn encode(&self, pose: &JointPose) -> CommandPose {
        CommandPose {
            joints_deg: pose.0.iter().map(|r| r.to_degrees()).collect(),
        }
    }

    fn decode(&self, cmd: &CommandPose) -> JointPose {
        JointPose(cmd.joints_deg.iter().map(|d| d.to_radians()).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_deg_encode() {
        let cmd = DegEncoder.encode(&JointPose(vec![0.0, PI / 2.0, -PI]));
        assert_relative_eq!(cmd.joints_deg[0], 0.0);
        assert_relative_eq!(cmd.joints_deg[1], 90.0);
        assert_relative_eq!(cmd.joints_deg[2], -180.0);
    }

    #[test]
    fn test_deg_round_trip() {
        let pose = JointPose(vec![0.1, -1.2345, 3.0, 1e-9, -2.5, 0.0]);

        let back = DegEncoder.decode(&DegEncoder.encode(&pose));

        assert_eq!(back.dimension(), pose.dimension());
        for (a, b) in pose.as_slice().iter().zip(back.as_slice()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
