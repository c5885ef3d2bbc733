//! # Simulated Link
//!
//! In-process stand-in for a controller. Every call takes a fixed latency, measured on a shared
//! [`ManualClock`], and slave moves report back exactly the pose that was commanded.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::HashSet, time::Duration};

use comms_if::eqpt::{
    slv::{REJECT_BAD_DIMENSION, REJECT_INJECTED, REJECT_IN_SLAVE_MODE, REJECT_NOT_IN_SLAVE_MODE},
    CommandPose, ReportedPose, SlvMode, REPORTED_POSE_WIDTH,
};
use log::trace;

use super::{CommandError, HardwareLink, LinkError};
use crate::clock::ManualClock;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct SimLink {
    num_joints: usize,

    latency: Duration,

    clock: ManualClock,

    mode: SlvMode,

    mode_history: Vec<SlvMode>,

    /// Number of slave moves received, including rejected ones
    moves_sent: usize,

    /// Indices of the slave moves which will be rejected
    failures: HashSet<usize>,

    reject_mode_change: bool,

    ext_speed_pct: f64,

    ctrl_log: bool,

    /// Last pose reached by the simulated robot
    ///
    /// Units: degrees
    pose_deg: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimLink {
    /// Create a new simulated link, each call advances `clock` by `latency`.
    ///
    /// `latency` should be non-zero, otherwise the control loop never progresses through the
    /// trajectory.
    pub fn new(num_joints: usize, latency: Duration, clock: ManualClock) -> Self {
        Self {
            num_joints,
            latency,
            clock,
            mode: SlvMode::Normal,
            mode_history: Vec::new(),
            moves_sent: 0,
            failures: HashSet::new(),
            reject_mode_change: false,
            ext_speed_pct: 100.0,
            ctrl_log: false,
            pose_deg: vec![0.0; num_joints],
        }
    }

    /// Reject the slave moves with the given (zero based) indices.
    pub fn with_failures<I: IntoIterator<Item = usize>>(mut self, failures: I) -> Self {
        self.failures.extend(failures);
        self
    }

    /// Reject every mode change request.
    pub fn with_mode_change_rejected(mut self) -> Self {
        self.reject_mode_change = true;
        self
    }

    /// Every mode change the link has accepted, in order.
    pub fn mode_history(&self) -> &[SlvMode] {
        &self.mode_history
    }

    /// Number of slave moves received, including rejected ones.
    pub fn moves_sent(&self) -> usize {
        self.moves_sent
    }

    pub fn mode(&self) -> SlvMode {
        self.mode
    }

    pub fn pose_deg(&self) -> &[f64] {
        &self.pose_deg
    }

    pub fn ext_speed_pct(&self) -> f64 {
        self.ext_speed_pct
    }

    pub fn ctrl_log(&self) -> bool {
        self.ctrl_log
    }

    fn rejected(request: &str, code: i32, reason: &str) -> LinkError {
        LinkError::Rejected {
            request: request.into(),
            code,
            reason: reason.into(),
        }
    }
}

impl HardwareLink for SimLink {
    fn num_joints(&self) -> usize {
        self.num_joints
    }

    fn set_ext_speed(&mut self, speed_pct: f64) -> Result<(), LinkError> {
        self.clock.advance(self.latency);
        self.ext_speed_pct = speed_pct;
        Ok(())
    }

    fn move_to(&mut self, pose: &CommandPose, _speed_pct: f64) -> Result<(), LinkError> {
        self.clock.advance(self.latency);

        if self.mode == SlvMode::Slave {
            return Err(Self::rejected(
                "MoveJoints",
                REJECT_IN_SLAVE_MODE,
                "joint moves are not allowed in slave mode",
            ));
        }
        if pose.joints_deg.len() != self.num_joints {
            return Err(Self::rejected(
                "MoveJoints",
                REJECT_BAD_DIMENSION,
                "wrong number of joints",
            ));
        }

        self.pose_deg = pose.joints_deg.clone();
        Ok(())
    }

    fn set_ctrl_log(&mut self, enabled: bool) -> Result<(), LinkError> {
        self.clock.advance(self.latency);
        self.ctrl_log = enabled;
        Ok(())
    }

    fn change_mode(&mut self, mode: SlvMode) -> Result<(), LinkError> {
        self.clock.advance(self.latency);

        if self.reject_mode_change {
            return Err(Self::rejected(
                &format!("ChangeMode({})", mode),
                REJECT_INJECTED,
                "mode change refused",
            ));
        }

        self.mode = mode;
        self.mode_history.push(mode);
        Ok(())
    }

    fn send_pose(&mut self, pose: &CommandPose) -> Result<ReportedPose, CommandError> {
        let index = self.moves_sent;
        self.moves_sent += 1;
        self.clock.advance(self.latency);

        trace!("Sim slave move {}: {:?}", index, pose.joints_deg);

        if self.mode != SlvMode::Slave {
            return Err(CommandError::Rejected {
                code: REJECT_NOT_IN_SLAVE_MODE,
                reason: "not in slave mode".into(),
            });
        }
        if pose.joints_deg.len() != self.num_joints {
            return Err(CommandError::Rejected {
                code: REJECT_BAD_DIMENSION,
                reason: format!(
                    "expected {} joints, got {}",
                    self.num_joints,
                    pose.joints_deg.len()
                ),
            });
        }
        if self.failures.contains(&index) {
            return Err(CommandError::Rejected {
                code: REJECT_INJECTED,
                reason: format!("injected failure on move {}", index),
            });
        }

        self.pose_deg = pose.joints_deg.clone();

        let mut reported = [0.0; REPORTED_POSE_WIDTH];
        for (r, p) in reported.iter_mut().zip(self.pose_deg.iter()) {
            *r = *p;
        }

        Ok(ReportedPose(reported))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::Clock;

    fn cmd(v: &[f64]) -> CommandPose {
        CommandPose {
            joints_deg: v.to_vec(),
        }
    }

    #[test]
    fn test_echo_and_latency() {
        let clock = ManualClock::default();
        let mut link = SimLink::new(3, Duration::from_millis(20), clock.clone());

        link.change_mode(SlvMode::Slave).unwrap();
        let t0 = clock.now();

        let p = link.send_pose(&cmd(&[1.0, 2.0, 3.0])).unwrap();

        assert_eq!(p.0, [1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        assert_eq!(clock.now() - t0, Duration::from_millis(20));
        assert_eq!(link.moves_sent(), 1);
        assert_eq!(link.pose_deg(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rejects_outside_slave_mode() {
        let mut link = SimLink::new(2, Duration::from_millis(1), ManualClock::default());

        let res = link.send_pose(&cmd(&[0.0, 0.0]));

        assert!(matches!(
            res,
            Err(CommandError::Rejected {
                code: REJECT_NOT_IN_SLAVE_MODE,
                ..
            })
        ));

        link.change_mode(SlvMode::Slave).unwrap();
        assert!(link.move_to(&cmd(&[0.0, 0.0]), 25.0).is_err());
    }

    #[test]
    fn test_injected_failures() {
        let mut link =
            SimLink::new(1, Duration::from_millis(1), ManualClock::default()).with_failures(vec![1]);
        link.change_mode(SlvMode::Slave).unwrap();

        assert!(link.send_pose(&cmd(&[0.0])).is_ok());
        assert!(link.send_pose(&cmd(&[0.0])).is_err());
        assert!(link.send_pose(&cmd(&[0.0])).is_ok());
        assert_eq!(link.moves_sent(), 3);
    }

    #[test]
    fn test_bad_dimension() {
        let mut link = SimLink::new(2, Duration::from_millis(1), ManualClock::default());
        link.change_mode(SlvMode::Slave).unwrap();

        assert!(link.send_pose(&cmd(&[0.0, 1.0, 2.0])).is_err());
    }

    #[test]
    fn test_setup_calls() {
        let clock = ManualClock::default();
        let mut link = SimLink::new(2, Duration::from_millis(5), clock.clone());
        let t0 = clock.now();

        link.set_ext_speed(40.0).unwrap();
        link.move_to(&cmd(&[10.0, -10.0]), 25.0).unwrap();
        link.set_ctrl_log(true).unwrap();

        assert_eq!(link.ext_speed_pct(), 40.0);
        assert!(link.ctrl_log());
        assert_eq!(link.pose_deg(), &[10.0, -10.0]);
        assert_eq!(link.mode(), SlvMode::Normal);
        assert_eq!(clock.now() - t0, Duration::from_millis(15));

        // Joint moves never count as slave moves
        assert_eq!(link.moves_sent(), 0);
    }
}
