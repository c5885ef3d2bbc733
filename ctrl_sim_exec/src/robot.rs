//! # Simulated Robot
//!
//! The state of the simulated controller and its response to each request.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::{
    slv::{
        REJECT_BAD_DIMENSION, REJECT_BAD_VALUE, REJECT_INJECTED, REJECT_IN_SLAVE_MODE,
        REJECT_NOT_IN_SLAVE_MODE,
    },
    CommandPose, ReportedPose, SlvMode, SlvRequest, SlvResponse, REPORTED_POSE_WIDTH,
};
use log::{debug, info};

use crate::params::RobotParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SimRobot {
    num_joints: usize,

    /// Reject every Nth slave move, `0` never rejects
    reject_every_n: usize,

    mode: SlvMode,

    /// Units: percent
    ext_speed_pct: f64,

    ctrl_log: bool,

    /// Current joint positions.
    ///
    /// Units: degrees
    pose_deg: Vec<f64>,

    /// Slave moves received since the last entry into slave mode
    num_slv_moves: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimRobot {
    pub fn new(params: &RobotParams) -> Self {
        Self {
            num_joints: params.num_joints,
            reject_every_n: params.reject_every_n,
            mode: SlvMode::Normal,
            ext_speed_pct: 100.0,
            ctrl_log: false,
            pose_deg: vec![0.0; params.num_joints],
            num_slv_moves: 0,
        }
    }

    pub fn mode(&self) -> SlvMode {
        self.mode
    }

    pub fn pose_deg(&self) -> &[f64] {
        &self.pose_deg
    }

    /// Process a request and build the response to send back.
    pub fn handle(&mut self, request: SlvRequest) -> SlvResponse {
        match request {
            SlvRequest::Ping => SlvResponse::Ack,
            SlvRequest::SetExtSpeed { speed_pct } => self.set_ext_speed(speed_pct),
            SlvRequest::MoveJoints { pose, speed_pct } => self.move_joints(pose, speed_pct),
            SlvRequest::SetCtrlLog { enabled } => {
                if enabled != self.ctrl_log {
                    info!("Controller log {}", if enabled { "started" } else { "stopped" });
                }
                self.ctrl_log = enabled;
                SlvResponse::Ack
            }
            SlvRequest::ChangeMode(mode) => {
                if mode == SlvMode::Slave && self.mode != SlvMode::Slave {
                    self.num_slv_moves = 0;
                }
                info!("Mode changed to {}", mode);
                self.mode = mode;
                SlvResponse::Ack
            }
            SlvRequest::SlvMove(pose) => self.slv_move(pose),
        }
    }

    fn set_ext_speed(&mut self, speed_pct: f64) -> SlvResponse {
        if self.mode == SlvMode::Slave {
            return rejected(REJECT_IN_SLAVE_MODE, "cannot change speed in slave mode");
        }
        if !(speed_pct > 0.0 && speed_pct <= 100.0) {
            return rejected(
                REJECT_BAD_VALUE,
                &format!("speed {} is outside (0, 100]", speed_pct),
            );
        }

        self.ext_speed_pct = speed_pct;
        SlvResponse::Ack
    }

    fn move_joints(&mut self, pose: CommandPose, speed_pct: f64) -> SlvResponse {
        if self.mode == SlvMode::Slave {
            return rejected(REJECT_IN_SLAVE_MODE, "joint moves are not allowed in slave mode");
        }
        if let Some(r) = self.check_dimension(&pose) {
            return r;
        }

        debug!(
            "Joint move to {:?} at {}% ({}% external)",
            pose.joints_deg, speed_pct, self.ext_speed_pct
        );
        self.pose_deg = pose.joints_deg;
        SlvResponse::Ack
    }

    fn slv_move(&mut self, pose: CommandPose) -> SlvResponse {
        if self.mode != SlvMode::Slave {
            return rejected(REJECT_NOT_IN_SLAVE_MODE, "not in slave mode");
        }
        if let Some(r) = self.check_dimension(&pose) {
            return r;
        }

        self.num_slv_moves += 1;
        if self.reject_every_n > 0 && self.num_slv_moves % self.reject_every_n == 0 {
            return rejected(
                REJECT_INJECTED,
                &format!("injected failure on move {}", self.num_slv_moves - 1),
            );
        }

        self.pose_deg = pose.joints_deg;

        let mut reported = [0.0; REPORTED_POSE_WIDTH];
        for (r, p) in reported.iter_mut().zip(self.pose_deg.iter()) {
            *r = *p;
        }

        SlvResponse::Pose(ReportedPose(reported))
    }

    fn check_dimension(&self, pose: &CommandPose) -> Option<SlvResponse> {
        match pose.joints_deg.len() == self.num_joints {
            true => None,
            false => Some(rejected(
                REJECT_BAD_DIMENSION,
                &format!(
                    "expected {} joints, got {}",
                    self.num_joints,
                    pose.joints_deg.len()
                ),
            )),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn rejected(code: i32, reason: &str) -> SlvResponse {
    SlvResponse::Rejected {
        code,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn robot(reject_every_n: usize) -> SimRobot {
        SimRobot::new(&RobotParams {
            num_joints: 6,
            latency_ms: 0,
            reject_every_n,
        })
    }

    fn pose(v: f64) -> CommandPose {
        CommandPose {
            joints_deg: vec![v; 6],
        }
    }

    fn code(resp: &SlvResponse) -> Option<i32> {
        match resp {
            SlvResponse::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[test]
    fn test_normal_mode() {
        let mut r = robot(0);

        assert_eq!(r.handle(SlvRequest::Ping), SlvResponse::Ack);
        assert_eq!(
            r.handle(SlvRequest::SetExtSpeed { speed_pct: 100.0 }),
            SlvResponse::Ack
        );
        assert_eq!(
            code(&r.handle(SlvRequest::SetExtSpeed { speed_pct: 150.0 })),
            Some(REJECT_BAD_VALUE)
        );
        assert_eq!(
            r.handle(SlvRequest::MoveJoints {
                pose: pose(10.0),
                speed_pct: 25.0
            }),
            SlvResponse::Ack
        );
        assert_eq!(r.pose_deg(), &[10.0; 6]);

        assert_eq!(
            code(&r.handle(SlvRequest::SlvMove(pose(0.0)))),
            Some(REJECT_NOT_IN_SLAVE_MODE)
        );
    }

    #[test]
    fn test_slave_mode() {
        let mut r = robot(0);

        r.handle(SlvRequest::ChangeMode(SlvMode::Slave));
        assert_eq!(r.mode(), SlvMode::Slave);

        match r.handle(SlvRequest::SlvMove(pose(5.0))) {
            SlvResponse::Pose(p) => assert_eq!(p.0, [5.0; 6]),
            resp => panic!("Expected a pose, got {:?}", resp),
        }

        assert_eq!(
            code(&r.handle(SlvRequest::MoveJoints {
                pose: pose(0.0),
                speed_pct: 25.0
            })),
            Some(REJECT_IN_SLAVE_MODE)
        );
        assert_eq!(
            code(&r.handle(SlvRequest::SlvMove(CommandPose {
                joints_deg: vec![0.0; 3]
            }))),
            Some(REJECT_BAD_DIMENSION)
        );

        r.handle(SlvRequest::ChangeMode(SlvMode::Normal));
        assert_eq!(r.mode(), SlvMode::Normal);
    }

    #[test]
    fn test_reject_every_n() {
        let mut r = robot(3);
        r.handle(SlvRequest::ChangeMode(SlvMode::Slave));

        let rejected: Vec<bool> = (0..7)
            .map(|i| code(&r.handle(SlvRequest::SlvMove(pose(i as f64)))).is_some())
            .collect();

        assert_eq!(
            rejected,
            vec![false, false, true, false, false, true, false]
        );

        // The pose is left where the last accepted move put it
        assert_eq!(r.pose_deg(), &[6.0; 6]);
    }
}
