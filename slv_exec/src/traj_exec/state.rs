//! Trajectory execution state and control loop

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::{CommandPose, ReportedPose};
use log::{debug, info, warn};
use util::maths::norm;

use super::*;
use crate::{
    clock::Clock,
    hw_link::{HardwareLink, SlaveSession},
    pose::PoseEncoder,
    telemetry::{SampleStatus, TelemetryRecord, TelemetryRecorder},
    traj::Trajectory,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Executes trajectories on a controller in slave mode.
pub struct TrajExec<C: Clock, E: PoseEncoder> {
    config: ExecConfig,

    clock: C,

    encoder: E,
}

/// State of the control loop between iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopState {
    /// Current trajectory time, never decreases.
    ///
    /// Units: seconds
    pub traj_time_s: f64,

    /// Number of iterations completed
    pub iteration: usize,
}

/// Running statistics used to build the [`RunSummary`]
#[derive(Default)]
struct Stats {
    num_failed: usize,
    num_retried: usize,
    total_latency_s: f64,
    max_latency_s: f64,
    max_tracking_error_deg: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of sending one target pose, including any retry.
enum Outcome {
    Ok(ReportedPose),
    Retried(ReportedPose),
    Failed(CommandError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<C: Clock, E: PoseEncoder> TrajExec<C, E> {
    /// Create a new executor, checking the configuration is usable.
    pub fn new(config: ExecConfig, clock: C, encoder: E) -> Result<Self, TrajExecError> {
        if !config.speed_scale.is_finite() || config.speed_scale <= 0.0 {
            return Err(TrajExecError::InvalidSpeedScale(config.speed_scale));
        }

        Ok(Self {
            config,
            clock,
            encoder,
        })
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Run the whole trajectory.
    ///
    /// One record is appended to `recorder` per iteration. If the run is aborted by a failed
    /// command the records up to and including the failure stay in the recorder.
    pub fn run<T, L>(
        &self,
        traj: &T,
        session: &mut SlaveSession<L>,
        recorder: &mut TelemetryRecorder,
    ) -> Result<RunSummary, TrajExecError>
    where
        T: Trajectory + ?Sized,
        L: HardwareLink + ?Sized,
    {
        if traj.dimension() != session.num_joints() {
            return Err(TrajExecError::DimensionMismatch {
                traj: traj.dimension(),
                link: session.num_joints(),
            });
        }

        let duration = traj.duration();
        let mut state = LoopState::default();
        let mut stats = Stats::default();

        info!(
            "Executing trajectory: duration {:.3} s, speed scale {}, failure policy {:?}",
            duration, self.config.speed_scale, self.config.failure_policy
        );

        while state.traj_time_s < duration {
            let target = traj.eval(state.traj_time_s);
            let cmd = self.encoder.encode(&target);

            let start = self.clock.now();
            let outcome = self.send(session, &cmd, &state);
            let end = self.clock.now();

            let latency_s = end.saturating_sub(start).as_secs_f64();
            stats.total_latency_s += latency_s;
            stats.max_latency_s = stats.max_latency_s.max(latency_s);

            let (pose, status, failure) = match outcome {
                Outcome::Ok(p) => (p, SampleStatus::Ok, None),
                Outcome::Retried(p) => {
                    stats.num_retried += 1;
                    (p, SampleStatus::Retried, None)
                }
                Outcome::Failed(e) => {
                    stats.num_failed += 1;
                    warn!(
                        "Slave move {} failed at trajectory time {:.3} s: {}",
                        state.iteration, state.traj_time_s, e
                    );
                    let status = SampleStatus::Failed {
                        reason: e.to_string(),
                    };
                    (ReportedPose::nan(), status, Some(e))
                }
            };

            if failure.is_none() {
                if let Some(err) = tracking_error(&cmd, &pose) {
                    stats.max_tracking_error_deg =
                        Some(stats.max_tracking_error_deg.map_or(err, |m| m.max(err)));
                }
            }

            recorder.append(TelemetryRecord {
                traj_time_s: state.traj_time_s,
                pose,
                latency_s,
                status,
            });

            if let Some(source) = failure {
                if self.config.failure_policy == FailurePolicy::Abort {
                    return Err(TrajExecError::CommandFailed {
                        iteration: state.iteration,
                        traj_time_s: state.traj_time_s,
                        source,
                    });
                }
            }

            if self.config.log_every_n > 0 && state.iteration % self.config.log_every_n == 0 {
                debug!(
                    "Iteration {}: s = {:.4} s, latency {:.2} ms",
                    state.iteration,
                    state.traj_time_s,
                    latency_s * 1e3
                );
            }

            state.advance(self.config.speed_scale * latency_s);
        }

        let summary = RunSummary {
            complete: true,
            iterations: state.iteration,
            num_failed: stats.num_failed,
            num_retried: stats.num_retried,
            final_traj_time_s: state.traj_time_s,
            traj_duration_s: duration,
            total_latency_s: stats.total_latency_s,
            mean_latency_s: match state.iteration {
                0 => 0.0,
                n => stats.total_latency_s / n as f64,
            },
            max_latency_s: stats.max_latency_s,
            max_tracking_error_deg: stats.max_tracking_error_deg,
        };

        info!("Trajectory complete: {}", summary);

        Ok(summary)
    }

    /// Send the pose, retrying once if the policy allows it.
    fn send<L: HardwareLink + ?Sized>(
        &self,
        session: &mut SlaveSession<L>,
        cmd: &CommandPose,
        state: &LoopState,
    ) -> Outcome {
        match session.send_pose(cmd) {
            Ok(p) => Outcome::Ok(p),
            Err(e) if self.config.failure_policy == FailurePolicy::RetryOnce => {
                warn!(
                    "Slave move {} failed, retrying: {}",
                    state.iteration, e
                );
                match session.send_pose(cmd) {
                    Ok(p) => Outcome::Retried(p),
                    Err(e) => Outcome::Failed(e),
                }
            }
            Err(e) => Outcome::Failed(e),
        }
    }
}

impl LoopState {
    /// Move on to the next iteration, advancing the trajectory time by `dt_s`.
    pub fn advance(&mut self, dt_s: f64) {
        self.traj_time_s += dt_s.max(0.0);
        self.iteration += 1;
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Distance between the commanded pose and the matching joints of the reported pose.
fn tracking_error(cmd: &CommandPose, pose: &ReportedPose) -> Option<f64> {
    let n = cmd.joints_deg.len().min(pose.0.len());
    norm(&cmd.joints_deg[..n], &pose.0[..n])
}
