//! # Controller Simulator Executable
//!
//! Stands in for the robot controller so that the slave trajectory executable can be run end to
//! end over the network without hardware. Optionally adds latency to every request and rejects
//! some slave moves.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Controller server abstraction.
mod ctrl_server;

/// Parameters for the controller simulator.
mod params;

/// Simulated robot state.
mod robot;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::{
    eqpt::{slv::REJECT_MALFORMED, SlvRequest, SlvResponse},
    net::{zmq, JsonMsgError},
};
use log::{info, trace, warn};
use std::time::Duration;
use structopt::StructOpt;

// Internal
use ctrl_server::CtrlServer;
use params::CtrlSimExecParams;
use robot::SimRobot;
use util::{
    logger::{logger_init, parse_level},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "ctrl_sim_exec", about = "Simulated slave mode robot controller")]
struct Opts {
    /// Parameter file, relative to the params directory of the software root
    #[structopt(short, long, default_value = "ctrl_sim_exec.toml")]
    params: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("ctrl_sim_exec", "sessions").wrap_err("Failed to create the session")?;

    let params: CtrlSimExecParams = util::params::load(&opts.params)
        .wrap_err_with(|| format!("Failed to load parameters from {}", opts.params))?;

    logger_init(parse_level(&params.log_level)?, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Controller Simulator Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- SERVER INITIALISATION ----

    let ctx = zmq::Context::new();

    let mut server = CtrlServer::new(&ctx, &params).wrap_err("Failed to initialise server")?;
    let mut robot = SimRobot::new(&params.robot);
    let latency = Duration::from_millis(params.robot.latency_ms);

    info!(
        "Listening on {}: {} joints, latency {} ms, rejecting every {} slave moves",
        params.endpoint,
        params.robot.num_joints,
        params.robot.latency_ms,
        params.robot.reject_every_n
    );

    // ---- MAIN LOOP ----

    loop {
        let request = match server.get_request() {
            Some(r) => r,
            None => continue,
        };

        if let Some(response) = respond(request, &mut robot, latency) {
            if let Err(e) = server.send_response(&response) {
                warn!("Couldn't send response to client: {}", e);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the response to a request read from the server.
///
/// `None` means nothing was recieved and there is nothing to answer.
fn respond(
    request: Result<SlvRequest, JsonMsgError>,
    robot: &mut SimRobot,
    latency: Duration,
) -> Option<SlvResponse> {
    let response = match request {
        Ok(request) => {
            trace!("Recieved {:?} in {} mode", request, robot.mode());

            if latency > Duration::from_secs(0) {
                std::thread::sleep(latency);
            }

            let response = robot.handle(request);
            trace!("Pose now {:?}", robot.pose_deg());
            response
        }
        Err(e @ JsonMsgError::RecvError(_)) => {
            warn!("Could not recieve from the client: {}", e);
            return None;
        }
        Err(e) => {
            warn!("Could not read request: {}", e);
            SlvResponse::Rejected {
                code: REJECT_MALFORMED,
                reason: e.to_string(),
            }
        }
    };

    if let SlvResponse::Rejected { code, ref reason } = response {
        warn!("Rejecting request (code {}): {}", code, reason);
    }

    Some(response)
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::{
        slv::{REJECT_INJECTED, REJECT_NOT_IN_SLAVE_MODE},
        CommandPose, SlvMode,
    };
    use crate::params::RobotParams;
    use slv_lib::hw_link::{CommandError, HardwareLink, NetLink, NetLinkParams};
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
    };

    /// Serve requests on a background thread until the returned flag is set.
    fn serve(
        ctx: &zmq::Context,
        endpoint: &str,
        reject_every_n: usize,
    ) -> (Arc<AtomicBool>, thread::JoinHandle<SimRobot>) {
        let params = CtrlSimExecParams {
            endpoint: endpoint.into(),
            log_level: "info".into(),
            robot: RobotParams {
                num_joints: 2,
                latency_ms: 0,
                reject_every_n,
            },
        };

        let mut server = CtrlServer::new(ctx, &params).unwrap();
        let mut robot = SimRobot::new(&params.robot);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                if let Some(request) = server.get_request() {
                    if let Some(response) = respond(request, &mut robot, Duration::from_secs(0)) {
                        server.send_response(&response).unwrap();
                    }
                }
            }
            robot
        });

        (stop, handle)
    }

    fn link_params(endpoint: &str) -> NetLinkParams {
        NetLinkParams {
            endpoint: endpoint.into(),
            num_joints: 2,
            connect_timeout_ms: 1000,
            recv_timeout_ms: 2000,
            send_timeout_ms: 1000,
        }
    }

    fn pose(v: f64) -> CommandPose {
        CommandPose {
            joints_deg: vec![v; 2],
        }
    }

    #[test]
    fn test_link_round_trip() {
        let ctx = zmq::Context::new();
        let endpoint = "tcp://127.0.0.1:35031";
        let (stop, handle) = serve(&ctx, "tcp://*:35031", 3);

        {
            let mut link = NetLink::connect(&ctx, &link_params(endpoint)).unwrap();

            link.set_ext_speed(50.0).unwrap();
            link.move_to(&pose(10.0), 25.0).unwrap();

            // Slave moves are refused until the mode changes
            assert!(matches!(
                link.send_pose(&pose(11.0)),
                Err(CommandError::Rejected {
                    code: REJECT_NOT_IN_SLAVE_MODE,
                    ..
                })
            ));

            link.change_mode(SlvMode::Slave).unwrap();

            let reported = link.send_pose(&pose(12.0)).unwrap();
            assert_eq!(reported.0, [12.0, 12.0, 0.0, 0.0, 0.0, 0.0]);
            link.send_pose(&pose(13.0)).unwrap();

            // Every third slave move is rejected by the robot
            assert!(matches!(
                link.send_pose(&pose(14.0)),
                Err(CommandError::Rejected {
                    code: REJECT_INJECTED,
                    ..
                })
            ));

            link.change_mode(SlvMode::Normal).unwrap();
        }

        stop.store(true, Ordering::Relaxed);
        let robot = handle.join().unwrap();

        assert_eq!(robot.mode(), SlvMode::Normal);
        assert_eq!(robot.pose_deg(), &[13.0, 13.0]);
    }

    #[test]
    fn test_malformed_request() {
        let ctx = zmq::Context::new();
        let (stop, handle) = serve(&ctx, "tcp://*:35032", 0);

        let client = ctx.socket(zmq::REQ).unwrap();
        client.set_rcvtimeo(2000).unwrap();
        client.set_linger(0).unwrap();
        client.connect("tcp://127.0.0.1:35032").unwrap();

        client.send("not a request", 0).unwrap();
        let reply = client.recv_string(0).unwrap().unwrap();

        // The server answers so the request socket can carry on
        client.send("{}", 0).unwrap();
        let second = client.recv_string(0).unwrap().unwrap();

        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        for r in &[reply, second] {
            assert!(r.contains("Rejected"), "Unexpected reply {}", r);
            assert!(r.contains(&REJECT_MALFORMED.to_string()));
        }
    }

    #[test]
    fn test_recv_error_not_answered() {
        let mut robot = SimRobot::new(&RobotParams {
            num_joints: 2,
            latency_ms: 0,
            reject_every_n: 0,
        });

        let res = respond(
            Err(JsonMsgError::RecvError(zmq::Error::ETERM)),
            &mut robot,
            Duration::from_secs(0),
        );
        assert!(res.is_none());

        assert_eq!(
            respond(Ok(SlvRequest::Ping), &mut robot, Duration::from_secs(0)),
            Some(SlvResponse::Ack)
        );
    }
}
