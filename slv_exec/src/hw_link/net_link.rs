//! # Network Link
//!
//! Connection to the controller over a ZMQ request socket. Each call is one JSON request and
//! reply exchange.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::{CommandPose, ReportedPose, SlvMode, SlvRequest, SlvResponse},
    net::{zmq, JsonMsgError, MonitoredSocket, SocketOptions},
};
use log::{debug, info};

use super::{CommandError, HardwareLink, LinkError, NetLinkParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct NetLink {
    socket: MonitoredSocket,

    num_joints: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetLink {
    /// Connect to the controller and check that it responds.
    pub fn connect(ctx: &zmq::Context, params: &NetLinkParams) -> Result<Self, LinkError> {
        let socket_options = SocketOptions {
            connect_timeout: params.connect_timeout_ms,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.recv_timeout_ms,
            send_timeout: params.send_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, &socket_options, &params.endpoint)
            .map_err(|e| LinkError::ConnectFailed {
                endpoint: params.endpoint.clone(),
                source: Box::new(e),
            })?;

        let link = Self {
            socket,
            num_joints: params.num_joints,
        };

        // The socket may be connected to something other than a controller, make sure it answers
        match link.exchange(&SlvRequest::Ping)? {
            SlvResponse::Ack => (),
            r => return Err(unexpected(&SlvRequest::Ping, &r)),
        }

        info!("Connected to the controller at {}", params.endpoint);

        Ok(link)
    }

    /// Send a request and wait for the reply.
    fn exchange(&self, request: &SlvRequest) -> Result<SlvResponse, LinkError> {
        if !self.socket.connected() {
            return Err(LinkError::NotConnected);
        }

        self.socket
            .request(request)
            .map_err(|e: JsonMsgError| LinkError::Transport(Box::new(e)))
    }

    /// Send a request which is answered with a plain acknowledgement.
    fn exchange_ack(&self, request: SlvRequest) -> Result<(), LinkError> {
        debug!("Sending {:?}", request);

        match self.exchange(&request)? {
            SlvResponse::Ack => Ok(()),
            SlvResponse::Rejected { code, reason } => Err(LinkError::Rejected {
                request: request_name(&request),
                code,
                reason,
            }),
            r => Err(unexpected(&request, &r)),
        }
    }
}

impl HardwareLink for NetLink {
    fn num_joints(&self) -> usize {
        self.num_joints
    }

    fn set_ext_speed(&mut self, speed_pct: f64) -> Result<(), LinkError> {
        self.exchange_ack(SlvRequest::SetExtSpeed { speed_pct })
    }

    fn move_to(&mut self, pose: &CommandPose, speed_pct: f64) -> Result<(), LinkError> {
        self.exchange_ack(SlvRequest::MoveJoints {
            pose: pose.clone(),
            speed_pct,
        })
    }

    fn set_ctrl_log(&mut self, enabled: bool) -> Result<(), LinkError> {
        self.exchange_ack(SlvRequest::SetCtrlLog { enabled })
    }

    fn change_mode(&mut self, mode: SlvMode) -> Result<(), LinkError> {
        self.exchange_ack(SlvRequest::ChangeMode(mode))
    }

    fn send_pose(&mut self, pose: &CommandPose) -> Result<ReportedPose, CommandError> {
        let request = SlvRequest::SlvMove(pose.clone());

        match self.exchange(&request)? {
            SlvResponse::Pose(p) => Ok(p),
            SlvResponse::Rejected { code, reason } => Err(CommandError::Rejected { code, reason }),
            r => Err(CommandError::Link(unexpected(&request, &r))),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn request_name(request: &SlvRequest) -> String {
    match request {
        SlvRequest::Ping => "Ping".into(),
        SlvRequest::SetExtSpeed { .. } => "SetExtSpeed".into(),
        SlvRequest::MoveJoints { .. } => "MoveJoints".into(),
        SlvRequest::SetCtrlLog { .. } => "SetCtrlLog".into(),
        SlvRequest::ChangeMode(m) => format!("ChangeMode({})", m),
        SlvRequest::SlvMove(_) => "SlvMove".into(),
    }
}

fn unexpected(request: &SlvRequest, response: &SlvResponse) -> LinkError {
    LinkError::UnexpectedResponse {
        request: request_name(request),
        response: format!("{:?}", response),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::REPORTED_POSE_WIDTH;
    use std::thread;

    fn params(endpoint: &str) -> NetLinkParams {
        NetLinkParams {
            endpoint: endpoint.into(),
            num_joints: 2,
            connect_timeout_ms: 1000,
            recv_timeout_ms: 2000,
            send_timeout_ms: 1000,
        }
    }

    /// Bind a server which answers each request with the next scripted response, and returns the
    /// requests it recieved.
    fn scripted_server(
        ctx: &zmq::Context,
        endpoint: &str,
        responses: Vec<SlvResponse>,
    ) -> thread::JoinHandle<Vec<SlvRequest>> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 2000,
            send_timeout: 1000,
            linger: 1000,
            ..Default::default()
        };
        let socket = MonitoredSocket::new(ctx, zmq::REP, &socket_options, endpoint).unwrap();

        thread::spawn(move || {
            let mut requests = Vec::new();
            for response in responses {
                requests.push(socket.recv_json::<SlvRequest>().unwrap());
                socket.send_json(&response).unwrap();
            }
            requests
        })
    }

    fn pose(v: f64) -> CommandPose {
        CommandPose {
            joints_deg: vec![v; 2],
        }
    }

    #[test]
    fn test_exchanges() {
        let ctx = zmq::Context::new();
        let endpoint = "tcp://127.0.0.1:35021";

        let mut reported = [0.0; REPORTED_POSE_WIDTH];
        reported[0] = 4.0;
        reported[1] = 4.0;

        let server = scripted_server(
            &ctx,
            endpoint,
            vec![
                SlvResponse::Ack,
                SlvResponse::Rejected {
                    code: -5,
                    reason: "not in slave mode".into(),
                },
                SlvResponse::Ack,
                SlvResponse::Pose(ReportedPose(reported)),
                SlvResponse::Ack,
                SlvResponse::Rejected {
                    code: -6,
                    reason: "joint moves are not allowed in slave mode".into(),
                },
            ],
        );

        let mut link = NetLink::connect(&ctx, &params(endpoint)).unwrap();
        assert_eq!(link.num_joints(), 2);

        assert!(matches!(
            link.send_pose(&pose(1.0)),
            Err(CommandError::Rejected { code: -5, .. })
        ));

        link.change_mode(SlvMode::Slave).unwrap();
        assert_eq!(link.send_pose(&pose(4.0)).unwrap(), ReportedPose(reported));

        // An acknowledgement is not a valid answer to a slave move
        assert!(matches!(
            link.send_pose(&pose(5.0)),
            Err(CommandError::Link(LinkError::UnexpectedResponse { .. }))
        ));

        match link.move_to(&pose(0.0), 25.0) {
            Err(LinkError::Rejected { request, code, .. }) => {
                assert_eq!(request, "MoveJoints");
                assert_eq!(code, -6);
            }
            r => panic!("Expected a rejection, got {:?}", r),
        }

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 6);
        assert_eq!(requests[0], SlvRequest::Ping);
        assert_eq!(requests[2], SlvRequest::ChangeMode(SlvMode::Slave));
        assert_eq!(requests[3], SlvRequest::SlvMove(pose(4.0)));
    }

    #[test]
    fn test_connect_checks_ping() {
        let ctx = zmq::Context::new();
        let endpoint = "tcp://127.0.0.1:35022";

        let server = scripted_server(&ctx, endpoint, vec![SlvResponse::Pose(ReportedPose::nan())]);

        match NetLink::connect(&ctx, &params(endpoint)) {
            Err(LinkError::UnexpectedResponse { request, .. }) => assert_eq!(request, "Ping"),
            Err(e) => panic!("Expected an unexpected response error, got {}", e),
            Ok(_) => panic!("Expected the connection check to fail"),
        }

        server.join().unwrap();
    }
}
