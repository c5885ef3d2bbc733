//! # Controller Server Module
//!
//! This module abstracts over the networking side of the controller simulator. The server answers
//! requests from the link in the slave trajectory executable, one response per request.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::{SlvRequest, SlvResponse},
    net::{zmq, JsonMsgError, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::params::CtrlSimExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the controller simulator.
pub struct CtrlServer {
    /// REP socket which accepts requests from the client
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`CtrlServer`]
#[derive(thiserror::Error, Debug)]
pub enum CtrlServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response to the client: {0}")]
    SendError(JsonMsgError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlServer {
    /// Create a new instance of the controller server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(ctx: &zmq::Context, params: &CtrlSimExecParams) -> Result<Self, CtrlServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 200,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, &socket_options, &params.endpoint)?;

        Ok(Self { socket })
    }

    /// Wait for the next request from the client.
    ///
    /// `None` is returned if nothing arrived within the receive timeout. A request which arrived,
    /// including one which could not be parsed, must be answered with [`send_response`] before
    /// the next call. A receive error has nothing to answer.
    ///
    /// [`send_response`]: CtrlServer::send_response
    pub fn get_request(&mut self) -> Option<Result<SlvRequest, JsonMsgError>> {
        match self.socket.recv_json() {
            Ok(r) => Some(Ok(r)),
            Err(JsonMsgError::RecvError(zmq::Error::EAGAIN)) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Send the response to the last request.
    pub fn send_response(&mut self, response: &SlvResponse) -> Result<(), CtrlServerError> {
        self.socket
            .send_json(response)
            .map_err(CtrlServerError::SendError)
    }
}

impl From<MonitoredSocketError> for CtrlServerError {
    fn from(e: MonitoredSocketError) -> Self {
        CtrlServerError::SocketError(e)
    }
}
