//! Simple controller probe, sends a ping to a controller endpoint and reports the round trip time.

use comms_if::{
    eqpt::{SlvRequest, SlvResponse},
    net::{zmq, MonitoredSocket, SocketOptions},
};
use std::time::Instant;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "slv_probe", about = "Ping a slave mode controller")]
struct Opts {
    /// Controller endpoint
    #[structopt(default_value = "tcp://localhost:5020")]
    endpoint: String,

    /// Number of pings to send
    #[structopt(short, long, default_value = "5")]
    count: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: 1000,
        send_timeout: 100,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    let socket = match MonitoredSocket::new(&ctx, zmq::REQ, &socket_options, &opts.endpoint) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to {}", opts.endpoint);
            return Err(e.into());
        }
    };

    for i in 0..opts.count {
        let start = Instant::now();

        match socket.request::<_, SlvResponse>(&SlvRequest::Ping) {
            Ok(r) => println!(
                "[{}] {:?} in {:.3} ms",
                i,
                r,
                start.elapsed().as_secs_f64() * 1e3
            ),
            Err(e) => println!("[{}] no response: {}", i, e),
        }
    }

    Ok(())
}
