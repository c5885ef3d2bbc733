//! # Slave Trajectory Executable
//!
//! Plays a trajectory file on a robot controller in slave mode:
//! - Moves the robot to the start of the trajectory,
//! - Streams the trajectory to the controller one slave move at a time,
//! - Writes the poses reported by the controller to the session archive.
//!
//! With `--sim` the controller is simulated in-process and no time is spent waiting.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{error, info, warn};
use std::{path::PathBuf, time::Duration};
use structopt::StructOpt;

// Internal
use slv_lib::{
    clock::{Clock, ManualClock},
    hw_link::{HardwareLink, SimLink, SlaveSession},
    params::SlvExecParams,
    pose::{DegEncoder, PoseEncoder},
    telemetry::{PersistError, TelemetryDest, TelemetryRecorder},
    traj::{load_traj_file, Trajectory},
    traj_exec::{RunSummary, TrajExec, TrajExecError},
};
use util::{
    host,
    logger::{logger_init, parse_level},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "slv_exec", about = "Execute a trajectory on a controller in slave mode")]
struct Opts {
    /// Trajectory file to execute
    #[structopt(parse(from_os_str))]
    traj: PathBuf,

    /// Parameter file, relative to the params directory of the software root
    #[structopt(short, long, default_value = "slv_exec.toml")]
    params: String,

    /// Run against a simulated controller instead of the real one
    #[structopt(long)]
    sim: bool,

    /// Stretch the trajectory in time by this factor before executing it
    #[structopt(long)]
    retime: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("slv_exec", "sessions").wrap_err("Failed to create the session")?;

    let params: SlvExecParams = util::params::load(&opts.params)
        .wrap_err_with(|| format!("Failed to load parameters from {}", opts.params))?;

    logger_init(parse_level(&params.log_level)?, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Slave Trajectory Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| String::from("unknown host"))
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD TRAJECTORY ----

    let mut traj = load_traj_file(&opts.traj)
        .wrap_err_with(|| format!("Failed to load the trajectory {:?}", opts.traj))?;

    if let Some(coef) = opts.retime {
        traj = traj.retime(coef).wrap_err("Failed to retime the trajectory")?;
        info!("Trajectory retimed by {}", coef);
    }

    info!(
        "Loaded trajectory {:?}: {} chunks, {} joints, duration {:.3} s",
        opts.traj,
        traj.chunks().len(),
        traj.dimension(),
        traj.duration()
    );

    // ---- LINK INITIALISATION ----

    let (mut link, clock) = match opts.sim {
        true => sim_link(&params)?,
        false => net_link(&params)?,
    };

    if traj.dimension() != link.num_joints() {
        return Err(TrajExecError::DimensionMismatch {
            traj: traj.dimension(),
            link: link.num_joints(),
        })
        .wrap_err("The trajectory does not match the robot");
    }

    let exec = TrajExec::new(params.exec.clone(), clock, DegEncoder)
        .wrap_err("Invalid execution configuration")?;

    // ---- SETUP ----

    link.set_ext_speed(params.setup.ext_speed_pct)
        .wrap_err("Failed to set the external speed")?;

    let start = DegEncoder.encode(&traj.eval(0.0));
    info!("Moving to the start of the trajectory: {:?}", start.joints_deg);
    link.move_to(&start, params.setup.approach_speed_pct)
        .wrap_err("Failed to move to the start of the trajectory")?;

    if opts.sim {
        info!("Simulated controller, no settle time");
    } else {
        info!("Settling for {} s", params.setup.settle_time_s);
        std::thread::sleep(Duration::from_secs_f64(params.setup.settle_time_s.max(0.0)));
    }

    if params.setup.ctrl_log {
        link.set_ctrl_log(true)
            .wrap_err("Failed to start the controller log")?;
    }

    // ---- EXECUTION ----

    let mut recorder = TelemetryRecorder::new();

    let run_res = execute(&exec, &traj, &mut link, &mut recorder);

    if let Err(ref e) = run_res {
        error!("{:?}", e);
        warn!("{} telemetry records were collected before the failure", recorder.len());
    }

    let ctrl_log_res = match params.setup.ctrl_log {
        true => link.set_ctrl_log(false),
        false => Ok(()),
    };

    // ---- PERSISTENCE ----

    let persist_res = persist(&recorder, &session, &params.output.stem);

    // A run which stopped early still gets a summary of what was recorded
    let summary = match run_res {
        Ok(ref s) => s.clone(),
        Err(_) => RunSummary::partial(recorder.records(), traj.duration()),
    };
    let summary_res = session.save_json("run_summary.json", &summary);

    run_res?;
    persist_res.wrap_err("Failed to write telemetry")?;
    ctrl_log_res.wrap_err("Failed to stop the controller log")?;
    summary_res.wrap_err("Failed to save the run summary")?;

    info!("Execution complete");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a simulated link, which shares a manual clock with the control loop.
fn sim_link(params: &SlvExecParams) -> Result<(Box<dyn HardwareLink>, Box<dyn Clock>)> {
    if !params.sim.latency_s.is_finite() || params.sim.latency_s <= 0.0 {
        return Err(eyre!(
            "Simulated latency must be finite and positive, got {}",
            params.sim.latency_s
        ));
    }

    let clock = ManualClock::default();
    let link = SimLink::new(
        params.link.num_joints,
        Duration::from_secs_f64(params.sim.latency_s),
        clock.clone(),
    )
    .with_failures(params.sim.failures.iter().copied());

    info!(
        "Using a simulated controller, latency {} s, {} injected failures",
        params.sim.latency_s,
        params.sim.failures.len()
    );

    Ok((Box::new(link), Box::new(clock)))
}

/// Connect to the real controller.
#[cfg(feature = "net")]
fn net_link(params: &SlvExecParams) -> Result<(Box<dyn HardwareLink>, Box<dyn Clock>)> {
    use comms_if::net::zmq;
    use slv_lib::{clock::MonotonicClock, hw_link::NetLink};

    let ctx = zmq::Context::new();

    let link =
        NetLink::connect(&ctx, &params.link).wrap_err("Failed to connect to the controller")?;

    Ok((Box::new(link), Box::new(MonotonicClock::new())))
}

#[cfg(not(feature = "net"))]
fn net_link(_params: &SlvExecParams) -> Result<(Box<dyn HardwareLink>, Box<dyn Clock>)> {
    Err(eyre!(
        "Built without network support, only the simulated controller (--sim) is available"
    ))
}

/// Run the trajectory inside a slave session.
fn execute<C, T, L>(
    exec: &TrajExec<C, DegEncoder>,
    traj: &T,
    link: &mut L,
    recorder: &mut TelemetryRecorder,
) -> Result<RunSummary>
where
    C: Clock,
    T: Trajectory + ?Sized,
    L: HardwareLink + ?Sized,
{
    let mut session = SlaveSession::acquire(link).wrap_err("Failed to enter slave mode")?;

    let run_res = exec.run(traj, &mut session, recorder);
    let release_res = session.release();

    match (run_res, release_res) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e).wrap_err("Failed to exit slave mode"),
        (Err(e), release_res) => {
            if let Err(r) = release_res {
                error!("{}", r);
            }
            Err(e).wrap_err("Trajectory execution failed")
        }
    }
}

/// Write the telemetry to the session archive, falling back to the system temporary directory if
/// that fails. The error from the session archive is returned even if the fallback succeeds.
fn persist(
    recorder: &TelemetryRecorder,
    session: &Session,
    stem: &str,
) -> Result<(), PersistError> {
    let dest = TelemetryDest::in_dir(&session.arch_root, stem);

    let err = match recorder.flush(&dest) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    error!("Could not write telemetry to the session archive: {}", err);

    let session_name = session
        .session_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("slv_exec"));
    let fallback =
        TelemetryDest::in_dir(std::env::temp_dir(), &format!("{}_{}", session_name, stem));

    match recorder.flush(&fallback) {
        Ok(()) => warn!("Telemetry written to {:?} instead", fallback.positions.parent()),
        Err(e) => error!("Could not write telemetry to the fallback location either: {}", e),
    }

    Err(err)
}
