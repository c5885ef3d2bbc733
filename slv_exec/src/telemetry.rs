//! # Telemetry Recorder
//!
//! Accumulates one record per control loop iteration and writes them out at the end of a run.
//!
//! A flush produces three parallel text files with one line per record, in append order:
//! - `<stem>.positions`: the reported pose, 6 space separated values with 17 significant digits,
//! - `<stem>.timestamps`: the trajectory time at which the pose was commanded,
//! - `<stem>.status`: `ok`, `retried` or `failed: <reason>`.
//!
//! Failed samples have no reported pose and are written as a row of `nan`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use comms_if::eqpt::ReportedPose;
use log::info;
use serde::Serialize;
use util::{
    archive::{self, ArchiveError},
    float_fmt::fmt_round_trip,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single control loop sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Trajectory time at which the pose was commanded.
    ///
    /// Units: seconds
    pub traj_time_s: f64,

    /// Pose reported by the controller, all NaN if the command failed.
    ///
    /// Units: degrees
    pub pose: ReportedPose,

    /// Measured round trip time of the command, including any retry.
    ///
    /// Units: seconds
    pub latency_s: f64,

    pub status: SampleStatus,
}

/// In-memory, append only store of telemetry records.
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    records: Vec<TelemetryRecord>,
}

/// Paths of the files a recorder is flushed to.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryDest {
    pub positions: PathBuf,
    pub timestamps: PathBuf,
    pub status: PathBuf,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Ok,

    /// The first attempt failed, the retry succeeded
    Retried,

    Failed { reason: String },
}

/// Errors raised while persisting telemetry. The recorder keeps every record when these occur.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Could not write the positions log: {0}")]
    PositionsError(ArchiveError),

    #[error("Could not write the timestamps log: {0}")]
    TimestampsError(ArchiveError),

    #[error("Could not write the status log: {0}")]
    StatusError(ArchiveError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemetryRecord {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, SampleStatus::Failed { .. })
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder with room for the given number of records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Add a record after all previous ones.
    pub fn append(&mut self, record: TelemetryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    /// Write every record to the destination files.
    ///
    /// All three files are written to temporary files first and only then moved over their
    /// destinations. If any of them cannot be written or moved, the previous files are left (or
    /// put back) as they were.
    pub fn flush(&self, dest: &TelemetryDest) -> Result<(), PersistError> {
        let positions = archive::stage_table(
            &dest.positions,
            self.records
                .iter()
                .map(|r| r.pose.0.iter().map(|v| fmt_round_trip(*v)).collect::<Vec<_>>()),
        )
        .map_err(PersistError::PositionsError)?;

        let timestamps = archive::stage_lines(
            &dest.timestamps,
            self.records.iter().map(|r| fmt_round_trip(r.traj_time_s)),
        )
        .map_err(PersistError::TimestampsError)?;

        let status = archive::stage_lines(
            &dest.status,
            self.records.iter().map(|r| r.status.to_string()),
        )
        .map_err(PersistError::StatusError)?;

        archive::commit_all(vec![positions, timestamps, status]).map_err(|e| match e.index {
            0 => PersistError::PositionsError(e.source),
            1 => PersistError::TimestampsError(e.source),
            _ => PersistError::StatusError(e.source),
        })?;

        info!(
            "{} telemetry records written to {:?}",
            self.records.len(),
            dest.positions.parent().unwrap_or_else(|| Path::new("."))
        );

        Ok(())
    }
}

impl TelemetryDest {
    /// Destination files named `<stem>.positions`, `<stem>.timestamps` and `<stem>.status` in the
    /// given directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P, stem: &str) -> Self {
        let dir = dir.as_ref();

        Self {
            positions: dir.join(format!("{}.positions", stem)),
            timestamps: dir.join(format!("{}.timestamps", stem)),
            status: dir.join(format!("{}.status", stem)),
        }
    }
}

impl std::fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleStatus::Ok => write!(f, "ok"),
            SampleStatus::Retried => write!(f, "retried"),
            // Reasons must stay on one line to keep the files parallel
            SampleStatus::Failed { reason } => {
                write!(f, "failed: {}", reason.replace(&['\n', '\r'][..], " "))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(s: f64, v: f64, status: SampleStatus) -> TelemetryRecord {
        TelemetryRecord {
            traj_time_s: s,
            pose: match status {
                SampleStatus::Failed { .. } => ReportedPose::nan(),
                _ => ReportedPose([v; 6]),
            },
            latency_s: 0.1,
            status,
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_flush() {
        let dir = tempfile::tempdir().unwrap();
        let dest = TelemetryDest::in_dir(dir.path(), "run");

        let mut rec = TelemetryRecorder::new();
        rec.append(record(0.0, 1.5, SampleStatus::Ok));
        rec.append(record(0.05, 2.0, SampleStatus::Retried));
        rec.append(record(
            0.1,
            0.0,
            SampleStatus::Failed {
                reason: "rejected\nby controller".into(),
            },
        ));

        rec.flush(&dest).unwrap();

        let positions = read_lines(&dest.positions);
        let timestamps = read_lines(&dest.timestamps);
        let status = read_lines(&dest.status);

        assert_eq!(positions.len(), 3);
        assert_eq!(timestamps.len(), 3);
        assert_eq!(status.len(), 3);

        for line in &positions {
            assert_eq!(line.split(' ').count(), 6);
        }
        assert_eq!(positions[0], "1.5 1.5 1.5 1.5 1.5 1.5");
        assert_eq!(positions[2], "nan nan nan nan nan nan");

        assert_eq!(timestamps[0], "0");
        assert_eq!(timestamps[1], "0.050000000000000003");

        assert_eq!(status, vec!["ok", "retried", "failed: rejected by controller"]);

        // Records are still held after flushing
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_flush_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dest = TelemetryDest::in_dir(dir.path(), "empty");

        let rec = TelemetryRecorder::with_capacity(10);
        assert!(rec.is_empty());

        rec.flush(&dest).unwrap();

        assert_eq!(std::fs::read_to_string(&dest.positions).unwrap(), "");
        assert_eq!(std::fs::read_to_string(&dest.timestamps).unwrap(), "");
        assert_eq!(std::fs::read_to_string(&dest.status).unwrap(), "");
    }

    #[test]
    fn test_flush_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let dest = TelemetryDest::in_dir(dir.path(), "run");

        let mut rec = TelemetryRecorder::new();
        rec.append(record(0.0, 1.0, SampleStatus::Ok));
        rec.append(record(0.1, 1.0, SampleStatus::Ok));
        rec.flush(&dest).unwrap();

        let mut rec = TelemetryRecorder::new();
        rec.append(record(0.0, 3.0, SampleStatus::Ok));
        rec.flush(&dest).unwrap();

        assert_eq!(read_lines(&dest.positions), vec!["3 3 3 3 3 3"]);
        assert_eq!(read_lines(&dest.timestamps).len(), 1);
    }

    #[test]
    fn test_failed_flush_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let dest = TelemetryDest::in_dir(dir.path(), "run");

        let mut rec = TelemetryRecorder::new();
        rec.append(record(0.0, 1.0, SampleStatus::Ok));
        rec.flush(&dest).unwrap();

        // The status file can't be staged in a directory which doesn't exist, so nothing may
        // be replaced
        let mut bad_dest = dest.clone();
        bad_dest.status = dir.path().join("missing").join("run.status");

        rec.append(record(0.1, 2.0, SampleStatus::Ok));
        let res = rec.flush(&bad_dest);

        assert!(matches!(res, Err(PersistError::StatusError(_))));
        assert_eq!(read_lines(&dest.positions), vec!["1 1 1 1 1 1"]);
        assert_eq!(read_lines(&dest.timestamps), vec!["0"]);
        assert_eq!(rec.len(), 2);

        // Retrying to a valid destination writes everything
        rec.flush(&dest).unwrap();
        assert_eq!(read_lines(&dest.positions).len(), 2);
    }

    #[test]
    fn test_failed_commit_restores_previous() {
        let dir = tempfile::tempdir().unwrap();
        let dest = TelemetryDest::in_dir(dir.path(), "run");

        let mut rec = TelemetryRecorder::new();
        rec.append(record(0.0, 1.0, SampleStatus::Ok));
        rec.flush(&dest).unwrap();

        // Staging succeeds but the timestamps file can't be renamed over a non-empty directory,
        // after positions has already been replaced
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();

        let mut bad_dest = dest.clone();
        bad_dest.timestamps = blocked.clone();

        rec.append(record(0.1, 2.0, SampleStatus::Ok));
        rec.append(record(0.2, 3.0, SampleStatus::Ok));
        let res = rec.flush(&bad_dest);

        assert!(matches!(res, Err(PersistError::TimestampsError(_))));
        assert_eq!(read_lines(&dest.positions), vec!["1 1 1 1 1 1"]);
        assert_eq!(read_lines(&dest.timestamps), vec!["0"]);
        assert_eq!(read_lines(&dest.status), vec!["ok"]);
        assert!(blocked.is_dir());

        // Only the three previous files and the blocking directory remain
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }
}
