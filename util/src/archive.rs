//! Atomic archive file writing
//!
//! Archive files are written to a temporary file next to the destination,
//! synced to disk, then renamed over the destination. A reader therefore sees
//! either the previous file or the complete new one, never a partial write.
//!
//! Writing is split into two steps so that a set of related files can all be
//! staged before any of them replaces its destination. [`commit_all`] then
//! replaces the whole set, restoring the previous files if any rename fails.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use log::warn;
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A fully written and synced temporary file waiting to replace its
/// destination.
///
/// Dropping a staged file without committing it removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    dest: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while writing an archive file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create a temporary file in {0:?}: {1}")]
    TempFileError(PathBuf, std::io::Error),

    #[error("Cannot write archive data: {0}")]
    WriteError(std::io::Error),

    #[error("Cannot write archive record: {0}")]
    RecordError(csv::Error),

    #[error("Cannot replace {0:?} with the new archive: {1}")]
    PersistError(PathBuf, std::io::Error),

    #[error("Cannot back up {0:?} before replacing it: {1}")]
    BackupError(PathBuf, std::io::Error),
}

/// Error from [`commit_all`], `index` is the position of the failed file in
/// the committed set.
#[derive(Debug, Error)]
#[error("Cannot commit archive {index} of the set: {source}")]
pub struct CommitAllError {
    pub index: usize,
    pub source: ArchiveError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StagedFile {
    /// The path this file will be moved to on commit.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Copy the current destination file, if there is one, next to it so it
    /// can be put back after a failed commit.
    fn backup_dest(&self) -> Result<Option<TempPath>, ArchiveError> {
        if !self.dest.is_file() {
            return Ok(None);
        }

        let dir = parent_dir(&self.dest);
        let backup = tempfile::Builder::new()
            .prefix(".bak")
            .tempfile_in(dir)
            .map_err(|e| ArchiveError::TempFileError(dir.to_path_buf(), e))?
            .into_temp_path();

        std::fs::copy(&self.dest, &backup)
            .map_err(|e| ArchiveError::BackupError(self.dest.clone(), e))?;

        Ok(Some(backup))
    }

    /// Rename the temporary file over the destination.
    pub fn commit(self) -> Result<PathBuf, ArchiveError> {
        let dest = self.dest;

        self.tmp
            .persist(&dest)
            .map_err(|e| ArchiveError::PersistError(dest.clone(), e.error))?;

        Ok(dest)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Write whatever `write_fn` produces into a temporary file in the same
/// directory as `path`, ready to be committed.
///
/// The parent directory must already exist. If `write_fn` fails the
/// temporary file is removed and the destination is left untouched.
pub fn stage<P, F>(path: P, write_fn: F) -> Result<StagedFile, ArchiveError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<(), ArchiveError>,
{
    let path = path.as_ref();
    let dir = parent_dir(path);

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| ArchiveError::TempFileError(dir.to_path_buf(), e))?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_fn(&mut writer)?;
        writer.flush().map_err(ArchiveError::WriteError)?;
    }

    tmp.as_file().sync_all().map_err(ArchiveError::WriteError)?;

    Ok(StagedFile {
        tmp,
        dest: path.to_path_buf(),
    })
}

/// Stage a whitespace separated table, one record per line and no header
/// row. All records must have the same number of fields.
pub fn stage_table<P, I, R>(path: P, records: I) -> Result<StagedFile, ArchiveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    stage(path, |w| {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .flexible(false)
            .from_writer(w);

        for record in records {
            csv_writer
                .write_record(record)
                .map_err(ArchiveError::RecordError)?;
        }

        csv_writer.flush().map_err(ArchiveError::WriteError)
    })
}

/// Stage each item on its own line.
pub fn stage_lines<P, I, S>(path: P, lines: I) -> Result<StagedFile, ArchiveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    stage(path, |w| {
        for line in lines {
            w.write_all(line.as_ref().as_bytes())
                .map_err(ArchiveError::WriteError)?;
            w.write_all(b"\n").map_err(ArchiveError::WriteError)?;
        }
        Ok(())
    })
}

/// Commit every staged file, or none of them.
///
/// Each destination is backed up before it is replaced. If any commit fails
/// the destinations already replaced get their previous contents back, and
/// ones which did not exist before are removed.
pub fn commit_all<I>(files: I) -> Result<Vec<PathBuf>, CommitAllError>
where
    I: IntoIterator<Item = StagedFile>,
{
    let mut committed: Vec<(PathBuf, Option<TempPath>)> = Vec::new();

    for (index, file) in files.into_iter().enumerate() {
        let res = file.backup_dest().and_then(|backup| {
            let dest = file.commit()?;
            Ok((dest, backup))
        });

        match res {
            Ok(c) => committed.push(c),
            Err(source) => {
                roll_back(committed);
                return Err(CommitAllError { index, source });
            }
        }
    }

    // Dropping the backups deletes them
    Ok(committed.into_iter().map(|(dest, _)| dest).collect())
}

/// Atomically replace the file at `path` with a whitespace separated table.
pub fn write_table<P, I, R>(path: P, records: I) -> Result<PathBuf, ArchiveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    stage_table(path, records)?.commit()
}

/// Atomically replace the file at `path` with the given lines.
pub fn write_lines<P, I, S>(path: P, lines: I) -> Result<PathBuf, ArchiveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    stage_lines(path, lines)?.commit()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn roll_back(committed: Vec<(PathBuf, Option<TempPath>)>) {
    for (dest, backup) in committed.into_iter().rev() {
        let res = match backup {
            Some(b) => b.persist(&dest).map_err(|e| e.error),
            None => std::fs::remove_file(&dest),
        };

        if let Err(e) = res {
            warn!("Could not restore {:?} after a failed commit: {}", dest, e);
        }
    }
}
