//! State store: durable JSON persistence of [`DeploymentState`] per network.
//!
//! Persists one document at `<home>/.daomig/state/<network>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the configuration, so a
//! crash mid-write leaves the previous state intact.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use daomig_core::config::daomig_root;
use daomig_core::NetworkKey;

use crate::error::{io_err, LedgerError};
use crate::state::{DeploymentState, STATE_FORMAT_VERSION};

/// `<home>/.daomig/state/`
pub fn state_dir_at(home: &Path) -> PathBuf {
    daomig_root(home).join("state")
}

/// `<home>/.daomig/state/<network>.json`
pub fn state_path_at(home: &Path, network: &NetworkKey) -> PathBuf {
    state_dir_at(home).join(format!("{network}.json"))
}

/// `<home>/.daomig/state/<network>.lock`
pub fn lock_path_at(home: &Path, network: &NetworkKey) -> PathBuf {
    state_dir_at(home).join(format!("{network}.lock"))
}

/// Load the state for `network`.
///
/// Returns a fresh empty state if the file does not yet exist.
pub fn load_at(home: &Path, network: &NetworkKey) -> Result<DeploymentState, LedgerError> {
    let path = state_path_at(home, network);
    if !path.exists() {
        debug!(network = %network, "no saved state; starting fresh");
        return Ok(DeploymentState::empty(network.clone()));
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let state: DeploymentState = serde_json::from_str(&contents).map_err(|source| LedgerError::Parse {
        path: path.clone(),
        source,
    })?;
    if state.format != STATE_FORMAT_VERSION {
        return Err(LedgerError::UnsupportedFormat {
            path,
            found: state.format,
            expected: STATE_FORMAT_VERSION,
        });
    }
    if &state.network != network {
        warn!(
            file = %path.display(),
            recorded = %state.network,
            "state file names a different network"
        );
    }
    Ok(state)
}

/// Save the state atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, state: &DeploymentState) -> Result<(), LedgerError> {
    let path = state_path_at(home, &state.network);
    let json = serde_json::to_string_pretty(state)?;
    write_atomic(&path, json.as_bytes())
}

/// Discard all progress for `network`. Missing state is not an error.
pub fn clear_at(home: &Path, network: &NetworkKey) -> Result<bool, LedgerError> {
    let path = state_path_at(home, network);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(&path, e)),
    }
}

/// Shared atomic writer: create parent, write `.tmp`, chmod 0600, rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid state path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), LedgerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), LedgerError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Run lock
// ---------------------------------------------------------------------------

/// Exclusive per-network lock held for the duration of one run.
///
/// An advisory `flock` on a persistent `<network>.lock` file. The kernel drops
/// it when the holding process exits, however it exits, so a lock file left
/// behind by an interrupted run never blocks the next one.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    pub fn acquire_at(home: &Path, network: &NetworkKey) -> Result<Self, LedgerError> {
        let path = lock_path_at(home, network);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        if !try_flock_exclusive(&file).map_err(|e| io_err(&path, e))? {
            return Err(LedgerError::Locked { path });
        }
        // Holder pid, for operators inspecting the file.
        file.set_len(0).map_err(|e| io_err(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| io_err(&path, e))?;
        debug!(lock = %path.display(), "acquired run lock");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blocking exclusive `flock`. `Ok(false)` when another open file
/// description already holds it.
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: `fd` is a valid descriptor owned by `file` for the duration
        // of the call; LOCK_NB keeps the call from blocking.
        #[allow(unsafe_code)]
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}
