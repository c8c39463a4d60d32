//! Single-instance guard backed by a `pid|epochSeconds` marker file.
//!
//! A record is valid only while its pid is alive and it is younger than the
//! staleness threshold. Dead-pid records are cleared silently; live but old
//! records need operator confirmation before they are cleared.

use std::ffi::CString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use time::OffsetDateTime;

use crate::prompt::Prompter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    pub pid: u32,
    pub acquired_at: i64,
}

impl LockRecord {
    pub fn parse(contents: &str) -> Option<Self> {
        let (pid, acquired_at) = contents.trim().split_once('|')?;
        Some(Self {
            pid: pid.trim().parse().ok()?,
            acquired_at: acquired_at.trim().parse().ok()?,
        })
    }

    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.acquired_at).max(0)
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pid, self.acquired_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held(LockRecord),
    /// Dead owner, or content that is not a lock record.
    Stale(Option<LockRecord>),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another waydock instance is running (pid {pid}, started {age_secs}s ago); run `waydock clean` if this is wrong")]
    Held { pid: u32, age_secs: i64 },
    #[error("lock held by pid {pid} for {age_secs}s was kept at operator request")]
    Declined { pid: u32, age_secs: i64 },
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait ProcessTable {
    fn is_alive(&self, pid: u32) -> bool;
}

pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match signal::kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

pub struct LockManager {
    path: PathBuf,
    stale_after_secs: i64,
}

impl LockManager {
    pub fn new(path: PathBuf, stale_after_secs: i64) -> Self {
        Self {
            path,
            stale_after_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inspect(&self, procs: &dyn ProcessTable) -> Result<LockState, LockError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LockState::Unlocked),
            Err(source) => {
                return Err(LockError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match LockRecord::parse(&contents) {
            Some(record) if procs.is_alive(record.pid) => Ok(LockState::Held(record)),
            Some(record) => Ok(LockState::Stale(Some(record))),
            None => Ok(LockState::Stale(None)),
        }
    }

    /// Takes the lock for this process. A live, fresh record fails fast
    /// without touching the file.
    pub fn acquire(
        &self,
        procs: &dyn ProcessTable,
        prompter: &dyn Prompter,
    ) -> Result<LockGuard, LockError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match self.inspect(procs)? {
            LockState::Unlocked => {}
            LockState::Held(record) => {
                let age_secs = record.age_secs(now);
                if age_secs <= self.stale_after_secs {
                    return Err(LockError::Held {
                        pid: record.pid,
                        age_secs,
                    });
                }
                warn!(
                    "lock held by live pid {} for {}s (threshold {}s)",
                    record.pid, age_secs, self.stale_after_secs
                );
                let question = format!(
                    "Process {} has held the lock for {}s. It may be a long-running operation. Remove the lock anyway?",
                    record.pid, age_secs
                );
                let confirmed = prompter.confirm_interactive(&question, false).unwrap_or(false);
                if !confirmed {
                    return Err(LockError::Declined {
                        pid: record.pid,
                        age_secs,
                    });
                }
                self.remove_file()?;
            }
            LockState::Stale(record) => {
                match record {
                    Some(record) => debug!("clearing stale lock left by dead pid {}", record.pid),
                    None => debug!("clearing unreadable lock file {}", self.path.display()),
                }
                self.remove_file()?;
            }
        }
        self.write_fresh(now)
    }

    /// Operator escape hatch: removes the marker regardless of state.
    pub fn force_clean(&self) -> Result<bool, LockError> {
        self.remove_file()
    }

    fn write_fresh(&self, now: i64) -> Result<LockGuard, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: now,
        };
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                // Lost a race with another instance between clear and create.
                let holder = fs::read_to_string(&self.path)
                    .ok()
                    .and_then(|contents| LockRecord::parse(&contents));
                return Err(LockError::Held {
                    pid: holder.map(|r| r.pid).unwrap_or(0),
                    age_secs: holder.map(|r| r.age_secs(now)).unwrap_or(0),
                });
            }
            Err(source) => return Err(self.io_error(source)),
        };
        file.write_all(record.to_string().as_bytes())
            .map_err(|source| self.io_error(source))?;
        info!("lock acquired at {} ({})", self.path.display(), record);
        Ok(LockGuard {
            path: self.path.clone(),
            record,
        })
    }

    fn remove_file(&self) -> Result<bool, LockError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Removes the marker file when dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    record: LockRecord,
}

impl LockGuard {
    pub fn record(&self) -> LockRecord {
        self.record
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Installs SIGINT/SIGTERM/SIGHUP handlers that unlink this lock and exit.
    pub fn release_on_signal(&self) -> anyhow::Result<()> {
        arm_signal_release(&self.path)?;
        let action = SigAction::new(
            SigHandler::Handler(on_terminate),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            unsafe { signal::sigaction(sig, &action) }
                .map_err(|err| anyhow::anyhow!("install {sig:?} handler: {err}"))?;
        }
        Ok(())
    }

    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        disarm_signal_release();
        match fs::remove_file(&self.path) {
            Ok(()) => info!("lock released at {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove lock {}: {}", self.path.display(), err),
        }
    }
}

static ARMED_LOCK: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());

fn arm_signal_release(path: &Path) -> anyhow::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())?;
    let previous = ARMED_LOCK.swap(c_path.into_raw(), Ordering::SeqCst);
    if !previous.is_null() {
        drop(unsafe { CString::from_raw(previous) });
    }
    Ok(())
}

fn disarm_signal_release() {
    let previous = ARMED_LOCK.swap(ptr::null_mut(), Ordering::SeqCst);
    if !previous.is_null() {
        drop(unsafe { CString::from_raw(previous) });
    }
}

/// Unlinks the armed lock path. Async-signal-safe: one atomic load and `unlink`.
pub fn release_armed_lock() {
    let path = ARMED_LOCK.load(Ordering::SeqCst);
    if !path.is_null() {
        unsafe {
            libc::unlink(path);
        }
    }
}

extern "C" fn on_terminate(signal: libc::c_int) {
    release_armed_lock();
    unsafe { libc::_exit(128 + signal) };
}
