//! Process-level exclusion lock.
//!
//! Only one `Context` may hold the write lock on a given target root at a
//! time; readers (`probe_only`) never block. Grounded on libzypp's
//! `ZyppLock`: a pid file at `<root>/.pkgrepo.lock` whose content is the
//! holder's pid, liveness-checked through `/proc/<pid>` (including a zombie
//! check via an empty `cmdline`), truncated rather than deleted on release
//! so a racing reader never sees "no file" as "uncontended", and a
//! secondary `zypp-rpm.pid` probe for a concurrent rpm transaction run
//! outside this process entirely.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use crate::error::{CoreError, CoreResult};

const LOCK_FILE_NAME: &str = ".pkgrepo.lock";
const RPM_PID_FILE_NAME: &str = "zypp-rpm.pid";
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Holds the process-level exclusion lock on a target root for as long as
/// it is alive. Dropping it releases the advisory lock and truncates (but
/// does not remove) the pid file.
pub struct ExclusionLock {
    file: File,
    path: PathBuf,
}

impl ExclusionLock {
    /// Acquire the lock on `root`, blocking (with bounded exponential
    /// backoff) until `timeout` elapses. `timeout = None` waits
    /// indefinitely (`ZYPP_LOCK_TIMEOUT` negative). Returns immediately
    /// without touching the filesystem if `readonly_hack` is set.
    pub fn acquire(root: &Path, timeout: Option<Duration>, readonly_hack: bool) -> CoreResult<Option<Self>> {
        if readonly_hack {
            return Ok(None);
        }

        let path = root.join(LOCK_FILE_NAME);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| CoreError::io(&path, e))?;

        let start = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(_) if would_steal_from_dead_holder(&file) => {
                    FileExt::lock_exclusive(&file)
                        .map_err(|e| CoreError::io(&path, e))?;
                    break;
                }
                Err(_) => {
                    if let Some(timeout) = timeout {
                        if start.elapsed() >= timeout {
                            let mut holder_file = file.try_clone().map_err(|e| CoreError::io(&path, e))?;
                            let pid = read_pid(&mut holder_file);
                            let name = pid
                                .and_then(process_name)
                                .unwrap_or_else(|| "unknown".to_string());
                            return Err(CoreError::SystemLocked { pid, name });
                        }
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        write_pid(&file, &path)?;
        Ok(Some(Self { file, path }))
    }

    /// Check (without blocking or writing) whether `root` is currently
    /// locked by a live process, and separately whether an external
    /// `zypp-rpm` transaction is in flight against it. Never acquires
    /// anything; used by read-only inspection tools.
    pub fn probe_only(root: &Path) -> LockProbe {
        let lock_path = root.join(LOCK_FILE_NAME);
        let locked_by = std::fs::File::open(&lock_path)
            .ok()
            .and_then(|mut f| read_pid(&mut f))
            .filter(|pid| pid_is_live(*pid));

        let rpm_path = root.join(RPM_PID_FILE_NAME);
        let rpm_transaction_pid = std::fs::File::open(&rpm_path)
            .ok()
            .and_then(|mut f| read_pid(&mut f))
            .filter(|pid| pid_is_live(*pid));

        LockProbe {
            locked_by,
            rpm_transaction_pid,
        }
    }
}

impl Drop for ExclusionLock {
    fn drop(&mut self) {
        // Truncate, don't remove: a concurrent `probe_only` reader opening
        // the path between unlink and a new holder's create would otherwise
        // observe a nonexistent file and misreport "unlocked" for a window
        // that doesn't actually exist.
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
        let _ = &self.path;
    }
}

/// Result of [`ExclusionLock::probe_only`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockProbe {
    /// Pid of the process currently holding the exclusion lock, if any and
    /// it is still alive.
    pub locked_by: Option<u32>,
    /// Pid of an in-flight external rpm transaction, if any and it is
    /// still alive.
    pub rpm_transaction_pid: Option<u32>,
}

impl LockProbe {
    /// Whether the root is free to lock right now, as far as this probe
    /// can tell.
    pub fn is_free(&self) -> bool {
        self.locked_by.is_none() && self.rpm_transaction_pid.is_none()
    }
}

fn write_pid(file: &File, path: &Path) -> CoreResult<()> {
    let mut file = file.try_clone().map_err(|e| CoreError::io(path, e))?;
    file.set_len(0).map_err(|e| CoreError::io(path, e))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| CoreError::io(path, e))?;
    write!(file, "{}", std::process::id()).map_err(|e| CoreError::io(path, e))?;
    Ok(())
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut buf = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut buf).ok()?;
    buf.trim().parse().ok()
}

/// Whether `file`'s recorded holder pid is dead (or a zombie), in which
/// case a failed `try_lock_exclusive` should be treated as stale rather
/// than genuinely contended. A held `flock` is always released by the
/// kernel when its owning process exits, so this only matters for lock
/// files written by something other than this process's own flock
/// discipline (e.g. after an unclean shutdown that left stale pid content
/// behind without the advisory lock itself, which this function guards
/// against spinning on forever).
fn would_steal_from_dead_holder(file: &File) -> bool {
    let mut file = match file.try_clone() {
        Ok(f) => f,
        Err(_) => return false,
    };
    match read_pid(&mut file) {
        Some(pid) => !pid_is_live(pid),
        None => false,
    }
}

#[cfg(unix)]
fn pid_is_live(pid: u32) -> bool {
    let proc_dir = PathBuf::from(format!("/proc/{pid}"));
    if !proc_dir.exists() {
        return false;
    }
    // A zombie still has a /proc/<pid> entry but an empty cmdline.
    match std::fs::read(proc_dir.join("cmdline")) {
        Ok(bytes) => !bytes.is_empty(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn pid_is_live(_pid: u32) -> bool {
    // Non-unix targets have no /proc; treat every recorded pid as live so
    // we never steal a lock we cannot actually verify is abandoned.
    true
}

#[cfg(unix)]
fn process_name(pid: u32) -> Option<String> {
    let comm = std::fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
    let name = comm.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(not(unix))]
fn process_name(_pid: u32) -> Option<String> {
    None
}
