//! Process groups of running commands
//!
//! On unix every command is spawned as the leader of its own process group,
//! so killing the group also takes down anything the shell started. A
//! [`ChildGroups`] registry lets the owner of a batch kill every command
//! that is still running, e.g. after the batch deadline passed and the
//! process is about to exit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared set of live process group ids
#[derive(Debug, Clone, Default)]
pub struct ChildGroups {
    live: Arc<Mutex<HashSet<u32>>>,
}

impl ChildGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands currently running
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// SIGKILL every registered process group.
    ///
    /// Returns how many groups were signalled. Groups leave the registry when
    /// their command is reaped, not here.
    pub fn kill_all(&self) -> usize {
        let live: Vec<u32> = self.lock().iter().copied().collect();
        live.into_iter()
            .filter(|&pgid| {
                let killed = kill_group(pgid);
                tracing::debug!("Killing process group {}: {}", pgid, killed);
                killed
            })
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u32>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Kills a spawned command's process group on drop unless disarmed
///
/// Disarm once the child has been reaped; the pid may be reused after that.
pub(crate) struct GroupGuard {
    pgid: Option<u32>,
    groups: Option<ChildGroups>,
    armed: bool,
}

impl GroupGuard {
    pub(crate) fn new(pgid: Option<u32>, groups: Option<&ChildGroups>) -> Self {
        let groups = groups.cloned();
        if let (Some(pgid), Some(groups)) = (pgid, &groups) {
            groups.lock().insert(pgid);
        }
        Self {
            pgid,
            groups,
            armed: true,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid else {
            return;
        };
        if self.armed {
            kill_group(pgid);
        }
        if let Some(groups) = &self.groups {
            groups.lock().remove(&pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    // SAFETY: killpg takes plain integers and only sends a signal.
    unsafe { libc::killpg(pgid, libc::SIGKILL) == 0 }
}

// Without process groups the spawned child is killed through kill_on_drop.
#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> bool {
    false
}
