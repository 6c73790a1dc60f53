//! Process hardening
//!
//! Decrypted mnemonics only ever live in memory. Disabling core dumps keeps a
//! crash from writing them to disk. Best-effort: containers and unprivileged
//! users may refuse, in which case a warning is logged and startup continues.

use std::sync::atomic::{AtomicBool, Ordering};

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process.
///
/// Call once, early in startup. Returns `true` if core dumps are now off;
/// later calls return `true` without touching the limit again.
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.load(Ordering::SeqCst) {
        return true;
    }

    let disabled = platform::disable_core_dumps();
    if disabled {
        CORE_DUMPS_DISABLED.store(true, Ordering::SeqCst);
        log::debug!("Core dumps disabled");
    }
    disabled
}

#[cfg(unix)]
mod platform {
    pub fn disable_core_dumps() -> bool {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit only reads the struct we pass.
        let result = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
        if result != 0 {
            log::warn!(
                "Failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }
}

#[cfg(not(unix))]
mod platform {
    pub fn disable_core_dumps() -> bool {
        log::warn!("Core dump prevention is not supported on this platform");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_core_dumps_is_idempotent() {
        let first = disable_core_dumps();
        let second = disable_core_dumps();
        // Sandboxes may refuse; repeated calls must agree either way.
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_core_limit_is_zero() {
        if !disable_core_dumps() {
            return;
        }
        let mut rlim = libc::rlimit {
            rlim_cur: 1,
            rlim_max: 1,
        };
        let result = unsafe { libc::getrlimit(libc::RLIMIT_CORE, &mut rlim) };
        assert_eq!(result, 0);
        assert_eq!(rlim.rlim_cur, 0);
    }
}
