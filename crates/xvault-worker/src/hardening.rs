//! Production hardening: memory pinning and core dump prevention.
//!
//! A Worker decrypts source credentials (and holds the decrypted bytes of
//! whatever it is backing up) in process memory for the duration of a job.
//! Both measures are no-ops on non-Unix platforms.

/// Disable core dumps by setting `RLIMIT_CORE` to 0.
///
/// # Errors
///
/// Returns an error string if the `setrlimit` syscall fails.
#[cfg(unix)]
pub fn disable_core_dumps() -> Result<(), String> {
    // SAFETY: sets a resource limit for the current process via a valid
    // `rlimit` struct; no memory safety implications.
    #[allow(unsafe_code)]
    let result = unsafe {
        let rlim = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
        libc::setrlimit(libc::RLIMIT_CORE, &rlim)
    };

    if result == 0 {
        Ok(())
    } else {
        Err(format!("setrlimit(RLIMIT_CORE, 0) failed with errno {}", std::io::Error::last_os_error()))
    }
}

#[cfg(not(unix))]
pub fn disable_core_dumps() -> Result<(), String> {
    Ok(())
}

/// Pin all current and future memory pages with `mlockall`. Requires
/// `CAP_IPC_LOCK` or root; set `WORKER_DISABLE_MLOCK=true` in development.
///
/// # Errors
///
/// Returns an error string if the `mlockall` syscall fails.
#[cfg(unix)]
pub fn lock_memory() -> Result<(), String> {
    // SAFETY: locks all mapped pages into RAM via well-defined flags; no
    // memory safety implications, failure is handled gracefully.
    #[allow(unsafe_code)]
    let result = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };

    if result == 0 {
        Ok(())
    } else {
        Err(format!("mlockall(MCL_CURRENT | MCL_FUTURE) failed with errno {}", std::io::Error::last_os_error()))
    }
}

#[cfg(not(unix))]
pub fn lock_memory() -> Result<(), String> {
    Ok(())
}
