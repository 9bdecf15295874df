//! SIGINT/SIGTERM handling for the coordinating process.
//!
//! Samples run in their own process group, so a terminal Ctrl-C does not reach
//! them. The handlers only record the request; the runner polls it and kills
//! the in-flight child group itself.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn interrupt_requested() -> bool {
    INTERRUPT_REQUESTED.load(Ordering::Relaxed)
}

/// Install handlers for SIGINT and SIGTERM. The handler is async-signal-safe (only sets an atomic).
#[cfg(unix)]
pub fn install_handlers() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = interrupt_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn interrupt_handler(_sig: libc::c_int) {
    INTERRUPT_REQUESTED.store(true, Ordering::Relaxed);
}

/// No-op on non-Unix; the default Ctrl-C behaviour terminates the console group.
#[cfg(not(unix))]
pub fn install_handlers() {}
