//! Process-wide fault attribution for guard-page violations
//!
//! The handler is installed once, for SIGSEGV and SIGBUS, and consults
//! the registry to report which pool's guard page was struck before
//! terminating the process. It is last-resort diagnostics, not recovery:
//! arena overflow is a fatal bug to be attributed, not repaired.
//!
//! The handler may run with arbitrary process state, including inside
//! another pool's critical section, so it restricts itself to
//! async-signal-safe work: integer arithmetic, a scan of the registry's
//! plain atomics and raw `write(2)` calls. No heap allocation, no
//! locking, no formatting machinery.

use core::ffi::{c_int, c_void};
use core::mem;
use core::ptr;

use once_cell::sync::OnceCell;

use crate::registry;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs the SIGSEGV/SIGBUS attribution handler.
///
/// Pool constructors call this automatically; calling it again is a
/// no-op. The handler is a process-wide side effect: an unrelated
/// protection fault anywhere in the process also routes through it and
/// is reported as coming from the default allocator.
pub fn install() {
    INSTALLED.get_or_init(|| {
        // SAFETY: registering a handler that performs only
        // async-signal-safe operations. sigaction itself is safe to call
        // from any thread.
        unsafe {
            let mut action: libc::sigaction = mem::zeroed();
            let handler: extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void) = on_fault;
            action.sa_sigaction = handler as usize;
            action.sa_flags = libc::SA_SIGINFO;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(libc::SIGSEGV, &action, ptr::null_mut());
            // macOS delivers protection faults as SIGBUS.
            libc::sigaction(libc::SIGBUS, &action, ptr::null_mut());
        }
        tracing::debug!("installed fault attribution handler");
    });
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Faulting address from the kernel-provided siginfo. Linux libc
        /// exposes `si_addr` as an accessor over the raw union.
        fn fault_address(info: *mut libc::siginfo_t) -> usize {
            // SAFETY: info points at the siginfo_t the kernel handed us;
            // si_addr is valid for fault signals.
            unsafe { (*info).si_addr() as usize }
        }
    } else {
        /// Faulting address from the kernel-provided siginfo.
        fn fault_address(info: *mut libc::siginfo_t) -> usize {
            // SAFETY: info points at the siginfo_t the kernel handed us;
            // si_addr is valid for fault signals.
            unsafe { (*info).si_addr as usize }
        }
    }
}

extern "C" fn on_fault(_signal: c_int, info: *mut libc::siginfo_t, _context: *mut c_void) {
    match registry::global().lookup(fault_address(info)) {
        Some(slot) => {
            let mut digits = [0u8; 20];
            write_raw(b"allocation fault in allocator #");
            write_raw(format_decimal(slot.index(), &mut digits));
            write_raw(b"\n");
        }
        None => write_raw(b"allocation fault in default allocator\n"),
    }

    // SAFETY: _exit is async-signal-safe; exit is not.
    unsafe { libc::_exit(1) }
}

/// Raw unbuffered write to the diagnostic stream; the only output
/// facility usable inside the handler.
fn write_raw(bytes: &[u8]) {
    // SAFETY: valid buffer and length; stderr stays open for the life of
    // the process. A short or failed write leaves nothing to do.
    unsafe {
        let _ = libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

/// Formats `value` in decimal into the tail of `buf` without allocating.
fn format_decimal(mut value: usize, buf: &mut [u8; 20]) -> &[u8] {
    let mut at = buf.len();
    loop {
        at -= 1;
        buf[at] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &buf[at..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_formatting_covers_slot_range() {
        let mut buf = [0u8; 20];
        assert_eq!(format_decimal(0, &mut buf), b"0");
        assert_eq!(format_decimal(7, &mut buf), b"7");
        assert_eq!(format_decimal(19, &mut buf), b"19");
        assert_eq!(format_decimal(1_000_000, &mut buf), b"1000000");
        assert_eq!(format_decimal(usize::MAX, &mut buf), b"18446744073709551615");
    }

    #[test]
    fn install_is_idempotent() {
        install();
        install();
    }
}
