//! Access to the C++ runtime's per-thread exception globals.
//!
//! The runtime owns a `__cxa_eh_globals` block per thread whose first field,
//! `caughtExceptions`, points at the control block of the exception that
//! the innermost active `catch` is handling. custom-eh never writes to it;
//! it only needs the block to exist before it throws, and reads
//! `caughtExceptions` while probing.
//!
//! The runtime is free to hand back an already-allocated block from the fast
//! accessor even when nothing asked for it (libstdc++ keeps it in static TLS),
//! so a separate flag records whether *this* thread went through
//! [`init_thread`]. The precondition checks test that flag.

use crate::error::InitError;
use crate::layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::OnceLock;

/// The leading part of the runtime's `__cxa_eh_globals`.
#[repr(C)]
pub(crate) struct CxaEhGlobals {
    pub(crate) caught_exceptions: *mut libc::c_void,
}

unsafe extern "C" {
    // Lazily allocates the globals for the calling thread.
    fn __cxa_get_globals() -> *mut CxaEhGlobals;
    // Returns the globals without allocating them.
    fn __cxa_get_globals_fast() -> *mut CxaEhGlobals;
}

/// Whether the calling thread may throw and probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// [`init_thread`] has not succeeded on this thread yet.
    Uninitialized,
    /// The C++ runtime has allocated this thread's exception globals.
    Initialized,
}

thread_local! {
    static STATE: Cell<ThreadState> = const { Cell::new(ThreadState::Uninitialized) };
}

/// Prepares the calling thread for throwing and catching custom-eh
/// exceptions.
///
/// C++ code normally gets its exception globals allocated by `__cxa_throw`
/// on first use. custom-eh bypasses `__cxa_throw`, so every thread must call
/// this once before its first [`throw`](crate::throw()) or
/// [`probe`](crate::probe). Calling it again is cheap.
///
/// The first call in the process also checks that the configured
/// `__cxa_exception` layout matches the linked runtime; a mismatch is
/// reported on every thread that tries to initialize.
pub fn init_thread() -> Result<(), InitError> {
    if thread_state() == ThreadState::Initialized {
        return Ok(());
    }

    static LAYOUT: OnceLock<Result<(), crate::LayoutError>> = OnceLock::new();
    (*LAYOUT.get_or_init(layout::verify))?;

    // SAFETY: `__cxa_get_globals` has no preconditions.
    let globals = unsafe { __cxa_get_globals() };
    if globals.is_null() {
        return Err(InitError::GlobalsUnavailable);
    }
    STATE.with(|state| state.set(ThreadState::Initialized));
    tracing::debug!(?globals, "initialized exception globals for this thread");
    Ok(())
}

/// Reports whether [`init_thread`] succeeded on the calling thread.
pub fn thread_state() -> ThreadState {
    STATE.with(Cell::get)
}

/// Returns the calling thread's exception globals without allocating them.
///
/// Panics when the thread was never initialized: that is a programming error
/// on the caller's side, not a condition anyone could recover from.
pub(crate) fn current(what: &str) -> NonNull<CxaEhGlobals> {
    assert!(
        thread_state() == ThreadState::Initialized,
        "{what}: call custom_eh::init_thread() on this thread first"
    );
    // SAFETY: `__cxa_get_globals_fast` has no preconditions.
    let globals = unsafe { __cxa_get_globals_fast() };
    NonNull::new(globals).unwrap_or_else(|| {
        panic!("{what}: the C++ runtime has no exception globals for this thread")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_start_uninitialized() {
        std::thread::spawn(|| {
            assert_eq!(thread_state(), ThreadState::Uninitialized);
            init_thread().unwrap();
            assert_eq!(thread_state(), ThreadState::Initialized);
            init_thread().unwrap();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn nothing_is_caught_outside_a_handler() {
        init_thread().unwrap();
        let globals = current("test");
        assert!(unsafe { globals.as_ref() }.caught_exceptions.is_null());
    }

    #[test]
    fn uninitialized_threads_are_rejected() {
        let result = std::thread::spawn(|| {
            current("test");
        })
        .join();
        let message = result.unwrap_err().downcast::<String>().unwrap();
        assert!(message.contains("call custom_eh::init_thread() on this thread first"));
    }
}
