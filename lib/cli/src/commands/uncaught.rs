use super::TestException;
use anyhow::{Context, Result, bail};
use clap::Parser;
use custom_eh::{init_thread, throw};
use std::{io, mem, ptr};

#[derive(Debug, Parser)]
/// The options for the `custom-eh uncaught` subcommand
pub struct Uncaught {}

impl Uncaught {
    /// Runs logic for the `uncaught` subcommand
    ///
    /// The exception is thrown on a bare pthread, which has no Rust or C++
    /// frames that could catch it, so the unwinder reaches the end of the
    /// stack and the process aborts.
    pub fn execute(&self) -> Result<()> {
        // SAFETY: both types are C function pointers with the same signature.
        // The start routine may unwind, and nothing above it on the new
        // thread has a landing pad.
        let start = unsafe {
            mem::transmute::<
                extern "C-unwind" fn(*mut libc::c_void) -> *mut libc::c_void,
                extern "C" fn(*mut libc::c_void) -> *mut libc::c_void,
            >(throw_without_handler)
        };

        let mut thread: libc::pthread_t = unsafe { mem::zeroed() };
        let rc = unsafe { libc::pthread_create(&mut thread, ptr::null(), start, ptr::null_mut()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc)).context("failed to spawn a thread");
        }

        let rc = unsafe { libc::pthread_join(thread, ptr::null_mut()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc)).context("failed to join the thread");
        }
        bail!("the throwing thread exited without aborting the process")
    }
}

extern "C-unwind" fn throw_without_handler(_: *mut libc::c_void) -> *mut libc::c_void {
    if let Err(err) = init_thread() {
        eprintln!("failed to set up exception handling: {err}");
        return ptr::null_mut();
    }
    tracing::info!("throwing with no catch site on the stack");
    throw(TestException {
        what: "nobody catches me".to_string(),
    })
}
