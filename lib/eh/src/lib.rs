//! Exceptions whose memory is owned by the caller.
//!
//! custom-eh raises Rust values as foreign exceptions through the platform's
//! Itanium unwinder and catches them in C++ catch-all frames, without going
//! through the C++ runtime's exception allocator or Rust's panic machinery.
//! Each exception costs one allocation from an [`ExceptionAllocator`] of the
//! caller's choice, released by a cleanup callback once the exception has
//! been handled.
//!
//! ```no_run
//! use custom_eh::{catch, init_thread, throw};
//!
//! struct Oops(&'static str);
//!
//! init_thread().expect("unsupported C++ runtime");
//! let result = catch::<Oops, (), _>(|| throw(Oops("You caught me!")), |oops| oops.0);
//! assert_eq!(result, Err("You caught me!"));
//! ```
//!
//! # Threads
//!
//! Every thread has to call [`init_thread`] before it throws or catches.
//! Exceptions never cross threads.
//!
//! # Layout
//!
//! Recognizing a caught exception depends on the private layout of the
//! linked C++ runtime; see [`layout`] for how it is configured and checked.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]
#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::mut_mut,
        clippy::nonminimal_bool,
        clippy::map_unwrap_or,
        clippy::print_stdout,
        clippy::use_self
    )
)]

cfg_if::cfg_if! {
    if #[cfg(any(target_env = "msvc", target_family = "wasm"))] {
        compile_error!("custom-eh needs the Itanium C++ ABI; MSVC and wasm targets use other exception models");
    } else if #[cfg(all(target_arch = "arm", not(target_vendor = "apple")))] {
        compile_error!("custom-eh does not support the ARM EHABI unwinder");
    } else if #[cfg(not(target_pointer_width = "64"))] {
        compile_error!("custom-eh only knows the unwind header layout of 64-bit targets");
    }
}

mod alloc;
mod catch;
mod cleanup;
mod error;
mod globals;
pub mod layout;
mod record;
mod throw;
mod uw;

pub use crate::alloc::{AllocStats, CountingAllocator, ExceptionAllocator, SYSTEM, SystemAllocator};
pub use crate::catch::{CatchScope, Caught, Disposition, ProbeResult, catch, catch_all, probe};
pub use crate::error::{InitError, LayoutError, RaiseError};
pub use crate::globals::{ThreadState, init_thread, thread_state};
pub use crate::record::{EXCEPTION_CLASS, ExceptionRecord, TypeDescriptor};
pub use crate::throw::{throw, throw_in};
pub use crate::uw::ReasonCode;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
