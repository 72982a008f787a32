//! The one place that knows how the C++ runtime lays out its exception
//! control block.
//!
//! While a `catch` block runs, `caughtExceptions` points at the start of a
//! `__cxa_exception`, and the runtime's unwind header is that block's last
//! field. This holds for foreign exceptions too: the runtime never allocated
//! a control block for them, but `__cxa_begin_catch` computes the pointer it
//! stores by stepping back from the unwind header by the same fixed amount
//! it would use for its own exceptions. Stepping forward again therefore
//! lands on the header that was passed to `_Unwind_RaiseException`.
//!
//! `__cxa_exception` is not part of any public interface. Its size differs
//! between libstdc++ and libc++abi and may change between releases, which is
//! why it is configured at build time (see `build.rs`) and verified against
//! the running process by [`verify`].

use crate::error::LayoutError;
use crate::uw;
use std::mem;

include!(concat!(env!("OUT_DIR"), "/cxa_layout.rs"));

const UNWIND_HEADER_SIZE: usize = mem::size_of::<uw::_Unwind_Exception>();

const _: () = assert!(
    CXA_EXCEPTION_SIZE >= UNWIND_HEADER_SIZE,
    "__cxa_exception must be large enough to end with an unwind header"
);
const _: () = assert!(
    CXA_EXCEPTION_SIZE % mem::align_of::<uw::_Unwind_Exception>() == 0,
    "__cxa_exception must keep its unwind header aligned"
);

/// The C++ runtime the layout constant was chosen for.
#[cfg(cxx_runtime = "libstdcxx")]
pub const CXX_RUNTIME: &str = "libstdc++";
/// The C++ runtime the layout constant was chosen for.
#[cfg(cxx_runtime = "libcxxabi")]
pub const CXX_RUNTIME: &str = "libc++abi";

unsafe extern "C" {
    #[link_name = "custom_eh_measure_cxa_exception"]
    fn __measure_cxa_exception() -> libc::size_t;
}

/// Maps a `caughtExceptions` pointer to the unwind header it was derived
/// from.
///
/// The result is only meaningful while the exception is being handled and
/// has to be checked (see [`crate::probe`]) before anything beyond the
/// header is read through it.
///
/// # Safety
///
/// `caught` must be the current value of `caughtExceptions` inside an active
/// catch block.
pub(crate) unsafe fn unwind_header_of(
    caught: *mut libc::c_void,
) -> *mut uw::_Unwind_Exception {
    // SAFETY: the runtime derived `caught` by subtracting exactly this amount
    // from a valid unwind header.
    unsafe {
        caught
            .cast::<u8>()
            .add(CXA_EXCEPTION_SIZE - UNWIND_HEADER_SIZE)
            .cast::<uw::_Unwind_Exception>()
    }
}

/// Asks the linked C++ runtime how large its `__cxa_exception` is.
///
/// This throws and catches one native C++ exception, so the runtime's own
/// allocator runs once.
pub fn measured_cxa_exception_size() -> usize {
    // SAFETY: the shim catches everything it throws.
    unsafe { __measure_cxa_exception() }
}

/// Checks [`CXA_EXCEPTION_SIZE`] against the running process.
pub fn verify() -> Result<(), LayoutError> {
    let measured = measured_cxa_exception_size();
    if measured == CXA_EXCEPTION_SIZE {
        tracing::debug!(
            size = CXA_EXCEPTION_SIZE,
            runtime = CXX_RUNTIME,
            "__cxa_exception layout verified"
        );
        Ok(())
    } else {
        tracing::error!(
            configured = CXA_EXCEPTION_SIZE,
            measured,
            runtime = CXX_RUNTIME,
            "__cxa_exception layout mismatch"
        );
        Err(LayoutError {
            configured: CXA_EXCEPTION_SIZE,
            measured,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_size_matches_the_linked_runtime() {
        assert_eq!(measured_cxa_exception_size(), CXA_EXCEPTION_SIZE);
        verify().unwrap();
    }

    #[test]
    fn header_is_the_tail_of_the_control_block() {
        let mut block = [0u8; CXA_EXCEPTION_SIZE + 16];
        let start = block.as_mut_ptr().wrapping_add(block.as_ptr().align_offset(16));
        let header = unsafe { unwind_header_of(start.cast()) };
        assert_eq!(
            header as usize + mem::size_of::<uw::_Unwind_Exception>(),
            start as usize + CXA_EXCEPTION_SIZE
        );
    }
}
