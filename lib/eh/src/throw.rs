use crate::alloc::{ExceptionAllocator, SYSTEM};
use crate::cleanup::cleanup;
use crate::error::RaiseError;
use crate::globals;
use crate::record::Wrapped;
use crate::uw::{self, ReasonCode};
use std::alloc::{self, Layout};
use std::any;

/// Throws `payload` as a custom-eh exception, allocating it with
/// [`SYSTEM`].
///
/// See [`throw_in`].
#[inline]
pub fn throw<T: 'static>(payload: T) -> ! {
    throw_in(payload, &SYSTEM)
}

/// Throws `payload` as a custom-eh exception, allocating its record with
/// `allocator`.
///
/// Exactly one block is requested from `allocator`. It is handed back when
/// the exception is handled by a [`catch_all`](crate::catch_all) block that
/// does not rethrow. Control never returns to the caller: the nearest
/// enclosing catch-all block receives the exception.
///
/// Rust frames between the throw and the catch-all block run their drop
/// glue as usual. A [`std::panic::catch_unwind`] in between aborts the
/// process, because Rust refuses to catch exceptions it did not raise.
///
/// # Panics
///
/// Panics, before allocating anything, if [`init_thread`](crate::init_thread)
/// has not been called on this thread.
///
/// # Aborts
///
/// If the unwinder cannot deliver the exception (no handler on the stack, or
/// a fatal unwinding error), the failure is logged and the process aborts.
/// The record is not freed in that case.
pub fn throw_in<T: 'static>(payload: T, allocator: &'static dyn ExceptionAllocator) -> ! {
    // Check that the thread has initialized its exception globals.
    globals::current("custom_eh::throw");

    let layout = Layout::new::<Wrapped<T>>();
    let Some(ptr) = allocator.allocate(layout) else {
        alloc::handle_alloc_error(layout)
    };
    let wrapped = ptr.cast::<Wrapped<T>>().as_ptr();
    // SAFETY: the allocator returned a block that fits `Wrapped<T>`.
    unsafe {
        wrapped.write(Wrapped::new(payload, allocator, cleanup::<T>));
    }

    let header = wrapped.cast::<uw::_Unwind_Exception>();
    tracing::trace!(?header, payload = any::type_name::<T>(), "throwing exception");

    // SAFETY: `header` starts a fully initialized exception object whose
    // cleanup callback matches its payload type.
    let reason = unsafe { uw::_Unwind_RaiseException(header) };

    // Raising only returns when it failed.
    raise_failed(ReasonCode::from_raw(reason).into())
}

#[cold]
#[inline(never)]
fn raise_failed(err: RaiseError) -> ! {
    tracing::error!(%err, "failed to raise exception");
    eprintln!("custom-eh: failed to raise exception: {err}");
    std::process::abort()
}
