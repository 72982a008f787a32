//! The callback the unwinder runs when it is done with an exception.

use crate::record::Wrapped;
use crate::uw::{self, ReasonCode};
use std::alloc::Layout;
use std::ptr::{self, NonNull};

/// Destroys a `Wrapped<T>` once the exception is no longer propagating.
///
/// Installed into the header by [`throw_in`](crate::throw_in) and invoked by
/// whoever ends the exception's life, exactly once:
///
/// - the C++ runtime's `__cxa_end_catch`, when a catch-all block finishes
///   without rethrowing (`_URC_FOREIGN_EXCEPTION_CAUGHT`);
/// - any other runtime that deletes the exception through
///   `_Unwind_DeleteException`, with whatever reason it chooses.
///
/// The reason only changes what is logged. The payload is dropped in place
/// and the allocation goes back to the allocator recorded at throw time.
///
/// # Safety
///
/// `exception` must be the header of a live `Wrapped<T>` created by
/// `throw_in::<T>`, and no one may touch it afterwards.
pub(crate) unsafe extern "C" fn cleanup<T: 'static>(
    reason: uw::_Unwind_Reason_Code,
    exception: *mut uw::_Unwind_Exception,
) {
    match ReasonCode::from_raw(reason) {
        ReasonCode::ForeignExceptionCaught => {
            tracing::trace!(?exception, "deleting handled exception");
        }
        reason => {
            tracing::trace!(?exception, %reason, "deleting abandoned exception");
        }
    }

    let wrapped = exception.cast::<Wrapped<T>>();
    // SAFETY: the header is the first field of the record, which is the
    // first field of the wrapper, so `wrapped` is the pointer `throw_in` got
    // from the allocator.
    unsafe {
        let allocator = (*wrapped).record.allocator;
        ptr::drop_in_place(wrapped);
        allocator.deallocate(
            NonNull::new_unchecked(wrapped.cast()),
            Layout::new::<Wrapped<T>>(),
        );
    }
}
