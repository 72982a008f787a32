//! Catching exceptions: catch-all frames and the probe that recognizes
//! custom-eh exceptions inside them.
//!
//! Rust has no way to open a `catch (...)` block, so [`catch_all`] calls
//! into a small C++ shim that does it on Rust's behalf. While the handler
//! runs, the C++ runtime lists the caught exception in its per-thread
//! globals; [`probe`] reads that entry back, maps it to the unwind header
//! (see [`crate::layout`]) and checks whether the header belongs to this
//! crate.

use crate::globals;
use crate::layout;
use crate::record::{self, EXCEPTION_CLASS, ExceptionRecord, TypeDescriptor, Wrapped};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

unsafe extern "C-unwind" {
    #[link_name = "custom_eh_catch_all"]
    fn __catch_all(
        body: unsafe extern "C-unwind" fn(*mut u8),
        body_payload: *mut u8,
        handler: unsafe extern "C-unwind" fn(*mut u8) -> libc::c_int,
        handler_payload: *mut u8,
    ) -> libc::c_int;
}

// Results of `custom_eh_catch_all`.
const BODY_RETURNED: libc::c_int = 0;
const HANDLED: libc::c_int = 1;

// Answers of the handler callback.
const ACCEPT: libc::c_int = 0;
const RETHROW: libc::c_int = 1;

/// A custom-eh exception found by [`probe`].
#[derive(Clone, Copy, Debug)]
pub struct ProbeResult {
    descriptor: TypeDescriptor,
    record: NonNull<ExceptionRecord>,
}

impl ProbeResult {
    /// The type of the exception's payload.
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    /// The exception's record. It stays valid until the catch block that
    /// probed it ends without rethrowing.
    pub fn record(&self) -> NonNull<ExceptionRecord> {
        self.record
    }
}

/// Identifies the exception the innermost active catch block is handling.
///
/// Returns `None` when that exception was not thrown by this crate: a C++
/// exception, a Rust panic, or another runtime's. The exception is left
/// untouched either way; the caller is expected to rethrow what it does not
/// recognize so that outer handlers still see it.
///
/// Prefer [`CatchScope::probe`], which ties the result to the catch block.
///
/// # Panics
///
/// Panics if [`init_thread`](crate::init_thread) was not called on this
/// thread, or if no exception is being handled (i.e. when called outside a
/// catch block).
pub fn probe() -> Option<ProbeResult> {
    let globals = globals::current("custom_eh::probe");
    // SAFETY: the runtime keeps a thread's globals alive as long as the
    // thread runs.
    let caught = unsafe { globals.as_ref() }.caught_exceptions;
    assert!(
        !caught.is_null(),
        "custom_eh::probe: must be called from a catch block (no exception is being handled)"
    );

    // SAFETY: `caught` is the runtime's current `caughtExceptions`.
    let header = unsafe { layout::unwind_header_of(caught) };
    // SAFETY: every Itanium exception object starts with a full header,
    // whichever runtime raised it.
    let class = unsafe { (*header).exception_class };
    if class != EXCEPTION_CLASS {
        tracing::trace!("caught a foreign exception (class {class:#018x})");
        return None;
    }

    let record = header.cast::<ExceptionRecord>();
    // SAFETY: the class says this is a custom-eh record, and every version
    // of the record keeps the canary right after the header.
    if unsafe { (*record).canary } != record::canary() {
        tracing::trace!("caught an exception from another copy of custom-eh");
        return None;
    }

    // SAFETY: the canary says this copy of the crate created the record.
    let descriptor = unsafe { (*record).descriptor };
    Some(ProbeResult {
        descriptor,
        // SAFETY: `header` was derived from a non-null pointer.
        record: unsafe { NonNull::new_unchecked(record) },
    })
}

/// What a [`catch_all`] handler decided to do with the exception.
#[derive(Debug)]
pub enum Disposition<U> {
    /// The exception is handled; `catch_all` returns `Err(U)` and the
    /// exception is deleted.
    Handle(U),
    /// The exception continues to the next enclosing catch-all block.
    Rethrow,
}

/// Proof that the code holding it runs inside a catch-all block.
pub struct CatchScope<'a> {
    // Bound to the handler's frame; must not leave the thread.
    _frame: PhantomData<&'a *const ()>,
}

impl CatchScope<'_> {
    /// Probes the exception this block is handling.
    ///
    /// See [`probe`].
    pub fn probe(&self) -> Option<Caught<'_>> {
        probe().map(|found| Caught {
            descriptor: found.descriptor,
            record: found.record,
            _scope: PhantomData,
        })
    }
}

impl fmt::Debug for CatchScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchScope").finish_non_exhaustive()
    }
}

/// A custom-eh exception, borrowed for the duration of a catch block.
#[derive(Clone, Copy)]
pub struct Caught<'a> {
    descriptor: TypeDescriptor,
    record: NonNull<ExceptionRecord>,
    _scope: PhantomData<&'a ExceptionRecord>,
}

impl<'a> Caught<'a> {
    /// The type of the payload.
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    /// Whether the payload is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.descriptor.is::<T>()
    }

    /// Borrows the payload if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        if !self.is::<T>() {
            return None;
        }
        let wrapped = self.record.as_ptr().cast::<Wrapped<T>>();
        // SAFETY: the record was created by `throw_in::<T>` of this copy of
        // the crate and lives until the catch block ends.
        Some(unsafe { &(*wrapped).payload })
    }

    /// The exception's record.
    pub fn record(&self) -> &'a ExceptionRecord {
        // SAFETY: see `downcast_ref`.
        unsafe { self.record.as_ref() }
    }

    /// The address of the exception's record, which is also the address the
    /// exception was raised with. Rethrowing keeps it unchanged.
    pub fn record_ptr(&self) -> *const ExceptionRecord {
        self.record.as_ptr()
    }
}

impl fmt::Debug for Caught<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caught")
            .field("descriptor", &self.descriptor)
            .field("record", &self.record)
            .finish()
    }
}

/// Runs `body` inside a C++ `try { ... } catch (...) { ... }` block.
///
/// If `body` returns, its value comes back as `Ok`. If it unwinds, `handler`
/// runs inside the catch block, where [`CatchScope::probe`] identifies the
/// exception:
///
/// - [`Disposition::Handle`] ends the catch block. The C++ runtime then
///   releases the exception, which for a custom-eh exception runs its
///   cleanup callback, and `catch_all` returns `Err` with the handler's
///   value.
/// - [`Disposition::Rethrow`] lets the same exception object continue to
///   the frames above.
///
/// Everything unwinds through here, Rust panics included. Handlers must
/// rethrow what they do not recognize: a Rust panic that is handled here
/// aborts the process when the runtime deletes it, and rethrowing past the
/// outermost catch-all block ends the process as well.
///
/// Throwing from inside `handler` is not supported; the C++ runtime cannot
/// hold two foreign exceptions at once and terminates.
pub fn catch_all<F, R, H, U>(body: F, handler: H) -> Result<R, U>
where
    F: FnOnce() -> R,
    H: FnOnce(&CatchScope<'_>) -> Disposition<U>,
{
    let mut body = Body {
        f: Some(body),
        r: None,
    };
    let mut handler = Handler {
        h: Some(handler),
        u: None,
    };

    // SAFETY: both payloads outlive the call and match the callbacks' types.
    let ret = unsafe {
        __catch_all(
            call_body::<F, R>,
            (&mut body as *mut Body<F, R>).cast(),
            call_handler::<H, U>,
            (&mut handler as *mut Handler<H, U>).cast(),
        )
    };

    return match (ret, body.r, handler.u) {
        (BODY_RETURNED, Some(r), _) => Ok(r),
        (HANDLED, _, Some(u)) => Err(u),
        (ret, _, _) => unreachable!("custom_eh_catch_all returned {ret} without a value"),
    };

    struct Body<F, R> {
        f: Option<F>,
        r: Option<R>,
    }

    struct Handler<H, U> {
        h: Option<H>,
        u: Option<U>,
    }

    unsafe extern "C-unwind" fn call_body<F, R>(payload: *mut u8)
    where
        F: FnOnce() -> R,
    {
        let body = unsafe { &mut *payload.cast::<Body<F, R>>() };
        if let Some(f) = body.f.take() {
            body.r = Some(f());
        }
    }

    unsafe extern "C-unwind" fn call_handler<H, U>(payload: *mut u8) -> libc::c_int
    where
        H: FnOnce(&CatchScope<'_>) -> Disposition<U>,
    {
        let handler = unsafe { &mut *payload.cast::<Handler<H, U>>() };
        let Some(h) = handler.h.take() else {
            return RETHROW;
        };
        let scope = CatchScope {
            _frame: PhantomData,
        };
        match h(&scope) {
            Disposition::Handle(u) => {
                handler.u = Some(u);
                ACCEPT
            }
            Disposition::Rethrow => RETHROW,
        }
    }
}

/// Runs `body`, handling custom-eh exceptions whose payload is a `T`.
///
/// Any other exception, including custom-eh exceptions of another type,
/// C++ exceptions and Rust panics, is rethrown unchanged.
pub fn catch<T, R, U>(body: impl FnOnce() -> R, on_catch: impl FnOnce(&T) -> U) -> Result<R, U>
where
    T: 'static,
{
    catch_all(body, |scope| {
        match scope.probe().and_then(|caught| caught.downcast_ref::<T>()) {
            Some(payload) => Disposition::Handle(on_catch(payload)),
            None => Disposition::Rethrow,
        }
    })
}
