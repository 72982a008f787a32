//! Bindings to the system unwinder's base ABI (`_Unwind_*`).
//!
//! Only the entry point needed to raise an exception is declared. It
//! resolves against the unwinder the Rust standard library already links
//! (libgcc_s or LLVM libunwind), so Rust panics, C++ exceptions and
//! custom-eh exceptions all travel through the same engine.

#![allow(dead_code, non_camel_case_types, non_upper_case_globals)]

use std::fmt;

pub type _Unwind_Exception_Class = u64;
pub type _Unwind_Word = usize;
pub type _Unwind_Reason_Code = libc::c_int;

pub const _URC_NO_REASON: _Unwind_Reason_Code = 0;
pub const _URC_FOREIGN_EXCEPTION_CAUGHT: _Unwind_Reason_Code = 1;
pub const _URC_FATAL_PHASE2_ERROR: _Unwind_Reason_Code = 2;
pub const _URC_FATAL_PHASE1_ERROR: _Unwind_Reason_Code = 3;
pub const _URC_NORMAL_STOP: _Unwind_Reason_Code = 4;
pub const _URC_END_OF_STACK: _Unwind_Reason_Code = 5;
pub const _URC_HANDLER_FOUND: _Unwind_Reason_Code = 6;
pub const _URC_INSTALL_CONTEXT: _Unwind_Reason_Code = 7;
pub const _URC_CONTINUE_UNWIND: _Unwind_Reason_Code = 8;

pub type _Unwind_Exception_Cleanup_Fn =
    unsafe extern "C" fn(reason: _Unwind_Reason_Code, exception: *mut _Unwind_Exception);

/// Words reserved for the unwinder inside every exception header.
pub const unwinder_private_data_size: usize = 2;

/// The header every Itanium exception object starts with.
///
/// The C declaration carries `__attribute__((__aligned__))`, i.e. the
/// largest fundamental alignment of the target, which is 16 bytes on all
/// supported 64-bit targets.
#[repr(C, align(16))]
pub struct _Unwind_Exception {
    pub exception_class: _Unwind_Exception_Class,
    pub exception_cleanup: Option<_Unwind_Exception_Cleanup_Fn>,
    pub private: [_Unwind_Word; unwinder_private_data_size],
}

impl _Unwind_Exception {
    /// A header with every field zeroed apart from the class and the cleanup
    /// callback. The private words belong to the unwinder.
    pub const fn new(
        exception_class: _Unwind_Exception_Class,
        exception_cleanup: _Unwind_Exception_Cleanup_Fn,
    ) -> Self {
        Self {
            exception_class,
            exception_cleanup: Some(exception_cleanup),
            private: [0; unwinder_private_data_size],
        }
    }
}

unsafe extern "C-unwind" {
    pub fn _Unwind_RaiseException(exception: *mut _Unwind_Exception) -> _Unwind_Reason_Code;
}

/// A decoded `_Unwind_Reason_Code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    /// `_URC_NO_REASON`
    NoReason,
    /// `_URC_FOREIGN_EXCEPTION_CAUGHT`: another runtime caught the exception.
    ForeignExceptionCaught,
    /// `_URC_FATAL_PHASE2_ERROR`
    FatalPhase2Error,
    /// `_URC_FATAL_PHASE1_ERROR`
    FatalPhase1Error,
    /// `_URC_NORMAL_STOP`
    NormalStop,
    /// `_URC_END_OF_STACK`: the search phase found no handler.
    EndOfStack,
    /// `_URC_HANDLER_FOUND`
    HandlerFound,
    /// `_URC_INSTALL_CONTEXT`
    InstallContext,
    /// `_URC_CONTINUE_UNWIND`
    ContinueUnwind,
    /// Anything the base ABI does not define.
    Unknown(_Unwind_Reason_Code),
}

impl ReasonCode {
    /// Decodes a raw reason code.
    pub fn from_raw(raw: _Unwind_Reason_Code) -> Self {
        match raw {
            _URC_NO_REASON => Self::NoReason,
            _URC_FOREIGN_EXCEPTION_CAUGHT => Self::ForeignExceptionCaught,
            _URC_FATAL_PHASE2_ERROR => Self::FatalPhase2Error,
            _URC_FATAL_PHASE1_ERROR => Self::FatalPhase1Error,
            _URC_NORMAL_STOP => Self::NormalStop,
            _URC_END_OF_STACK => Self::EndOfStack,
            _URC_HANDLER_FOUND => Self::HandlerFound,
            _URC_INSTALL_CONTEXT => Self::InstallContext,
            _URC_CONTINUE_UNWIND => Self::ContinueUnwind,
            other => Self::Unknown(other),
        }
    }

    /// The raw value handed to or received from the unwinder.
    pub fn raw(self) -> _Unwind_Reason_Code {
        match self {
            Self::NoReason => _URC_NO_REASON,
            Self::ForeignExceptionCaught => _URC_FOREIGN_EXCEPTION_CAUGHT,
            Self::FatalPhase2Error => _URC_FATAL_PHASE2_ERROR,
            Self::FatalPhase1Error => _URC_FATAL_PHASE1_ERROR,
            Self::NormalStop => _URC_NORMAL_STOP,
            Self::EndOfStack => _URC_END_OF_STACK,
            Self::HandlerFound => _URC_HANDLER_FOUND,
            Self::InstallContext => _URC_INSTALL_CONTEXT,
            Self::ContinueUnwind => _URC_CONTINUE_UNWIND,
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoReason => "_URC_NO_REASON",
            Self::ForeignExceptionCaught => "_URC_FOREIGN_EXCEPTION_CAUGHT",
            Self::FatalPhase2Error => "_URC_FATAL_PHASE2_ERROR",
            Self::FatalPhase1Error => "_URC_FATAL_PHASE1_ERROR",
            Self::NormalStop => "_URC_NORMAL_STOP",
            Self::EndOfStack => "_URC_END_OF_STACK",
            Self::HandlerFound => "_URC_HANDLER_FOUND",
            Self::InstallContext => "_URC_INSTALL_CONTEXT",
            Self::ContinueUnwind => "_URC_CONTINUE_UNWIND",
            Self::Unknown(raw) => return write!(f, "unknown reason code {raw}"),
        };
        write!(f, "{name} ({})", self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn header_matches_the_c_declaration() {
        assert_eq!(size_of::<_Unwind_Exception>(), 32);
        assert_eq!(align_of::<_Unwind_Exception>(), 16);
    }

    #[test]
    fn reason_codes_decode_and_encode() {
        for raw in 0..=9 {
            assert_eq!(ReasonCode::from_raw(raw).raw(), raw);
        }
        assert_eq!(ReasonCode::from_raw(5), ReasonCode::EndOfStack);
        assert_eq!(ReasonCode::from_raw(42), ReasonCode::Unknown(42));
        assert_eq!(ReasonCode::EndOfStack.to_string(), "_URC_END_OF_STACK (5)");
    }
}
