use crate::uw::ReasonCode;
use thiserror::Error;

/// The unwinder returned from `_Unwind_RaiseException`.
///
/// Raising only returns on failure, so every value of this type describes an
/// exception that could not be delivered.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RaiseError {
    /// The search phase walked off the stack without finding a handler.
    #[error("no handler found before the end of the stack ({0})")]
    EndOfStack(ReasonCode),
    /// A personality routine failed while searching for a handler.
    #[error("fatal unwinding error during the search phase ({0})")]
    FatalPhase1(ReasonCode),
    /// A personality routine failed while running cleanups.
    #[error("fatal unwinding error during the cleanup phase ({0})")]
    FatalPhase2(ReasonCode),
    /// Any other code, which the base ABI does not allow here.
    #[error("unexpected return from the unwinder ({0})")]
    Unexpected(ReasonCode),
}

impl From<ReasonCode> for RaiseError {
    fn from(reason: ReasonCode) -> Self {
        match reason {
            ReasonCode::EndOfStack => Self::EndOfStack(reason),
            ReasonCode::FatalPhase1Error => Self::FatalPhase1(reason),
            ReasonCode::FatalPhase2Error => Self::FatalPhase2(reason),
            other => Self::Unexpected(other),
        }
    }
}

impl RaiseError {
    /// The reason code the unwinder reported.
    pub fn reason(&self) -> ReasonCode {
        match *self {
            Self::EndOfStack(reason)
            | Self::FatalPhase1(reason)
            | Self::FatalPhase2(reason)
            | Self::Unexpected(reason) => reason,
        }
    }
}

/// The configured `__cxa_exception` size does not match the linked runtime.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error(
    "the linked C++ runtime lays out __cxa_exception in {measured:#x} bytes, \
     but custom-eh was built for {configured:#x} (set CUSTOM_EH_CXA_EXCEPTION_SIZE)"
)]
pub struct LayoutError {
    /// The size custom-eh was compiled with.
    pub configured: usize,
    /// The size observed in the running process.
    pub measured: usize,
}

/// Per-thread initialization failed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InitError {
    /// `__cxa_get_globals` returned null.
    #[error("the C++ runtime could not provide exception globals for this thread")]
    GlobalsUnavailable,
    /// The catch probe would read the wrong memory in this process.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
