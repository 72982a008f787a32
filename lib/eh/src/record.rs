//! The in-memory shape of a custom-eh exception.
//!
//! ```text
//! Wrapped<T>
//! +--------------------------------------------+
//! | ExceptionRecord                            |
//! |   header: _Unwind_Exception  <- raise ptr  |
//! |   canary                                   |
//! |   descriptor: TypeDescriptor               |
//! |   allocator                                |
//! +--------------------------------------------+
//! | payload: T                                 |
//! +--------------------------------------------+
//! ```
//!
//! The header, the record and the wrapper share one address, so the pointer
//! the unwinder hands back is also a pointer to the whole allocation.

use crate::alloc::ExceptionAllocator;
use crate::uw;
use std::any::{self, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

/// Exception class of every exception raised by this crate.
///
/// Read by the catch probe to tell custom-eh exceptions apart from C++
/// (`GNUCC++\0`, `CLNGC++\0`), Rust (`MOZ\0RUST`) and any other runtime's.
pub const EXCEPTION_CLASS: uw::_Unwind_Exception_Class = u64::from_be_bytes(*b"CSTMEHRS");

// Two copies of this crate in one process share the class above. The address
// of this static tells them apart.
static CANARY: u8 = 0;

pub(crate) fn canary() -> *const u8 {
    &CANARY
}

/// Identifies the type of an exception payload.
///
/// Equality is decided by [`TypeId`] alone; the name is only carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// The descriptor of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    /// Whether this descriptor names `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// The [`TypeId`] of the payload type.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The payload type's name, as reported by [`std::any::type_name`].
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptor").field(&self.name).finish()
    }
}

/// The fixed part of every custom-eh exception.
///
/// Records are only ever observed through pointers obtained from the catch
/// probe; they are created by [`throw`](crate::throw()) and destroyed by the
/// unwinder's cleanup callback.
#[repr(C)]
pub struct ExceptionRecord {
    pub(crate) header: uw::_Unwind_Exception,
    pub(crate) canary: *const u8,
    pub(crate) descriptor: TypeDescriptor,
    pub(crate) allocator: &'static dyn ExceptionAllocator,
}

impl ExceptionRecord {
    /// The exception class stored in the unwind header.
    pub fn exception_class(&self) -> u64 {
        self.header.exception_class
    }

    /// The type of the payload that follows this record.
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }
}

impl fmt::Debug for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionRecord")
            .field("exception_class", &format_args!("{:#018x}", self.exception_class()))
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A record followed by the payload it describes.
#[repr(C)]
pub(crate) struct Wrapped<T> {
    pub(crate) record: ExceptionRecord,
    pub(crate) payload: T,
}

impl<T: 'static> Wrapped<T> {
    pub(crate) fn new(
        payload: T,
        allocator: &'static dyn ExceptionAllocator,
        cleanup: uw::_Unwind_Exception_Cleanup_Fn,
    ) -> Self {
        Self {
            record: ExceptionRecord {
                header: uw::_Unwind_Exception::new(EXCEPTION_CLASS, cleanup),
                canary: canary(),
                descriptor: TypeDescriptor::of::<T>(),
                allocator,
            },
            payload,
        }
    }
}

const _: () = assert!(mem::offset_of!(ExceptionRecord, header) == 0);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[allow(dead_code)]
    struct Big([u64; 9]);

    #[test]
    fn record_is_the_first_field_of_the_wrapper() {
        assert_eq!(mem::offset_of!(Wrapped<u8>, record), 0);
        assert_eq!(mem::offset_of!(Wrapped<Big>, record), 0);
        assert_eq!(mem::offset_of!(Wrapped<String>, record), 0);
        assert_eq!(
            mem::offset_of!(Wrapped<u8>, payload),
            mem::size_of::<ExceptionRecord>()
        );
    }

    #[test]
    fn class_tag_spells_the_vendor_and_language() {
        assert_eq!(EXCEPTION_CLASS.to_be_bytes(), *b"CSTMEHRS");
        assert_ne!(EXCEPTION_CLASS, u64::from_be_bytes(*b"GNUCC++\0"));
        assert_ne!(EXCEPTION_CLASS, u64::from_be_bytes(*b"MOZ\0RUST"));
    }

    #[test]
    fn descriptors_compare_by_type() {
        struct Local;

        let a = TypeDescriptor::of::<Local>();
        assert_eq!(a, TypeDescriptor::of::<Local>());
        assert_ne!(a, TypeDescriptor::of::<u32>());
        assert!(a.is::<Local>());
        assert!(!a.is::<&'static str>());
        assert!(a.name().ends_with("Local"));

        let set: HashSet<_> = [a, TypeDescriptor::of::<Local>(), TypeDescriptor::of::<u32>()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }
}
