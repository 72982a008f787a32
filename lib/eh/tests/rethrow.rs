use custom_eh::{
    CatchScope, CountingAllocator, Disposition, TypeDescriptor, catch, catch_all, init_thread,
    throw_in,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;

#[derive(Debug)]
struct IoError(String);

#[derive(Debug)]
struct ParseError;

fn read_config(allocator: &'static CountingAllocator) -> u32 {
    throw_in(IoError("disk on fire".to_string()), allocator)
}

#[test_log::test]
fn rethrow_preserves_the_exception_object() {
    init_thread().unwrap();
    static ALLOC: CountingAllocator = CountingAllocator::system();

    let mut inner = None;
    let outer = catch_all(
        || {
            catch_all(
                || read_config(&ALLOC),
                |scope| {
                    let caught = scope.probe().expect("custom-eh exception");
                    inner = Some((caught.record_ptr() as usize, caught.descriptor()));
                    // Not a type this level knows how to handle.
                    assert!(caught.downcast_ref::<ParseError>().is_none());
                    Disposition::<()>::Rethrow
                },
            )
        },
        |scope| {
            let caught = scope.probe().expect("custom-eh exception");
            let err = caught.downcast_ref::<IoError>().expect("IoError payload");
            Disposition::Handle((
                caught.record_ptr() as usize,
                caught.descriptor(),
                err.0.clone(),
            ))
        },
    );

    let (outer_record, outer_descriptor, message) = outer.unwrap_err();
    let (inner_record, inner_descriptor) = inner.expect("inner handler ran");
    assert_eq!(outer_record, inner_record);
    assert_eq!(outer_descriptor, inner_descriptor);
    assert_eq!(outer_descriptor, TypeDescriptor::of::<IoError>());
    assert_eq!(message, "disk on fire");
    let stats = ALLOC.stats();
    assert_eq!((stats.allocations, stats.deallocations), (1, 1));
    assert_eq!(stats.bytes_live, 0);
}

#[test_log::test]
fn typed_catch_passes_other_types_outwards() {
    init_thread().unwrap();
    static ALLOC: CountingAllocator = CountingAllocator::system();

    let mut inner_ran = false;
    let result = catch::<IoError, _, _>(
        || catch::<ParseError, _, _>(|| read_config(&ALLOC), |_| inner_ran = true),
        |err| err.0.len(),
    );

    assert_eq!(result, Err("disk on fire".len()));
    assert!(!inner_ran);
    assert_eq!(ALLOC.stats().live(), 0);
}

#[test_log::test]
fn rethrow_through_several_levels() {
    init_thread().unwrap();
    static ALLOC: CountingAllocator = CountingAllocator::system();

    let records = RefCell::new(Vec::new());
    let seen = |scope: &CatchScope<'_>| {
        let record = scope.probe().map(|c| c.record_ptr() as usize);
        records.borrow_mut().push(record);
        Disposition::<()>::Rethrow
    };

    let result = catch_all(
        || catch_all(|| catch_all(|| read_config(&ALLOC), seen), seen),
        |scope| Disposition::Handle(scope.probe().map(|c| c.record_ptr() as usize)),
    );

    let outermost = result.unwrap_err();
    assert!(outermost.is_some());
    assert_eq!(records.into_inner(), vec![outermost, outermost]);
    assert_eq!(ALLOC.stats().allocations, 1);
    assert_eq!(ALLOC.stats().deallocations, 1);
}
