use custom_eh::{
    CountingAllocator, Disposition, catch, catch_all, init_thread, layout, probe, throw_in,
};
use pretty_assertions::assert_eq;
use std::panic::{self, AssertUnwindSafe};

#[test_log::test]
fn rust_panics_are_not_recognized() {
    init_thread().unwrap();

    let mut recognized = None;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        catch_all(
            || -> u32 { panic!("not a custom-eh exception") },
            |scope| {
                recognized = Some(scope.probe().is_some());
                Disposition::<()>::Rethrow
            },
        )
    }));

    assert_eq!(recognized, Some(false));
    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"not a custom-eh exception"));
}

#[test_log::test]
fn typed_catch_lets_panics_through() {
    init_thread().unwrap();

    let result = panic::catch_unwind(|| catch::<String, (), _>(|| panic!("boom"), |s| s.len()));

    assert!(result.is_err());
}

#[test_log::test]
#[should_panic(expected = "must be called from a catch block")]
fn probing_outside_a_catch_block_panics() {
    init_thread().unwrap();
    probe();
}

#[test_log::test]
fn throwing_on_an_uninitialized_thread_panics_before_allocating() {
    static ALLOC: CountingAllocator = CountingAllocator::system();

    let result = std::thread::spawn(|| -> u32 { throw_in(7u32, &ALLOC) }).join();

    let payload = result.unwrap_err();
    let message = payload.downcast_ref::<String>().expect("formatted panic message");
    assert!(message.contains("custom_eh::init_thread()"), "{message}");
    assert_eq!(ALLOC.stats().allocations, 0);
}

#[test_log::test]
fn linked_runtime_matches_the_configured_layout() {
    assert_eq!(layout::verify(), Ok(()));
    assert_eq!(layout::measured_cxa_exception_size(), layout::CXA_EXCEPTION_SIZE);
}
