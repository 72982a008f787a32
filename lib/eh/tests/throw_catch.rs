use custom_eh::{
    CountingAllocator, Disposition, EXCEPTION_CLASS, TypeDescriptor, catch, catch_all, init_thread,
    probe, throw, throw_in,
};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

struct TestException {
    what: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
struct Diagnostic {
    code: u32,
    message: String,
    notes: Vec<String>,
}

impl Diagnostic {
    fn new(code: u32, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            notes: vec![format!("raised with code {code}")],
        }
    }
}

fn checked_len(input: &str) -> usize {
    if input.is_empty() {
        throw(Diagnostic::new(22, "empty input"));
    }
    input.len()
}

#[test_log::test]
fn caught_message_matches_the_thrown_one() {
    init_thread().unwrap();

    let result = catch::<TestException, (), _>(
        || throw(TestException {
            what: "You caught me!",
        }),
        |e| e.what,
    );

    assert_eq!(result, Err("You caught me!"));
}

#[test_log::test]
fn caught_payload_equals_a_directly_constructed_one() {
    init_thread().unwrap();

    let caught = catch::<Diagnostic, _, _>(|| checked_len(""), Diagnostic::clone);

    assert_eq!(caught, Err(Diagnostic::new(22, "empty input")));
}

#[test_log::test]
fn body_results_pass_through_untouched() {
    init_thread().unwrap();

    let result = catch_all(
        || checked_len("four"),
        |_| -> Disposition<()> { panic!("nothing was thrown") },
    );

    assert_eq!(result, Ok(4));
}

#[test_log::test]
fn handler_sees_the_record_until_the_catch_block_ends() {
    init_thread().unwrap();
    static ALLOC: CountingAllocator = CountingAllocator::system();

    let result = catch_all(
        || -> u32 { throw_in(Diagnostic::new(7, "late"), &ALLOC) },
        |scope| {
            // Still owned by the unwinder while we look at it.
            assert_eq!(ALLOC.stats().live(), 1);

            let found = probe().expect("custom-eh exception");
            assert_eq!(found.descriptor(), TypeDescriptor::of::<Diagnostic>());
            let record = unsafe { found.record().as_ref() };
            assert_eq!(record.exception_class(), EXCEPTION_CLASS);

            let caught = scope.probe().expect("custom-eh exception");
            assert_eq!(caught.record_ptr(), found.record().as_ptr().cast_const());
            assert!(caught.is::<Diagnostic>());
            assert!(caught.downcast_ref::<TestException>().is_none());
            assert!(caught.descriptor().name().ends_with("Diagnostic"));

            let code = caught.downcast_ref::<Diagnostic>().map(|d| d.code);
            Disposition::Handle(code)
        },
    );

    assert_eq!(result, Err(Some(7)));
    assert_eq!(ALLOC.stats().live(), 0);
}

#[test_log::test]
fn frames_between_throw_and_catch_run_their_destructors() {
    init_thread().unwrap();

    struct Guard<'a>(&'a Cell<u32>);

    impl Drop for Guard<'_> {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn nested(depth: u32, dropped: &Cell<u32>) -> usize {
        let _guard = Guard(dropped);
        if depth == 0 {
            checked_len("")
        } else {
            nested(depth - 1, dropped)
        }
    }

    let dropped = Cell::new(0);
    let result = catch::<Diagnostic, _, _>(|| nested(3, &dropped), |d| d.code);

    assert_eq!(result, Err(22));
    assert_eq!(dropped.get(), 4);
}

#[test_log::test]
fn payload_is_dropped_exactly_once() {
    init_thread().unwrap();
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Tracked(u32);

    impl Drop for Tracked {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    let result = catch::<Tracked, (), _>(|| throw(Tracked(5)), |t| t.0);

    assert_eq!(result, Err(5));
    assert_eq!(DROPS.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn threads_catch_their_own_exceptions() {
    let handles: Vec<_> = (0..4u32)
        .map(|n| {
            std::thread::spawn(move || {
                init_thread().unwrap();
                catch::<u32, (), _>(|| throw(n * 10), |v| *v)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![Err(0), Err(10), Err(20), Err(30)]);
}
