use super::{TestException, print_stats};
use anyhow::{Context, Result, bail};
use clap::Parser;
use custom_eh::{CountingAllocator, Disposition, catch, catch_all, init_thread, throw_in};
use std::io;

static ALLOCATOR: CountingAllocator = CountingAllocator::system();

#[derive(Debug, Parser)]
/// The options for the `custom-eh rethrow` subcommand
pub struct Rethrow {}

impl Rethrow {
    /// Runs logic for the `rethrow` subcommand
    pub fn execute(&self) -> Result<()> {
        init_thread().context("failed to set up exception handling for this thread")?;

        // The inner site only handles I/O errors.
        let result = catch::<TestException, _, _>(
            || {
                catch_all(fail, |scope| match scope.probe() {
                    Some(caught) if caught.is::<io::Error>() => Disposition::Handle(()),
                    Some(caught) => {
                        println!("inner catch site: rethrowing {}", caught.descriptor().name());
                        Disposition::Rethrow
                    }
                    None => Disposition::Rethrow,
                })
            },
            |e| e.what.clone(),
        );
        match result {
            Ok(_) => bail!("the exception did not reach the outer catch site"),
            Err(what) => println!("outer catch site: Success: {what:?}"),
        }

        print_stats(ALLOCATOR.stats());
        Ok(())
    }
}

fn fail() {
    let exception = TestException {
        what: "caught after a rethrow".to_string(),
    };
    throw_in(exception, &ALLOCATOR)
}
