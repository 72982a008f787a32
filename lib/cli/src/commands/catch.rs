use super::{TestException, print_stats};
use anyhow::{Context, Result, bail};
use clap::Parser;
use custom_eh::{CountingAllocator, catch, init_thread, throw_in};

static ALLOCATOR: CountingAllocator = CountingAllocator::system();

#[derive(Debug, Parser)]
/// The options for the `custom-eh catch` subcommand
pub struct Catch {
    /// Message carried by the exception
    #[clap(long, default_value = "You caught me!")]
    message: String,
}

impl Catch {
    /// Runs logic for the `catch` subcommand
    pub fn execute(&self) -> Result<()> {
        init_thread().context("failed to set up exception handling for this thread")?;

        let result = catch::<TestException, _, _>(|| self.fail(), |e| e.what.clone());
        match result {
            Ok(()) => bail!("`{}` was never thrown", self.message),
            Err(what) => println!("Success: {what:?}"),
        }

        print_stats(ALLOCATOR.stats());
        Ok(())
    }

    fn fail(&self) {
        let exception = TestException {
            what: self.message.clone(),
        };
        throw_in(exception, &ALLOCATOR)
    }
}
