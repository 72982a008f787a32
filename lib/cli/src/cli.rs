//! The logic for the custom-eh CLI tool.

use crate::commands::{Catch, Layout, Rethrow, Uncaught};
use crate::logging;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "custom-eh",
    about = "Throw and catch exceptions with caller-owned memory.",
    version,
    author
)]
/// The options for the custom-eh Command Line Interface
enum CustomEhOptions {
    /// Throw an exception and catch it again
    #[clap(name = "catch")]
    Catch(Catch),

    /// Rethrow an exception past a catch site that does not know its type
    #[clap(name = "rethrow")]
    Rethrow(Rethrow),

    /// Throw on a thread with no catch site, which aborts the process
    #[clap(name = "uncaught")]
    Uncaught(Uncaught),

    /// Show the C++ runtime layout custom-eh was built for
    #[clap(name = "layout")]
    Layout(Layout),
}

impl CustomEhOptions {
    fn execute(&self) -> Result<()> {
        match self {
            Self::Catch(options) => options.execute(),
            Self::Rethrow(options) => options.execute(),
            Self::Uncaught(options) => options.execute(),
            Self::Layout(options) => options.execute(),
        }
    }
}

/// The main function for the custom-eh CLI tool.
pub fn custom_eh_main() {
    logging::set_up_logging();

    let options = CustomEhOptions::parse();
    if let Err(err) = options.execute() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
