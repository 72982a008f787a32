//! The commands available in the custom-eh binary.
mod catch;
mod layout;
mod rethrow;
mod uncaught;

pub use {catch::*, layout::*, rethrow::*, uncaught::*};

use custom_eh::AllocStats;

/// The exception every command throws.
#[derive(Debug)]
pub struct TestException {
    /// What went wrong.
    pub what: String,
}

fn print_stats(stats: AllocStats) {
    println!(
        "allocations: {}, deallocations: {}, live bytes: {}",
        stats.allocations, stats.deallocations, stats.bytes_live
    );
}
