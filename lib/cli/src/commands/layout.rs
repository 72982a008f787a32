use anyhow::{Context, Result};
use clap::Parser;
use custom_eh::layout;

#[derive(Debug, Parser)]
/// The options for the `custom-eh layout` subcommand
pub struct Layout {}

impl Layout {
    /// Runs logic for the `layout` subcommand
    pub fn execute(&self) -> Result<()> {
        println!("C++ runtime: {}", layout::CXX_RUNTIME);
        println!("configured __cxa_exception size: {:#x}", layout::CXA_EXCEPTION_SIZE);
        println!(
            "measured __cxa_exception size: {:#x}",
            layout::measured_cxa_exception_size()
        );
        layout::verify().context("custom-eh cannot recognize its own exceptions")?;
        println!("layout ok");
        Ok(())
    }
}
