//! Kestrel IR interpreter.
//!
//! Executes an [`kes_emit::IrModule`] against a small built-in C runtime
//! (`calloc`, `free`, `printf`, `pow`, `abort` and the Itanium exception
//! entry points), so lowered programs can be run and their output checked
//! without a native backend.

mod config;
mod error;
mod machine;
mod memory;
pub mod printf;
mod value;

pub use config::MachineConfig;
pub use error::ExecError;
pub use machine::{Machine, Outcome};
pub use value::Val;

/// Run `entry` in `module` with default limits.
pub fn run(module: &kes_emit::IrModule, entry: &str) -> Result<Outcome, ExecError> {
    Machine::new(module, MachineConfig::default())?.run(entry)
}
