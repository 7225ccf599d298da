//! End-to-end tests: lower a program, run it, check its output.

pub mod diagnostics;
pub mod exceptions;
pub mod objects;
pub mod programs;
pub mod templates;

pub mod util;
