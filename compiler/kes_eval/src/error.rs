//! Execution errors.

use thiserror::Error;

/// Why a program stopped without returning from its entry point.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecError {
    #[error("module has {0} codegen error(s) and cannot be executed")]
    MalformedModule(u32),

    #[error("no function named '{0}'")]
    NoSuchFunction(String),

    #[error("uncaught exception of type '{type_name}'")]
    UncaughtException { type_name: String },

    #[error("program aborted")]
    Aborted,

    #[error("reached unreachable code in '{function}'")]
    Unreachable { function: String },

    #[error("invalid memory access at address {addr:#x} ({len} bytes)")]
    BadAccess { addr: u64, len: u64 },

    #[error("out of memory: {requested} bytes requested, limit {limit}")]
    OutOfMemory { requested: u64, limit: u64 },

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("call depth limit of {0} exceeded")]
    CallDepth(usize),

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("call to unknown external function '{0}'")]
    UnknownExtern(String),

    #[error("bad printf format: {0}")]
    BadFormat(String),

    #[error("malformed IR: {0}")]
    MalformedIr(String),
}
