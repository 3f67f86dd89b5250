//! Command Execution Core
//!
//! The two pieces with real invariants live here:
//!
//! - `validator.rs`: the denylist engine that rejects destructive
//!   invocations before anything is spawned
//! - `supervisor.rs`: subprocess execution with output capture, timeout
//!   enforcement, and guaranteed reaping
//!
//! Everything else in the crate is glue between an authenticated HTTP
//! caller and these two functions.

mod supervisor;
mod validator;

pub use supervisor::{
    execute, execute_task, ExecutionResult, DEFAULT_COMMAND_TIMEOUT, DEFAULT_TASK_TIMEOUT,
    EXIT_ABNORMAL, EXIT_EXEC_FAILED, EXIT_KILLED, MAX_COMMAND_LEN,
};
pub use validator::{validate, Verdict};
