//! Command execution for batch tasks
//!
//! Runs shell commands with output capture and an optional per-command
//! timeout, and adapts them into runner tasks.

pub mod command;
pub mod group;

pub use command::{exec_command, exec_command_sync, CommandTask, ExecOptions, ExecResult};
pub use group::ChildGroups;
