//! Bounded batch runner
//!
//! - [`Runner`] - deadline / interrupt / completion race
//! - [`CancelHandle`] - capacity-1 cancellation slot producer
//! - [`InterruptSource`] - pluggable external cancellation (OS signals)
//! - [`Task`] - index-aware unit of work

pub mod batch;
pub mod cancel;
pub mod signal;
pub mod task;

pub use batch::Runner;
pub use cancel::{CancelHandle, Interrupt};
pub use signal::{InterruptSource, OsSignals, SignalName, Subscription};
pub use task::{sleep_task, task, Task};
