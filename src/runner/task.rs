//! Task units
//!
//! A task receives its 0-based position in the batch and returns nothing.
//! Anything a task wants to report goes through its own channels (logs,
//! shared state captured by the closure).

use std::time::Duration;

/// One unit of work in a batch
pub type Task = Box<dyn FnOnce(usize) + Send + 'static>;

/// Box a closure as a [`Task`]
pub fn task<F>(f: F) -> Task
where
    F: FnOnce(usize) + Send + 'static,
{
    Box::new(f)
}

/// A task that sleeps `index * unit`, so later tasks run longer
pub fn sleep_task(unit: Duration) -> Task {
    task(move |index| {
        tracing::info!("Running task #{}", index);
        std::thread::sleep(unit * index as u32);
    })
}
