//! Bounded batch runner
//!
//! Runs an ordered list of tasks on a background thread while the caller
//! races the batch outcome against a deadline:
//! - completion returns `Ok(())`
//! - the deadline returns [`RunnerError::Timeout`] and abandons the thread
//! - a cancellation seen between two tasks returns [`RunnerError::Interrupted`]
//!
//! Cancellation is cooperative. A task in progress is never preempted; the
//! slot is checked before each task starts.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

use super::cancel::{self, CancelHandle, CancelReceiver};
use super::signal::{InterruptSource, OsSignals, Subscription};
use super::task::{task, Task};
use crate::error::RunnerError;

/// What the background thread hands back to the supervisor
type Outcome = Result<Result<(), RunnerError>, Box<dyn Any + Send + 'static>>;

/// Single-use batch runner
///
/// The deadline is armed in [`Runner::new`], not in [`Runner::start`].
pub struct Runner {
    tasks: Vec<Task>,
    timeout: Duration,
    deadline: Instant,
    cancel: CancelHandle,
    cancel_rx: CancelReceiver,
    sources: Vec<Box<dyn InterruptSource>>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("tasks", &self.tasks.len())
            .field("timeout", &self.timeout)
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl Runner {
    /// Create a runner whose deadline expires `timeout` from now.
    ///
    /// Listens for SIGINT by default; see [`Runner::without_signals`].
    pub fn new(timeout: Duration) -> Self {
        let (cancel, cancel_rx) = cancel::slot();
        Self {
            tasks: Vec::new(),
            timeout,
            deadline: deadline_after(timeout),
            cancel,
            cancel_rx,
            sources: vec![Box::new(OsSignals::default())],
        }
    }

    /// Append a task
    pub fn add_task<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(usize) + Send + 'static,
    {
        self.tasks.push(task(f));
        self
    }

    /// Append several tasks, keeping their order
    pub fn add_tasks<I>(&mut self, tasks: I) -> &mut Self
    where
        I: IntoIterator<Item = Task>,
    {
        self.tasks.extend(tasks);
        self
    }

    /// Builder form of [`Runner::add_task`]
    pub fn with_task<F>(mut self, f: F) -> Self
    where
        F: FnOnce(usize) + Send + 'static,
    {
        self.add_task(f);
        self
    }

    /// Builder form of [`Runner::add_tasks`]
    pub fn with_tasks<I>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = Task>,
    {
        self.add_tasks(tasks);
        self
    }

    /// Add an interrupt source next to the existing ones
    pub fn with_interrupt_source(mut self, source: impl InterruptSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Replace all interrupt sources with process signals
    pub fn with_signals(mut self, signals: OsSignals) -> Self {
        self.sources = vec![Box::new(signals)];
        self
    }

    /// Drop all interrupt sources. Only [`Runner::cancel_handle`] can cancel.
    pub fn without_signals(mut self) -> Self {
        self.sources.clear();
        self
    }

    /// Handle for requesting cancellation from inside the process
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are queued
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The configured deadline duration
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the batch and report the first of completion, timeout, or interrupt.
    ///
    /// A panic inside a task is resumed on the caller.
    pub async fn start(self) -> Result<(), RunnerError> {
        let Runner {
            tasks,
            timeout,
            deadline,
            cancel,
            cancel_rx,
            sources,
        } = self;

        let subscriptions: Vec<Subscription> = sources
            .iter()
            .map(|source| source.subscribe(cancel.clone()))
            .collect();
        tracing::debug!(
            "Registered {} interrupt source(s), starting {} task(s)",
            subscriptions.len(),
            tasks.len()
        );

        let (outcome_tx, mut outcome_rx) = oneshot::channel::<Outcome>();

        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_tasks(tasks, cancel_rx, subscriptions)
            }));
            // the supervisor is gone if it already reported a timeout
            if outcome_tx.send(outcome).is_err() {
                tracing::debug!("Batch finished after the deadline, outcome discarded");
            }
        });

        tokio::select! {
            biased;
            Ok(outcome) = &mut outcome_rx => match outcome {
                Ok(result) => result,
                Err(payload) => panic::resume_unwind(payload),
            },
            _ = sleep_until(deadline) => {
                tracing::debug!("Deadline of {:?} elapsed", timeout);
                Err(RunnerError::Timeout)
            }
        }
    }
}

/// `now + timeout`, saturating far in the future instead of overflowing
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

/// The background task loop
fn run_tasks(
    tasks: Vec<Task>,
    mut cancel_rx: CancelReceiver,
    mut subscriptions: Vec<Subscription>,
) -> Result<(), RunnerError> {
    for (index, task) in tasks.into_iter().enumerate() {
        if let Some(interrupt) = cancel_rx.take() {
            subscriptions.iter_mut().for_each(Subscription::unsubscribe);
            tracing::debug!("Cancelled by {} before task #{}", interrupt, index);
            return Err(RunnerError::Interrupted);
        }
        task(index);
    }

    subscriptions.iter_mut().for_each(Subscription::unsubscribe);
    tracing::debug!("All tasks completed");
    Ok(())
}
