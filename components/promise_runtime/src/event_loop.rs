//! Event loop implementation.
//!
//! This module provides the driver that executes deferred jobs. It owns the
//! reference [`MicrotaskQueue`] and hands out the [`Scheduler`] capability
//! promises are constructed with. The loop is manually stepped: nothing runs
//! until the caller drives it, which is what makes settlement ordering
//! observable in tests.

use std::rc::Rc;

use crate::task_queue::{MicrotaskQueue, Scheduler};

/// The promise runtime's event loop.
///
/// Each turn takes the oldest job from the queue and runs it to completion.
/// Jobs scheduled while a job runs land at the back of the same queue and
/// execute in the same drain.
///
/// # Examples
///
/// ```
/// use promise_runtime::EventLoop;
/// use core_types::Value;
///
/// let event_loop = EventLoop::new();
/// let deferred = promise_runtime::Promise::deferred(event_loop.scheduler());
/// deferred.resolve.resolve(Value::Int(42));
///
/// event_loop.run_until_done();
/// assert!(deferred.promise.is_resolved());
/// ```
#[derive(Debug, Default)]
pub struct EventLoop {
    queue: Rc<MicrotaskQueue>,
}

impl EventLoop {
    /// Creates a new event loop with an empty queue.
    pub fn new() -> Self {
        Self {
            queue: Rc::new(MicrotaskQueue::new()),
        }
    }

    /// Returns the scheduling capability backed by this loop's queue.
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.queue.clone()
    }

    /// Runs the oldest queued job, if any.
    ///
    /// Returns true if a job ran. This is the single-step driver used by
    /// tests that need to observe intermediate states.
    pub fn run_next(&self) -> bool {
        match self.queue.dequeue() {
            Some(job) => {
                job.run();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until the queue is empty.
    ///
    /// Jobs scheduled during execution are also processed before this
    /// method returns.
    pub fn run_until_done(&self) {
        while let Some(job) = self.queue.dequeue() {
            job.run();
        }
    }

    /// Returns true if no jobs are queued.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued jobs.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }
}
