//! Deferred-value runtime: a from-scratch promise primitive.
//!
//! This crate provides a one-shot value container with the classic
//! promise surface:
//! - [`Promise`] - the state machine, chaining (`then`/`catch`/`finally`),
//!   and the static combinators (`resolve`/`reject`/`all`/`race`/`deferred`)
//! - a resolution procedure that recursively unwraps promise-like
//!   ("thenable") settlement values, including foreign implementations
//! - [`EventLoop`] / [`MicrotaskQueue`] - the injected deferred-execution
//!   capability continuations are dispatched through
//!
//! # Overview
//!
//! A promise settles at most once, continuations always run asynchronously
//! (after a queue hop, never within the registering or settling call), and
//! continuations registered before settlement fire in registration order.
//! The scheduler is injected per promise; the library installs no global
//! queue.
//!
//! # Examples
//!
//! ```
//! use promise_runtime::{EventLoop, Handler, Promise};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let deferred = Promise::deferred(event_loop.scheduler());
//!
//! let chained = deferred.promise.then(
//!     Some(Handler::new(|value| Ok(value))),
//!     None,
//! );
//!
//! deferred.resolve.resolve(Value::String("done".to_string()));
//! event_loop.run_until_done();
//! assert_eq!(chained.value(), Some(Value::String("done".to_string())));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event_loop;
pub mod promise;
mod resolution;
pub mod task_queue;

// Re-export main types at crate root
pub use event_loop::EventLoop;
pub use promise::{Deferred, Handler, Promise, Rejecter, Resolver};
pub use task_queue::{Job, MicrotaskQueue, Scheduler};
