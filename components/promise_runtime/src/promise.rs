//! Promise state machine and chaining.
//!
//! This module provides the deferred-value primitive: a one-shot container
//! that transitions from Pending to exactly one of Resolved or Rejected,
//! with continuations dispatched through an injected [`Scheduler`] so they
//! never run synchronously within the call that registered or settled them.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use core_types::{PromiseError, SettleFn, ThenMember, Thenable, Value};
use tracing::trace;

use crate::resolution::resolve_value;
use crate::task_queue::{Job, Scheduler};

/// A continuation handler registered via `then` or `catch`.
///
/// Wraps a user callback receiving the settled value. Returning `Err`
/// models a synchronous throw, which rejects the chained promise.
#[derive(Clone)]
pub struct Handler {
    callback: Rc<dyn Fn(Value) -> Result<Value, PromiseError>>,
}

impl Handler {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, PromiseError> + 'static,
    {
        Self {
            callback: Rc::new(f),
        }
    }

    /// Calls the handler with the settled value or reason.
    pub fn call(&self, value: Value) -> Result<Value, PromiseError> {
        (self.callback)(value)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

type FinallyFn = Rc<dyn Fn() -> Result<(), PromiseError>>;

/// What a continuation does with the settled value once it fires.
enum ContinuationOp {
    /// A `then`/`catch` registration. `None` is the pass-through default:
    /// identity on the resolved path, re-throw on the rejected path. The
    /// asymmetry keeps unhandled rejections propagating down a chain.
    Handle(Option<Handler>),
    /// A `finally` registration: run the side effect after one further
    /// deferred hop, then pass the original settlement through unchanged.
    Finalize(FinallyFn),
}

/// One pending continuation: the operation plus the chained promise it
/// drives. An explicit captured-context record, owned by the promise it is
/// registered on and consumed exactly once at settlement.
struct Continuation {
    op: ContinuationOp,
    target: Promise,
}

impl Continuation {
    fn run_resolved(self, value: Value) {
        match self.op {
            ContinuationOp::Handle(Some(handler)) => match handler.call(value) {
                Ok(produced) => resolve_value(&self.target, produced),
                Err(err) => self.target.do_reject(Value::Error(err)),
            },
            ContinuationOp::Handle(None) => resolve_value(&self.target, value),
            ContinuationOp::Finalize(side_effect) => {
                let target = self.target.clone();
                self.target.schedule(Job::new(move || match side_effect() {
                    Ok(()) => target.do_resolve(value),
                    Err(err) => target.do_reject(Value::Error(err)),
                }));
            }
        }
    }

    fn run_rejected(self, reason: Value) {
        match self.op {
            ContinuationOp::Handle(Some(handler)) => match handler.call(reason) {
                Ok(produced) => resolve_value(&self.target, produced),
                Err(err) => self.target.do_reject(Value::Error(err)),
            },
            ContinuationOp::Handle(None) => self.target.do_reject(reason),
            ContinuationOp::Finalize(side_effect) => {
                let target = self.target.clone();
                self.target.schedule(Job::new(move || match side_effect() {
                    Ok(()) => target.do_reject(reason),
                    Err(err) => target.do_reject(Value::Error(err)),
                }));
            }
        }
    }
}

/// The three-state machine. Once a promise leaves Pending it never
/// transitions again; the continuation lists exist only while Pending.
enum PromiseState {
    Pending {
        on_resolved: Vec<Continuation>,
        on_rejected: Vec<Continuation>,
    },
    Resolved(Value),
    Rejected(Value),
}

struct PromiseInner {
    state: RefCell<PromiseState>,
    scheduler: Rc<dyn Scheduler>,
}

/// A deferred value: the eventual result of an operation that may complete
/// successfully, fail, or never complete.
///
/// Cloning a `Promise` clones a handle to the same shared state. All
/// continuation dispatch goes through the [`Scheduler`] the promise was
/// constructed with; nothing observable happens until that scheduler's
/// queue is driven.
///
/// # Examples
///
/// ```
/// use promise_runtime::{EventLoop, Handler, Promise};
/// use core_types::Value;
///
/// let event_loop = EventLoop::new();
/// let promise = Promise::new(event_loop.scheduler(), |resolver, _rejecter| {
///     resolver.resolve(Value::Int(1));
///     Ok(())
/// });
///
/// let doubled = promise.then(
///     Some(Handler::new(|value| match value {
///         Value::Int(n) => Ok(Value::Int(n * 2)),
///         other => Ok(other),
///     })),
///     None,
/// );
///
/// event_loop.run_until_done();
/// assert_eq!(doubled.value(), Some(Value::Int(2)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<PromiseInner>,
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match *self.inner.state.borrow() {
            PromiseState::Pending { .. } => "pending",
            PromiseState::Resolved(_) => "resolved",
            PromiseState::Rejected(_) => "rejected",
        };
        write!(f, "Promise {{ status: {} }}", status)
    }
}

impl Promise {
    fn pending(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            inner: Rc::new(PromiseInner {
                state: RefCell::new(PromiseState::Pending {
                    on_resolved: Vec::new(),
                    on_rejected: Vec::new(),
                }),
                scheduler,
            }),
        }
    }

    /// Creates a new promise and runs `initializer` synchronously with the
    /// resolve and reject capabilities bound to it.
    ///
    /// An `Err` out of the initializer rejects the promise with that error;
    /// this is the single catch boundary around user construction code.
    pub fn new<F>(scheduler: Rc<dyn Scheduler>, initializer: F) -> Self
    where
        F: FnOnce(Resolver, Rejecter) -> Result<(), PromiseError>,
    {
        let promise = Self::pending(scheduler);
        let resolver = Resolver {
            promise: promise.clone(),
        };
        let rejecter = Rejecter {
            promise: promise.clone(),
        };
        if let Err(err) = initializer(resolver, rejecter) {
            promise.do_reject(Value::Error(err));
        }
        promise
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.borrow(), PromiseState::Pending { .. })
    }

    /// Returns true once the promise has settled with a fulfillment value.
    pub fn is_resolved(&self) -> bool {
        matches!(*self.inner.state.borrow(), PromiseState::Resolved(_))
    }

    /// Returns true once the promise has settled with a rejection reason.
    pub fn is_rejected(&self) -> bool {
        matches!(*self.inner.state.borrow(), PromiseState::Rejected(_))
    }

    /// Returns the settled value or reason, or `None` while Pending.
    pub fn value(&self) -> Option<Value> {
        match &*self.inner.state.borrow() {
            PromiseState::Pending { .. } => None,
            PromiseState::Resolved(value) | PromiseState::Rejected(value) => Some(value.clone()),
        }
    }

    /// Wraps this promise as a [`Value`] so it can settle another promise.
    pub fn as_value(&self) -> Value {
        Value::Thenable(Rc::new(self.clone()))
    }

    /// Adds handlers for the resolved and/or rejected paths.
    ///
    /// Returns the chained promise driven by the handlers' results through
    /// the resolution procedure. A missing `on_resolved` passes the value
    /// through; a missing `on_rejected` re-propagates the reason, so a
    /// rejection travels down a chain until something handles it.
    ///
    /// Handlers never run synchronously within this call, even when the
    /// promise is already settled.
    pub fn then(&self, on_resolved: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let target = Promise::pending(self.inner.scheduler.clone());
        self.register(
            Continuation {
                op: ContinuationOp::Handle(on_resolved),
                target: target.clone(),
            },
            Continuation {
                op: ContinuationOp::Handle(on_rejected),
                target: target.clone(),
            },
        );
        target
    }

    /// Adds a handler for the rejected path only.
    ///
    /// Sugar for `then(None, on_rejected)`.
    pub fn catch(&self, on_rejected: Option<Handler>) -> Promise {
        self.then(None, on_rejected)
    }

    /// Registers a side effect to run on both paths, through one further
    /// deferred hop.
    ///
    /// The original value or reason passes through to the returned promise
    /// unchanged; an `Err` from `side_effect` rejects it instead.
    pub fn finally<F>(&self, side_effect: F) -> Promise
    where
        F: Fn() -> Result<(), PromiseError> + 'static,
    {
        let side_effect: FinallyFn = Rc::new(side_effect);
        let target = Promise::pending(self.inner.scheduler.clone());
        self.register(
            Continuation {
                op: ContinuationOp::Finalize(side_effect.clone()),
                target: target.clone(),
            },
            Continuation {
                op: ContinuationOp::Finalize(side_effect),
                target: target.clone(),
            },
        );
        target
    }

    /// Registers a continuation pair, or schedules the matching half when
    /// the promise has already settled.
    fn register(&self, resolved: Continuation, rejected: Continuation) {
        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            PromiseState::Pending {
                on_resolved,
                on_rejected,
            } => {
                on_resolved.push(resolved);
                on_rejected.push(rejected);
            }
            // Scheduling touches only the job queue, never promise state,
            // so holding the state borrow here is safe.
            PromiseState::Resolved(value) => {
                let value = value.clone();
                self.inner
                    .scheduler
                    .schedule(Job::new(move || resolved.run_resolved(value)));
            }
            PromiseState::Rejected(reason) => {
                let reason = reason.clone();
                self.inner
                    .scheduler
                    .schedule(Job::new(move || rejected.run_rejected(reason)));
            }
        }
    }

    /// Makes `target` settle identically to this promise.
    ///
    /// While this promise is Pending, the eventually-produced value re-enters
    /// the resolution procedure against `target` (so transitive thenable
    /// chains of arbitrary depth resolve); once settled, the stored value or
    /// reason is forwarded to `target` directly.
    pub(crate) fn adopt_into(&self, target: &Promise) {
        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            PromiseState::Pending {
                on_resolved,
                on_rejected,
            } => {
                on_resolved.push(Continuation {
                    op: ContinuationOp::Handle(None),
                    target: target.clone(),
                });
                on_rejected.push(Continuation {
                    op: ContinuationOp::Handle(None),
                    target: target.clone(),
                });
            }
            PromiseState::Resolved(value) => target.do_resolve(value.clone()),
            PromiseState::Rejected(reason) => target.do_reject(reason.clone()),
        }
    }

    /// Accepts a fulfillment value and schedules the settlement.
    ///
    /// Effective only while Pending at call time; the scheduled settlement
    /// re-checks, so when several settlements race the first one scheduled
    /// wins and the rest are no-ops.
    pub(crate) fn do_resolve(&self, value: Value) {
        if !self.is_pending() {
            return;
        }
        trace!("settlement scheduled (resolve)");
        let this = self.clone();
        self.schedule(Job::new(move || this.settle_resolved(value)));
    }

    /// Accepts a rejection reason and schedules the settlement.
    pub(crate) fn do_reject(&self, reason: Value) {
        if !self.is_pending() {
            return;
        }
        trace!("settlement scheduled (reject)");
        let this = self.clone();
        self.schedule(Job::new(move || this.settle_rejected(reason)));
    }

    fn settle_resolved(&self, value: Value) {
        let continuations = {
            let mut state = self.inner.state.borrow_mut();
            match &mut *state {
                PromiseState::Pending { on_resolved, .. } => {
                    let continuations = std::mem::take(on_resolved);
                    *state = PromiseState::Resolved(value.clone());
                    continuations
                }
                // A competing settlement was scheduled first.
                PromiseState::Resolved(_) | PromiseState::Rejected(_) => return,
            }
        };
        trace!(continuations = continuations.len(), "promise resolved");
        for continuation in continuations {
            continuation.run_resolved(value.clone());
        }
    }

    fn settle_rejected(&self, reason: Value) {
        let continuations = {
            let mut state = self.inner.state.borrow_mut();
            match &mut *state {
                PromiseState::Pending { on_rejected, .. } => {
                    let continuations = std::mem::take(on_rejected);
                    *state = PromiseState::Rejected(reason.clone());
                    continuations
                }
                PromiseState::Resolved(_) | PromiseState::Rejected(_) => return,
            }
        };
        trace!(continuations = continuations.len(), "promise rejected");
        for continuation in continuations {
            continuation.run_rejected(reason.clone());
        }
    }

    fn schedule(&self, job: Job) {
        self.inner.scheduler.schedule(job);
    }

    pub(crate) fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Static combinators.
impl Promise {
    /// Returns a promise whose settlement is determined by running the
    /// resolution procedure against `value` immediately.
    ///
    /// Passing a rejected promise yields an equivalently rejected promise;
    /// a plain value yields a resolved promise, still observed
    /// asynchronously by continuations.
    pub fn resolve(scheduler: Rc<dyn Scheduler>, value: Value) -> Promise {
        let promise = Self::pending(scheduler);
        resolve_value(&promise, value);
        promise
    }

    /// Returns a promise rejected with `reason` verbatim.
    ///
    /// Rejection reasons are never unwrapped, even when they are thenable.
    pub fn reject(scheduler: Rc<dyn Scheduler>, reason: Value) -> Promise {
        let promise = Self::pending(scheduler);
        promise.do_reject(reason);
        promise
    }

    /// Resolves with the ordered fulfillment values of `promises` once all
    /// of them have fulfilled, or rejects with the reason of the first one
    /// to reject.
    ///
    /// Input order is preserved regardless of completion order. An empty
    /// input resolves immediately with an empty list.
    pub fn all(scheduler: Rc<dyn Scheduler>, promises: Vec<Promise>) -> Promise {
        Promise::new(scheduler, move |resolver, rejecter| {
            if promises.is_empty() {
                resolver.resolve(Value::List(Vec::new()));
                return Ok(());
            }

            let total = promises.len();
            let settled = Rc::new(Cell::new(0usize));
            let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));

            for (index, promise) in promises.iter().enumerate() {
                let resolver = resolver.clone();
                let rejecter = rejecter.clone();
                let settled = settled.clone();
                let results = results.clone();
                promise.then(
                    Some(Handler::new(move |value| {
                        results.borrow_mut()[index] = value;
                        settled.set(settled.get() + 1);
                        if settled.get() == total {
                            resolver.resolve(Value::List(results.borrow().clone()));
                        }
                        Ok(Value::Undefined)
                    })),
                    Some(Handler::new(move |reason| {
                        rejecter.reject(reason);
                        Ok(Value::Undefined)
                    })),
                );
            }
            Ok(())
        })
    }

    /// Settles with whichever input settles first, fulfillment or
    /// rejection; every later settlement is ignored.
    ///
    /// An empty input never settles.
    pub fn race(scheduler: Rc<dyn Scheduler>, promises: Vec<Promise>) -> Promise {
        Promise::new(scheduler, move |resolver, rejecter| {
            // First response wins; the latch mirrors the thenable-adoption
            // guard so late settlements cannot double-settle.
            let claimed = Rc::new(Cell::new(false));
            for promise in &promises {
                let resolver = resolver.clone();
                let rejecter = rejecter.clone();
                let resolve_claim = claimed.clone();
                let reject_claim = claimed.clone();
                promise.then(
                    Some(Handler::new(move |value| {
                        if !resolve_claim.replace(true) {
                            resolver.resolve(value);
                        }
                        Ok(Value::Undefined)
                    })),
                    Some(Handler::new(move |reason| {
                        if !reject_claim.replace(true) {
                            rejecter.reject(reason);
                        }
                        Ok(Value::Undefined)
                    })),
                );
            }
            Ok(())
        })
    }

    /// Returns a pending promise together with its externally-callable
    /// resolve and reject capabilities.
    pub fn deferred(scheduler: Rc<dyn Scheduler>) -> Deferred {
        let promise = Self::pending(scheduler);
        Deferred {
            resolve: Resolver {
                promise: promise.clone(),
            },
            reject: Rejecter {
                promise: promise.clone(),
            },
            promise,
        }
    }

    /// Alias for [`Promise::deferred`].
    pub fn defer(scheduler: Rc<dyn Scheduler>) -> Deferred {
        Self::deferred(scheduler)
    }
}

impl Thenable for Promise {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn then_member(&self) -> Result<ThenMember, PromiseError> {
        let source = self.clone();
        Ok(ThenMember::Callable(Rc::new(
            move |on_resolved: SettleFn, on_rejected: SettleFn| {
                source.then(
                    Some(Handler::new(move |value| {
                        on_resolved(value);
                        Ok(Value::Undefined)
                    })),
                    Some(Handler::new(move |reason| {
                        on_rejected(reason);
                        Ok(Value::Undefined)
                    })),
                );
                Ok(())
            },
        )))
    }
}

/// The resolve capability bound to one promise instance.
///
/// One of the two state-transition entry points; calling it on an
/// already-settled promise is a no-op.
#[derive(Clone, Debug)]
pub struct Resolver {
    promise: Promise,
}

impl Resolver {
    /// Resolves the bound promise with `value`, stored verbatim.
    ///
    /// Promise-like values are not unwrapped here; chained `then` observers
    /// (and [`Promise::resolve`]) feed values through the resolution
    /// procedure instead.
    pub fn resolve(&self, value: Value) {
        self.promise.do_resolve(value);
    }
}

/// The reject capability bound to one promise instance.
#[derive(Clone, Debug)]
pub struct Rejecter {
    promise: Promise,
}

impl Rejecter {
    /// Rejects the bound promise with `reason`.
    pub fn reject(&self, reason: Value) {
        self.promise.do_reject(reason);
    }
}

/// A promise together with the capabilities that drive it from outside its
/// initializer.
#[derive(Clone, Debug)]
pub struct Deferred {
    /// The promise under external control.
    pub promise: Promise,
    /// Settles `promise` with a fulfillment value.
    pub resolve: Resolver,
    /// Settles `promise` with a rejection reason.
    pub reject: Rejecter,
}
