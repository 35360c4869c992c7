//! Unit tests for the Promise state machine

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use core_types::{ErrorKind, PromiseError, Value};
use promise_runtime::{EventLoop, Handler, Promise};

#[test]
fn new_promise_is_pending() {
    let event_loop = EventLoop::new();
    let promise = Promise::new(event_loop.scheduler(), |_resolver, _rejecter| Ok(()));
    assert!(promise.is_pending());
    assert!(!promise.is_resolved());
    assert!(!promise.is_rejected());
}

#[test]
fn new_promise_has_no_value() {
    let event_loop = EventLoop::new();
    let promise = Promise::new(event_loop.scheduler(), |_resolver, _rejecter| Ok(()));
    assert_eq!(promise.value(), None);
}

#[test]
fn initializer_runs_synchronously() {
    let event_loop = EventLoop::new();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let _promise = Promise::new(event_loop.scheduler(), move |_resolver, _rejecter| {
        flag.set(true);
        Ok(())
    });
    assert!(ran.get());
}

#[test]
fn resolve_settles_after_drain() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.resolve.resolve(Value::Int(42));
    event_loop.run_until_done();

    assert!(deferred.promise.is_resolved());
    assert_eq!(deferred.promise.value(), Some(Value::Int(42)));
}

#[test]
fn reject_settles_after_drain() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.reject.reject(Value::String("nope".to_string()));
    event_loop.run_until_done();

    assert!(deferred.promise.is_rejected());
    assert_eq!(
        deferred.promise.value(),
        Some(Value::String("nope".to_string()))
    );
}

#[test]
fn cannot_resolve_already_resolved_promise() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.resolve.resolve(Value::Int(42));
    event_loop.run_until_done();
    deferred.resolve.resolve(Value::Int(100)); // Should be ignored
    event_loop.run_until_done();

    assert_eq!(deferred.promise.value(), Some(Value::Int(42)));
}

#[test]
fn cannot_reject_already_resolved_promise() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.resolve.resolve(Value::Int(42));
    event_loop.run_until_done();
    deferred.reject.reject(Value::String("late".to_string())); // Should be ignored
    event_loop.run_until_done();

    assert!(deferred.promise.is_resolved());
}

#[test]
fn cannot_resolve_already_rejected_promise() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.reject.reject(Value::String("first".to_string()));
    event_loop.run_until_done();
    deferred.resolve.resolve(Value::Int(42)); // Should be ignored
    event_loop.run_until_done();

    assert!(deferred.promise.is_rejected());
    assert_eq!(
        deferred.promise.value(),
        Some(Value::String("first".to_string()))
    );
}

#[test]
fn competing_settlements_before_drain_first_wins() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    deferred.resolve.resolve(Value::Int(1));
    deferred.reject.reject(Value::String("second".to_string()));
    deferred.resolve.resolve(Value::Int(3));
    event_loop.run_until_done();

    assert!(deferred.promise.is_resolved());
    assert_eq!(deferred.promise.value(), Some(Value::Int(1)));
}

#[test]
fn continuation_does_not_run_synchronously_on_pending_promise() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());
    let ran = Rc::new(Cell::new(false));

    let flag = ran.clone();
    deferred.promise.then(
        Some(Handler::new(move |value| {
            flag.set(true);
            Ok(value)
        })),
        None,
    );
    deferred.resolve.resolve(Value::Int(1));

    // Nothing observable until the queue is driven.
    assert!(!ran.get());
    event_loop.run_until_done();
    assert!(ran.get());
}

#[test]
fn continuation_does_not_run_synchronously_on_settled_promise() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(1));
    event_loop.run_until_done();
    assert!(promise.is_resolved());

    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    promise.then(
        Some(Handler::new(move |value| {
            flag.set(true);
            Ok(value)
        })),
        None,
    );

    assert!(!ran.get());
    event_loop.run_until_done();
    assert!(ran.get());
}

#[test]
fn continuations_run_in_registration_order() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());
    let order = Rc::new(RefCell::new(Vec::new()));

    for n in [1, 2, 3] {
        let order = order.clone();
        deferred.promise.then(
            Some(Handler::new(move |value| {
                order.borrow_mut().push(n);
                Ok(value)
            })),
            None,
        );
    }

    deferred.resolve.resolve(Value::Undefined);
    event_loop.run_until_done();
    assert_eq!(*order.borrow(), vec![1, 2, 3]);
}

#[test]
fn continuations_run_exactly_once() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    deferred.promise.then(
        Some(Handler::new(move |value| {
            counter.set(counter.get() + 1);
            Ok(value)
        })),
        None,
    );

    deferred.resolve.resolve(Value::Int(1));
    deferred.resolve.resolve(Value::Int(2));
    event_loop.run_until_done();
    event_loop.run_until_done();

    assert_eq!(calls.get(), 1);
}

#[test]
fn then_passes_handler_result_down_the_chain() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(10));

    let chained = promise.then(
        Some(Handler::new(|value| match value {
            Value::Int(n) => Ok(Value::Int(n + 1)),
            other => Ok(other),
        })),
        None,
    );

    event_loop.run_until_done();
    assert_eq!(chained.value(), Some(Value::Int(11)));
}

#[test]
fn handler_error_rejects_chained_promise_only() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(1));

    let chained = promise.then(
        Some(Handler::new(|_value| {
            Err(PromiseError::type_error("handler threw"))
        })),
        None,
    );

    event_loop.run_until_done();
    // The source stays resolved; only the chained promise rejects.
    assert!(promise.is_resolved());
    assert!(chained.is_rejected());
    match chained.value() {
        Some(Value::Error(err)) => assert_eq!(err.kind, ErrorKind::TypeError),
        other => panic!("expected error rejection, got {:?}", other),
    }
}

#[test]
fn missing_rejection_handler_propagates_reason() {
    let event_loop = EventLoop::new();
    let promise = Promise::reject(event_loop.scheduler(), Value::String("e".to_string()));

    // Neither link handles rejection; the reason must reach the end
    // without being swallowed into a fulfillment.
    let tail = promise.then(None, None).then(None, None);

    event_loop.run_until_done();
    assert!(tail.is_rejected());
    assert_eq!(tail.value(), Some(Value::String("e".to_string())));
}

#[test]
fn missing_resolve_handler_passes_value_through() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(5));

    let tail = promise.then(None, None).then(None, None);

    event_loop.run_until_done();
    assert_eq!(tail.value(), Some(Value::Int(5)));
}

#[test]
fn catch_recovers_from_rejection() {
    let event_loop = EventLoop::new();
    let promise = Promise::reject(event_loop.scheduler(), Value::String("e".to_string()));

    let recovered = promise.catch(Some(Handler::new(|reason| Ok(reason))));

    event_loop.run_until_done();
    assert!(recovered.is_resolved());
    assert_eq!(recovered.value(), Some(Value::String("e".to_string())));
}

#[test]
fn catch_is_skipped_on_fulfillment() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(1));
    let ran = Rc::new(Cell::new(false));

    let flag = ran.clone();
    let tail = promise.catch(Some(Handler::new(move |reason| {
        flag.set(true);
        Ok(reason)
    })));

    event_loop.run_until_done();
    assert!(!ran.get());
    assert_eq!(tail.value(), Some(Value::Int(1)));
}

#[test]
fn finally_runs_once_and_passes_value_through() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(1));
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    let tail = promise.finally(move || {
        counter.set(counter.get() + 1);
        Ok(())
    });

    event_loop.run_until_done();
    assert_eq!(calls.get(), 1);
    assert!(tail.is_resolved());
    assert_eq!(tail.value(), Some(Value::Int(1)));
}

#[test]
fn finally_runs_on_rejection_and_passes_reason_through() {
    let event_loop = EventLoop::new();
    let promise = Promise::reject(event_loop.scheduler(), Value::String("e".to_string()));
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    let tail = promise.finally(move || {
        counter.set(counter.get() + 1);
        Ok(())
    });

    event_loop.run_until_done();
    assert_eq!(calls.get(), 1);
    assert!(tail.is_rejected());
    assert_eq!(tail.value(), Some(Value::String("e".to_string())));
}

#[test]
fn finally_error_rejects_chained_promise() {
    let event_loop = EventLoop::new();
    let promise = Promise::resolve(event_loop.scheduler(), Value::Int(1));

    let tail = promise.finally(|| Err(PromiseError::internal("cleanup failed")));

    event_loop.run_until_done();
    assert!(tail.is_rejected());
    assert_eq!(
        tail.value(),
        Some(Value::Error(PromiseError::internal("cleanup failed")))
    );
}

#[test]
fn resolving_from_initializer_still_defers_continuations() {
    let event_loop = EventLoop::new();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let trace = observed.clone();
    let promise = Promise::new(event_loop.scheduler(), move |resolver, _rejecter| {
        resolver.resolve(Value::Int(1));
        trace.borrow_mut().push("initializer done");
        Ok(())
    });

    let trace = observed.clone();
    promise.then(
        Some(Handler::new(move |value| {
            trace.borrow_mut().push("continuation");
            Ok(value)
        })),
        None,
    );

    observed.borrow_mut().push("registered");
    event_loop.run_until_done();
    assert_eq!(
        *observed.borrow(),
        vec!["initializer done", "registered", "continuation"]
    );
}

#[test]
fn reentrant_settlement_from_continuation_is_ignored() {
    let event_loop = EventLoop::new();
    let deferred = Promise::deferred(event_loop.scheduler());

    let resolve_again = deferred.resolve.clone();
    deferred.promise.then(
        Some(Handler::new(move |value| {
            // Settling the already-settled source from inside its own
            // continuation must be a no-op.
            resolve_again.resolve(Value::Int(99));
            Ok(value)
        })),
        None,
    );

    deferred.resolve.resolve(Value::Int(1));
    event_loop.run_until_done();
    assert_eq!(deferred.promise.value(), Some(Value::Int(1)));
}
