//! The resolution procedure.
//!
//! Given a value produced by a continuation (or an adoption step), decide
//! how it becomes the target promise's settlement: adopt it as a thenable,
//! treat it as a plain value, or reject on structural errors. This is the
//! subtlest part of the system: it must tolerate adversarial thenables
//! (throwing accessors, multiply-invoked callbacks, self-referential chains)
//! without the target ever settling twice or hanging.

use std::cell::Cell;
use std::rc::Rc;

use core_types::{PromiseError, SettleFn, ThenMember, Value};
use tracing::debug;

use crate::promise::Promise;

/// Resolves `target` with the candidate value `x`.
///
/// Evaluated as an ordered decision sequence:
/// 1. `x` is `target` itself: reject with a chaining-cycle error.
/// 2. `x` is a native promise: adopt its eventual settlement.
/// 3. `x` is some other thenable object: probe its `then` member and, when
///    callable, invoke it with first-call-wins settlement callbacks.
/// 4. Anything else settles `target` directly.
pub(crate) fn resolve_value(target: &Promise, x: Value) {
    let object = match &x {
        Value::Thenable(object) => object.clone(),
        _ => {
            target.do_resolve(x);
            return;
        }
    };

    if let Some(native) = object.as_any().downcast_ref::<Promise>() {
        if native.ptr_eq(target) {
            target.do_reject(Value::Error(PromiseError::type_error(
                "chaining cycle detected for promise",
            )));
            return;
        }
        debug!("adopting native promise");
        native.adopt_into(target);
        return;
    }

    match object.then_member() {
        // The accessor threw; no settlement callback can have run yet.
        Err(err) => target.do_reject(Value::Error(err)),
        Ok(ThenMember::Callable(then)) => {
            debug!("adopting foreign thenable");
            // One latch shared by both callbacks and the throw path: the
            // first settlement attempt wins, everything after is ignored.
            let claimed = Rc::new(Cell::new(false));

            let resolve_target = target.clone();
            let resolve_claim = claimed.clone();
            let on_resolved: SettleFn = Rc::new(move |value| {
                if !resolve_claim.replace(true) {
                    resolve_value(&resolve_target, value);
                }
            });

            let reject_target = target.clone();
            let reject_claim = claimed.clone();
            let on_rejected: SettleFn = Rc::new(move |reason| {
                if !reject_claim.replace(true) {
                    reject_target.do_reject(reason);
                }
            });

            if let Err(err) = then(on_resolved, on_rejected) {
                if !claimed.replace(true) {
                    target.do_reject(Value::Error(err));
                }
            }
        }
        // No callable `then`: the object is a plain value.
        Ok(ThenMember::Plain) => target.do_resolve(x),
    }
}
