//! The thenable interoperability contract.
//!
//! The resolution procedure treats *any* object exposing a callable `then`
//! member as an adoptable promise-like value, not only this implementation's
//! own promise type. This module defines that contract as a trait so foreign
//! implementations plug into the same adoption path.

use std::any::Any;
use std::rc::Rc;

use crate::{PromiseError, Value};

/// A settlement callback handed to a thenable's `then` member.
///
/// The callee may invoke it zero or more times; the caller is responsible
/// for first-call-wins semantics.
pub type SettleFn = Rc<dyn Fn(Value)>;

/// A callable `then` member.
///
/// Invoked with a resolve callback and a reject callback, in that order.
/// Returning `Err` models a synchronous throw out of the `then` call.
pub type ThenFn = Rc<dyn Fn(SettleFn, SettleFn) -> Result<(), PromiseError>>;

/// The result of looking up the `then` member on a thenable object.
pub enum ThenMember {
    /// The object carries a callable `then`.
    Callable(ThenFn),
    /// The object has no callable `then`; it is treated as a plain value.
    Plain,
}

/// An object that may expose a callable `then` member.
///
/// This is the "object or callable" category of the value model: anything
/// heap-allocated that the resolution procedure must probe before treating
/// it as a plain value.
///
/// Implementations model the hostile corners of the contract faithfully:
/// [`Thenable::then_member`] returning `Err` corresponds to a throwing
/// property accessor, and a returned [`ThenMember::Callable`] is free to
/// invoke its callbacks multiple times or throw after calling back.
pub trait Thenable {
    /// Returns `self` as [`Any`], so the resolution procedure can recover
    /// the concrete native promise type for its fast path.
    fn as_any(&self) -> &dyn Any;

    /// Looks up the `then` member.
    ///
    /// `Err` models an accessor that throws during the lookup itself.
    fn then_member(&self) -> Result<ThenMember, PromiseError>;
}
