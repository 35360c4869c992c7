//! Core types for the Promize deferred-value runtime.
//!
//! This crate provides the types shared across components:
//! - [`Value`] - the dynamic, semantically untyped settlement value
//! - [`PromiseError`] / [`ErrorKind`] - structured runtime errors
//! - [`Thenable`] - the interoperability contract for promise-like objects
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, PromiseError, Value};
//!
//! let reason: Value = PromiseError::type_error("boom").into();
//! assert!(matches!(reason, Value::Error(ref e) if e.kind == ErrorKind::TypeError));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod thenable;
pub mod value;

// Re-export main types at crate root
pub use error::{ErrorKind, PromiseError};
pub use thenable::{SettleFn, ThenFn, ThenMember, Thenable};
pub use value::Value;
