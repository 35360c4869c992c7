//! Error types shared across the promise runtime.
//!
//! This module provides the structured error type carried by rejected
//! promises and returned by fallible handler and thenable invocations.

use std::fmt;

use thiserror::Error;

/// The kind of promise runtime error.
///
/// A closed set; every error produced by the runtime falls into one of
/// these categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value was used in a way its type does not allow
    /// (e.g., resolving a promise with itself).
    TypeError,
    /// Value out of allowed range.
    RangeError,
    /// Internal runtime error.
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::InternalError => "InternalError",
        };
        write!(f, "{}", name)
    }
}

/// An error raised by user code or by the runtime itself.
///
/// Handler callbacks and thenable invocations model a synchronous throw by
/// returning `Err(PromiseError)`; the runtime converts these into rejections
/// rather than propagating them as Rust panics.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, PromiseError};
///
/// let error = PromiseError::type_error("chaining cycle detected for promise");
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert_eq!(error.to_string(), "TypeError: chaining cycle detected for promise");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct PromiseError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl PromiseError {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates a new `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}
