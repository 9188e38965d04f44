//! The capability application code implements per managed object.
//!
//! A [`Variable`] is driven by the dispatcher through `get` and the
//! four-phase Set protocol (RFC 2741 §7.2.4): `test_set` validates and
//! reserves, then exactly one of `commit_set` (followed by `cleanup_set` or
//! `undo_set`) or `cleanup_set` releases the reservation.

use std::fmt;

use crate::{
    pdu::ResponseError,
    value::{Value, ValueKind},
};

/// Outcome of a TestSet validation (RFC 2741 §7.2.4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestSetResult {
    NoError,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    NotWritable,
    InconsistentName,
}

impl From<TestSetResult> for ResponseError {
    fn from(r: TestSetResult) -> Self {
        match r {
            TestSetResult::NoError => ResponseError::NoAgentXError,
            TestSetResult::GenErr => ResponseError::GenErr,
            TestSetResult::NoAccess => ResponseError::NoAccess,
            TestSetResult::WrongType => ResponseError::WrongType,
            TestSetResult::WrongLength => ResponseError::WrongLength,
            TestSetResult::WrongValue => ResponseError::WrongValue,
            TestSetResult::NoCreation => ResponseError::NoCreation,
            TestSetResult::InconsistentValue => ResponseError::InconsistentValue,
            TestSetResult::ResourceUnavailable => ResponseError::ResourceUnavailable,
            TestSetResult::NotWritable => ResponseError::NotWritable,
            TestSetResult::InconsistentName => ResponseError::InconsistentName,
        }
    }
}

/// Failure reported by [`Variable::get`]; surfaces to the master as genErr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetError(pub String);

impl fmt::Display for GetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "get failed: {}", self.0)
    }
}

impl std::error::Error for GetError {}

/// A managed object served by the sub-agent.
pub trait Variable: Send {
    /// The kind of value this variable holds. A Set carrying another kind
    /// is answered with wrongType before `test_set` is consulted.
    fn kind(&self) -> ValueKind;

    /// Refreshes and returns the current value.
    fn get(&mut self) -> Result<Value, GetError>;

    /// Validates `value` and reserves what a later commit needs.
    fn test_set(&mut self, _value: &Value) -> TestSetResult {
        TestSetResult::NoAccess
    }

    /// Releases whatever `test_set` reserved.
    fn cleanup_set(&mut self) {}

    fn commit_set(&mut self) -> bool {
        false
    }

    fn undo_set(&mut self) -> bool {
        false
    }
}

/// A variable holding its value in memory, optionally writable.
pub struct Scalar {
    value: Value,
    writable: bool,
    pending: Option<Value>,
    previous: Option<Value>,
}

impl Scalar {
    /// Creates a read-only scalar.
    pub fn new(value: Value) -> Self {
        Scalar {
            value,
            writable: false,
            pending: None,
            previous: None,
        }
    }

    /// Creates a scalar the master may Set.
    pub fn writable(value: Value) -> Self {
        Scalar {
            writable: true,
            ..Scalar::new(value)
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Variable for Scalar {
    fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    fn get(&mut self) -> Result<Value, GetError> {
        Ok(self.value.clone())
    }

    fn test_set(&mut self, value: &Value) -> TestSetResult {
        if !self.writable {
            return TestSetResult::NotWritable;
        }
        if value.kind() != self.value.kind() {
            return TestSetResult::WrongType;
        }
        self.pending = Some(value.clone());
        TestSetResult::NoError
    }

    fn cleanup_set(&mut self) {
        self.pending = None;
        self.previous = None;
    }

    fn commit_set(&mut self) -> bool {
        match self.pending.take() {
            Some(new_value) => {
                self.previous = Some(std::mem::replace(&mut self.value, new_value));
                true
            }
            None => false,
        }
    }

    fn undo_set(&mut self) -> bool {
        match self.previous.take() {
            Some(old) => {
                self.value = old;
                true
            }
            None => false,
        }
    }
}

/// A read-only variable whose value is produced on every Get.
pub struct Computed<F> {
    kind: ValueKind,
    source: F,
}

impl<F> Computed<F>
where
    F: FnMut() -> Result<Value, GetError> + Send,
{
    pub fn new(kind: ValueKind, source: F) -> Self {
        Computed { kind, source }
    }
}

impl<F> Variable for Computed<F>
where
    F: FnMut() -> Result<Value, GetError> + Send,
{
    fn kind(&self) -> ValueKind {
        self.kind
    }

    fn get(&mut self) -> Result<Value, GetError> {
        let value = (self.source)()?;
        if value.kind() != self.kind {
            return Err(GetError(format!(
                "produced {:?}, expected {:?}",
                value.kind(),
                self.kind
            )));
        }
        Ok(value)
    }

    fn test_set(&mut self, _value: &Value) -> TestSetResult {
        TestSetResult::NotWritable
    }
}
