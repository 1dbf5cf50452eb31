use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFailureKind {
    OutOfBounds,
    MissingReference,
    IllegalState,
    Unexpected,
}

impl FrameFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameFailureKind::OutOfBounds => "out_of_bounds",
            FrameFailureKind::MissingReference => "missing_reference",
            FrameFailureKind::IllegalState => "illegal_state",
            FrameFailureKind::Unexpected => "unexpected",
        }
    }
}

/// A single actor's update or draw step failed. The host logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct FrameFailure {
    pub kind: FrameFailureKind,
    pub message: String,
}

impl FrameFailure {
    pub fn new(kind: FrameFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(FrameFailureKind::OutOfBounds, message)
    }

    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::new(FrameFailureKind::MissingReference, message)
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(FrameFailureKind::IllegalState, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(FrameFailureKind::Unexpected, message)
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::new(classify_panic_message(&message), message)
    }
}

fn classify_panic_message(message: &str) -> FrameFailureKind {
    if message.contains("out of bounds") || message.contains("out of range") {
        FrameFailureKind::OutOfBounds
    } else if message.contains("on a `None` value") {
        FrameFailureKind::MissingReference
    } else if message.contains("already borrowed") || message.contains("already mutably borrowed")
    {
        FrameFailureKind::IllegalState
    } else {
        FrameFailureKind::Unexpected
    }
}

/// Runs one actor step, turning both returned failures and panics into a `FrameFailure`.
pub(crate) fn isolate<F>(step: F) -> Result<(), FrameFailure>
where
    F: FnOnce() -> Result<(), FrameFailure>,
{
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result,
        Err(payload) => Err(FrameFailure::from_panic(payload)),
    }
}
