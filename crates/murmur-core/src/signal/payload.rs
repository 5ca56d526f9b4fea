use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BoxError;

/// Arguments sent with a signal: positional values plus named values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a named argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Named argument `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Named argument `key` as a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).and_then(Value::as_str)
    }
}

/// Result returned by a receiver. `Value::Null` stands for "no answer".
pub type ReceiverResult = Result<Value, BoxError>;

/// Something that can be connected to a [`SignalBus`](super::SignalBus).
///
/// Any `Fn(&Payload) -> ReceiverResult` closure is a receiver.
pub trait Receiver: Send + Sync {
    fn receive(&self, payload: &Payload) -> ReceiverResult;
}

impl<F> Receiver for F
where
    F: Fn(&Payload) -> ReceiverResult + Send + Sync,
{
    fn receive(&self, payload: &Payload) -> ReceiverResult {
        self(payload)
    }
}
