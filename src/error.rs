//! Failure type carried through executions.

use std::any::Any;

use crate::value::Value;

/// A raised failure travelling through the unwind phase of an execution.
///
/// The `payload` is the original failure value, carried unchanged from the
/// step that raised it to whichever error step clears it or to the caller.
/// `origin` names the interceptor whose step raised it; it exists only for
/// diagnostics and never substitutes for the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    payload: Value,
    origin: Option<String>,
}

impl Failure {
    /// Create a failure from an arbitrary payload value.
    pub fn new(payload: impl Into<Value>) -> Self {
        Failure {
            payload: payload.into(),
            origin: None,
        }
    }

    /// Create a failure whose payload is a plain message string.
    pub fn message(message: impl Into<String>) -> Self {
        Failure {
            payload: Value::Str(message.into()),
            origin: None,
        }
    }

    /// Convert a caught panic payload into a failure.
    ///
    /// String panics keep their message as the payload verbatim; other
    /// payload types cannot cross the `catch_unwind` boundary as `Value`s
    /// and degrade to a generic message.
    pub(crate) fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let payload = if let Some(message) = panic.downcast_ref::<&str>() {
            Value::Str((*message).to_string())
        } else if let Some(message) = panic.downcast_ref::<String>() {
            Value::Str(message.clone())
        } else {
            Value::Str("step panicked with a non-string payload".to_string())
        };
        Failure {
            payload,
            origin: None,
        }
    }

    /// The original failure payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consume the failure, yielding the payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Name of the interceptor whose step raised this failure, if known.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Record the raising interceptor's name, keeping an earlier origin.
    pub(crate) fn with_origin(mut self, name: &str) -> Self {
        if self.origin.is_none() {
            self.origin = Some(name.to_string());
        }
        self
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "execution failed in {}: {:?}", origin, self.payload),
            None => write!(f, "execution failed: {:?}", self.payload),
        }
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = Failure::message("boom");
        assert!(failure.to_string().contains("boom"));

        let failure = Failure::new(7i64).with_origin("guard");
        assert!(failure.to_string().contains("guard"));
    }

    #[test]
    fn test_failure_payload_preserved() {
        let failure = Failure::new(Value::List(vec![Value::Int(1)]));
        assert_eq!(failure.payload(), &Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn test_from_panic_keeps_string_payloads() {
        let failure = Failure::from_panic(Box::new("bad input"));
        assert_eq!(failure.payload().as_str(), Some("bad input"));

        let failure = Failure::from_panic(Box::new(String::from("worse input")));
        assert_eq!(failure.payload().as_str(), Some("worse input"));

        let failure = Failure::from_panic(Box::new(17u8));
        assert!(failure.payload().as_str().is_some());
    }

    #[test]
    fn test_with_origin_keeps_first() {
        let failure = Failure::message("x").with_origin("a").with_origin("b");
        assert_eq!(failure.origin(), Some("a"));
    }
}
