//! Fault-isolated multicast dispatch
//!
//! A [`SafeDispatcher`] calls every subscribed handler in registration order.
//! A handler that returns an error or panics is recorded as a
//! [`HandlerFailure`] and reported through the [`LogSink`]; the remaining
//! handlers still run and the caller never sees the failure as an error.

use std::any::type_name;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::logging::LogSink;

/// Error a handler may return
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Callback<T> = Box<dyn Fn(&T) -> Result<(), HandlerError> + Send + Sync>;

struct Handler<T> {
    name: String,
    callback: Callback<T>,
}

/// A handler invocation that failed during dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    /// Name of the event being dispatched
    pub event: &'static str,
    /// Identity of the failing handler
    pub handler: String,
    /// Debug rendering of the payload the handler received
    pub payload: String,
    pub cause: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler {} failed on {}({}): {}",
            self.handler, self.event, self.payload, self.cause
        )
    }
}

/// Ordered list of handlers for one event
pub struct SafeDispatcher<T> {
    event: &'static str,
    handlers: Vec<Handler<T>>,
    log: Arc<dyn LogSink>,
}

impl<T: fmt::Debug> SafeDispatcher<T> {
    pub fn new(event: &'static str, log: Arc<dyn LogSink>) -> Self {
        Self {
            event,
            handlers: Vec::new(),
            log,
        }
    }

    /// Name of the event this dispatcher drives
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Append a handler, identified by its type name.
    ///
    /// Handlers are not deduplicated; subscribing twice runs twice.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_named(type_name::<F>(), handler);
    }

    /// Append a handler under an explicit identity
    pub fn subscribe_named<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(Handler {
            name: name.into(),
            callback: Box::new(handler),
        });
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler with `payload`.
    ///
    /// Returns the failures in registration order; an empty vector means
    /// every handler succeeded (or none were subscribed).
    pub fn dispatch(&self, payload: &T) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();

        for handler in &self.handlers {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| (handler.callback)(payload)));

            let cause = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            let failure = HandlerFailure {
                event: self.event,
                handler: handler.name.clone(),
                payload: format!("{payload:?}"),
                cause,
            };
            self.log.error_with(
                format!("Error executing handler {} for {}", failure.handler, self.event),
                &failure.cause,
                true,
            );
            failures.push(failure);
        }

        failures
    }
}

impl<T> fmt::Debug for SafeDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeDispatcher")
            .field("event", &self.event)
            .field(
                "handlers",
                &self.handlers.iter().map(|h| &h.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
