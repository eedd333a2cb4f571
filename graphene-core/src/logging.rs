//! Logging collaborator
//!
//! The core never formats or persists log output itself. Every informational
//! event, handler failure and lifecycle error is handed to a [`LogSink`] as a
//! [`LogRecord`]. [`TracingSink`] forwards records to `tracing`, which is how
//! the `graphene` binary wires it up; [`MemorySink`] keeps them for tests.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Source name used for records emitted by the core itself.
pub const CORE_SOURCE: &str = "Graphene";

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Plain log line
    Log,
    /// Milestones worth surfacing (module scans, lifecycle transitions)
    Important,
    Warning,
    Error,
    /// Detail of the error that was logged just before it
    Exception,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Log => "LOG",
            Severity::Important => "IMPORTANT",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Exception => "EXCEPTION",
        }
    }
}

/// Where a record should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destinations {
    pub console: bool,
    pub file: bool,
}

impl Destinations {
    pub const ALL: Self = Self {
        console: true,
        file: true,
    };
    pub const FILE_ONLY: Self = Self {
        console: false,
        file: true,
    };
}

impl Default for Destinations {
    fn default() -> Self {
        Self::ALL
    }
}

/// A single log message handed to the logging collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub source: String,
    pub severity: Severity,
    pub message: String,
    pub destinations: Destinations,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            source: CORE_SOURCE.to_string(),
            severity,
            message: message.into(),
            destinations: Destinations::ALL,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_destinations(mut self, destinations: Destinations) -> Self {
        self.destinations = destinations;
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} >> {}",
            self.severity.as_str(),
            self.source,
            self.message
        )
    }
}

/// Receives every log record produced by the core
pub trait LogSink: Send + Sync {
    fn write(&self, record: LogRecord);
}

impl dyn LogSink {
    pub fn log(&self, message: impl Into<String>) {
        self.write(LogRecord::new(Severity::Log, message));
    }

    pub fn important(&self, message: impl Into<String>) {
        self.write(LogRecord::new(Severity::Important, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.write(LogRecord::new(Severity::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.write(LogRecord::new(Severity::Error, message));
    }

    /// Log an error followed by the cause that produced it.
    ///
    /// The cause always goes to the log file; `cause_in_console` controls
    /// whether it is also shown on the console.
    pub fn error_with(
        &self,
        message: impl Into<String>,
        cause: &dyn fmt::Display,
        cause_in_console: bool,
    ) {
        self.write(LogRecord::new(Severity::Error, message));
        self.write(
            LogRecord::new(Severity::Exception, cause.to_string()).with_destinations(
                Destinations {
                    console: cause_in_console,
                    file: true,
                },
            ),
        );
    }
}

/// Emit one record at a fixed target, picking the level from its severity.
macro_rules! emit {
    ($target:literal, $record:expr) => {{
        let record = $record;
        match record.severity {
            Severity::Log => {
                tracing::info!(target: $target, source = %record.source, "{}", record.message)
            }
            Severity::Important => tracing::info!(
                target: $target,
                source = %record.source,
                important = true,
                "{}",
                record.message
            ),
            Severity::Warning => {
                tracing::warn!(target: $target, source = %record.source, "{}", record.message)
            }
            Severity::Error | Severity::Exception => tracing::error!(
                target: $target,
                source = %record.source,
                severity = record.severity.as_str(),
                "{}",
                record.message
            ),
        }
    }};
}

/// Forwards records to `tracing`.
///
/// Destinations map onto targets so subscribers can route them: `graphene`
/// for both, `graphene::console` for console only and `graphene::file` for
/// file only. Records with no destination are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: LogRecord) {
        match (record.destinations.console, record.destinations.file) {
            (true, true) => emit!("graphene", &record),
            (true, false) => emit!("graphene::console", &record),
            (false, true) => emit!("graphene::file", &record),
            (false, false) => {}
        }
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records written so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records of one severity, in write order
    pub fn with_severity(&self, severity: Severity) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.severity == severity)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
