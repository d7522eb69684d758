//! Logging
//!
//! The runtime reports failures it has swallowed (safe calls, scheduled
//! tasks) through the `tracing` facade. Installing a subscriber is left to
//! the application.

use std::fmt::Debug;

use crate::error::Error;

/// Message attached to every failure swallowed by a safe call.
pub const PROPAGATION_FAILURE: &str = "Error during channel propagation";

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Fine,
    Info,
    Warning,
    Error,
    Severe,
}

macro_rules! emit {
    ($level:ident, $severity:expr, $message:expr, $cause:expr) => {
        match $cause {
            Some(cause) => tracing::$level!(
                severity = ?$severity,
                cause = %cause,
                suppressed = cause.suppressed().len(),
                "{}",
                $message
            ),
            None => tracing::$level!(severity = ?$severity, "{}", $message),
        }
    };
}

/// Emit one log record with an optional cause.
pub fn log(severity: Severity, message: &str, cause: Option<&Error>) {
    match severity {
        Severity::Fine => emit!(debug, severity, message, cause),
        Severity::Info => emit!(info, severity, message, cause),
        Severity::Warning => emit!(warn, severity, message, cause),
        Severity::Error | Severity::Severe => emit!(error, severity, message, cause),
    }
}

/// Report a failure swallowed by a safe call, including the value that was
/// being delivered.
pub(crate) fn propagation_failure(value: &dyn Debug, cause: &Error) {
    tracing::error!(
        severity = ?Severity::Severe,
        value = ?value,
        cause = %cause,
        suppressed = cause.suppressed().len(),
        "{}",
        PROPAGATION_FAILURE
    );
}

/// Report a scheduled task whose target failed.
pub(crate) fn task_failure(tag: &str, cause: &Error) {
    tracing::error!(
        severity = ?Severity::Severe,
        tag,
        cause = %cause,
        suppressed = cause.suppressed().len(),
        "Scheduled task failed"
    );
}

/// Report fixed-rate firings dropped because the task fell too far behind.
pub(crate) fn catch_up_overrun(tag: &str, dropped: u64) {
    tracing::warn!(
        severity = ?Severity::Warning,
        tag,
        dropped,
        "Fixed-rate task fell behind, dropping missed firings"
    );
}
