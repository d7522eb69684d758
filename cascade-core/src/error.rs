//! Error Types
//!
//! Three families of failure exist in the runtime:
//!
//! - **Configuration errors**: a constructor was handed an invalid argument
//!   (a non-positive duration, inverted bounds, an unknown state name).
//!   These are returned from the call that introduced them.
//!
//! - **State errors**: a timer was started, fed or stopped in the wrong
//!   running state.
//!
//! - **Propagation errors**: a listener or sink failed while a value or event
//!   was being delivered. These are the only errors that are aggregated.
//!
//! # Aggregation
//!
//! A fan-out always delivers to every target. If exactly one target fails,
//! its error comes back untouched. If several fail, the first failure is the
//! primary error and every later failure is attached to it as a suppressed
//! cause. See [`Error::suppress`].

use thiserror::Error;

/// Boxed error produced by user listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by channels, combinators, timers and the state machine.
#[derive(Debug, Error)]
pub enum Error {
    /// A constructor or operation received an invalid argument.
    #[error("invalid argument: {what}")]
    InvalidArgument { what: String },

    /// An operation was invoked in a state that does not permit it.
    #[error("invalid state: {what}")]
    InvalidState { what: String },

    /// A listener or sink failed during propagation.
    #[error("listener failed: {0}")]
    Listener(#[source] BoxError),

    /// Several targets of one fan-out failed.
    #[error("{primary} (+{} suppressed)", .suppressed.len())]
    Aggregate {
        primary: Box<Error>,
        suppressed: Vec<Error>,
    },

    /// A configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error.
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Error::InvalidArgument { what: what.into() }
    }

    /// Build a state-precondition error.
    pub fn invalid_state(what: impl Into<String>) -> Self {
        Error::InvalidState { what: what.into() }
    }

    /// Build a listener failure from a plain message.
    pub fn listener(message: impl Into<String>) -> Self {
        Error::Listener(message.into().into())
    }

    /// Wrap an arbitrary error raised by listener code.
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Listener(Box::new(err))
    }

    /// Attach `other` to this error as a suppressed cause.
    ///
    /// If this error already carries suppressed causes, `other` is appended
    /// to the existing list instead of nesting a new bundle.
    pub fn suppress(self, other: Error) -> Self {
        match self {
            Error::Aggregate {
                primary,
                mut suppressed,
            } => {
                suppressed.push(other);
                Error::Aggregate {
                    primary,
                    suppressed,
                }
            }
            primary => Error::Aggregate {
                primary: Box::new(primary),
                suppressed: vec![other],
            },
        }
    }

    /// The primary error. For anything that is not a bundle, `self`.
    pub fn primary(&self) -> &Error {
        match self {
            Error::Aggregate { primary, .. } => primary,
            other => other,
        }
    }

    /// Secondary failures attached to this error.
    pub fn suppressed(&self) -> &[Error] {
        match self {
            Error::Aggregate { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// True for errors caused by invalid construction arguments.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. } | Error::Config(_))
    }

    /// True for timer state-precondition errors.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}
