//! Core error type for all reader operations
//!
//! Every failure a reader session can surface is consolidated here so that callers can
//! tell "retry the reader" ([`Error::ReaderIo`]) apart from "reinsert the card"
//! ([`Error::CardRemoved`]) and from a cooperative stop ([`Error::TaskCancelled`]).

use crate::transport::TransportError;

/// Result alias using the core [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Native transport failure not attributable to card removal
    #[error("{context}: {source}")]
    ReaderIo {
        /// What was being attempted
        context: String,
        /// Native cause
        #[source]
        source: TransportError,
    },

    /// The card left the field while an operation was in flight
    #[error("{context}: card removed ({source})")]
    CardRemoved {
        /// What was being attempted
        context: String,
        /// Native cause
        #[source]
        source: TransportError,
    },

    /// A presence wait was stopped cooperatively
    #[error("{0}")]
    TaskCancelled(String),

    /// Operation invoked in an invalid state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// No identification rule is registered under this protocol name
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Neither identification filter matched the reader name
    #[error("Unable to determine the transmission mode for reader {0}")]
    AmbiguousTransmissionMode(String),

    /// The response chaining loop guard tripped
    #[error("Could not obtain response after {rounds} rounds")]
    ResponseChainTooLong {
        /// Number of physical transmits performed
        rounds: usize,
    },

    /// The command block cannot be sent as given
    #[error("Invalid command: {0}")]
    InvalidCommand(&'static str),

    /// Malformed rule, filter or configuration source
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Map a native transport failure, splitting card removal from other reader I/O errors
    pub fn from_transport<S: Into<String>>(context: S, source: TransportError) -> Self {
        if source.is_card_removed() {
            Self::CardRemoved {
                context: context.into(),
                source,
            }
        } else {
            Self::ReaderIo {
                context: context.into(),
                source,
            }
        }
    }

    /// Create a reader I/O error regardless of the native cause
    pub fn reader_io<S: Into<String>>(context: S, source: TransportError) -> Self {
        Self::ReaderIo {
            context: context.into(),
            source,
        }
    }

    /// Create an illegal state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState(message.into())
    }

    /// Prefix the context of a native failure, leaving the error kind untouched
    pub fn with_context(self, prefix: &str) -> Self {
        match self {
            Self::ReaderIo { context, source } => Self::ReaderIo {
                context: format!("{prefix}: {context}"),
                source,
            },
            Self::CardRemoved { context, source } => Self::CardRemoved {
                context: format!("{prefix}: {context}"),
                source,
            },
            other => other,
        }
    }

    /// Whether this error reports a cooperative cancellation
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::TaskCancelled(_))
    }

    /// Whether this error reports that the card was removed
    pub const fn is_card_removed(&self) -> bool {
        matches!(self, Self::CardRemoved { .. })
    }
}
