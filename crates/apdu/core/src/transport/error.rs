//! Error types specific to card transport

use thiserror::Error;

/// Failure reported by the native resource manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The card was removed from the reader
    #[error("Card was removed")]
    CardRemoved,

    /// The card was reset by another application
    #[error("Card was reset")]
    CardReset,

    /// No card present in the reader
    #[error("No card present")]
    NoCard,

    /// No readers are attached to the system
    #[error("No readers available")]
    NoReadersAvailable,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// No connection exists for this operation
    #[error("Not connected")]
    NotConnected,

    /// Any other native failure, with its description
    #[error("{0}")]
    Native(String),
}

impl TransportError {
    /// Create a native error from a message
    pub fn native<S: Into<String>>(message: S) -> Self {
        Self::Native(message.into())
    }

    /// Whether this failure means the card physically left the reader
    pub const fn is_card_removed(&self) -> bool {
        matches!(self, Self::CardRemoved)
    }
}
