//! Transport traits for APDU communication with cards
//!
//! A transport is the raw block-transmit primitive of a native resource manager.
//! It has no knowledge of command structure or response chaining; that is the job of
//! the [`ApduTransceiver`](crate::ApduTransceiver).

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Low-level transmission protocol negotiated with the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkProtocol {
    /// Byte-oriented T=0
    T0,
    /// Block-oriented T=1
    T1,
    /// Raw transfer, no ISO 7816-3 framing
    Raw,
}

impl fmt::Display for LinkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T0 => write!(f, "T=0"),
            Self::T1 => write!(f, "T=1"),
            Self::Raw => write!(f, "RAW"),
        }
    }
}

/// Trait for basic card transports
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to the card and return the response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode_upper(command), "c-apdu >>");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "r-apdu <<");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Protocol negotiated on the live connection, `None` when not connected
    fn protocol(&self) -> Option<LinkProtocol>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool {
        self.protocol().is_some()
    }
}

#[cfg(test)]
pub(crate) use mock::MockTransport;
