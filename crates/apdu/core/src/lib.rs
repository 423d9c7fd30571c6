//! Core traits and types for exchanging APDUs with smart-card readers
//!
//! This crate provides the transport-agnostic half of the reader session engine:
//!
//! - the error taxonomy shared by every reader operation
//! - the raw [`CardTransport`] boundary (block transmit plus negotiated link protocol)
//! - status-word helpers following ISO/IEC 7816-4
//! - the [`ApduTransceiver`], which hides `61xx` response chaining and `6Cxx`
//!   short-length resubmission behind a single logical `transmit`
//!
//! Native resource managers (PC/SC and friends) live in separate crates and only
//! implement [`CardTransport`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod error;
pub mod response;
pub mod transceiver;
pub mod transport;

pub use error::{Error, Result};
pub use response::status::StatusWord;
pub use transceiver::{ApduTransceiver, MAX_ROUNDS};
pub use transport::{CardTransport, LinkProtocol, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        ApduTransceiver, Bytes, BytesMut, CardTransport, Error, LinkProtocol, Result, StatusWord,
        TransportError,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let sw = StatusWord::from_response(&[0xAA, 0x61, 0x10]).unwrap();
        assert!(sw.is_more_data_available());
        assert_eq!(sw.sw2, 0x10);

        let transceiver = ApduTransceiver::default();
        assert_eq!(transceiver.max_rounds(), MAX_ROUNDS);
    }
}
