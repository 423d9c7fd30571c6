//! Command/response exchange with automatic response chaining
//!
//! The transceiver turns one logical C-APDU into as many physical exchanges as the card
//! requires and hands back a single R-APDU:
//!
//! - `6Cxx`: the expected length was wrong, the command is resent with `Le = xx`
//! - `61xx`: more data is waiting, a GET RESPONSE with `Le = xx` fetches it and the
//!   data parts are concatenated
//!
//! The number of physical exchanges is bounded by [`MAX_ROUNDS`].

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::response::status::StatusWord;
use crate::transport::{CardTransport, LinkProtocol};

/// Upper bound of physical exchanges for one logical transmit
pub const MAX_ROUNDS: usize = 32;

/// Instruction byte of GET RESPONSE
const INS_GET_RESPONSE: u8 = 0xC0;

/// Offset of the first length byte (Lc or Le) in a command
const LENGTH_OFFSET: usize = 4;

/// Smallest command that can carry both a length field and a trailing Le
const MIN_LENGTH_WITH_LE: usize = 7;

/// APDU transceiver performing case normalization and response chaining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduTransceiver {
    t0_get_response: bool,
    t1_get_response: bool,
    t1_strip_le: bool,
    max_rounds: usize,
}

impl Default for ApduTransceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ApduTransceiver {
    /// Create a transceiver with chaining enabled for T=0 and T=1
    pub const fn new() -> Self {
        Self {
            t0_get_response: true,
            t1_get_response: true,
            t1_strip_le: true,
            max_rounds: MAX_ROUNDS,
        }
    }

    /// Enable or disable automatic GET RESPONSE under T=0
    pub const fn with_t0_get_response(mut self, enabled: bool) -> Self {
        self.t0_get_response = enabled;
        self
    }

    /// Enable or disable automatic GET RESPONSE under T=1
    pub const fn with_t1_get_response(mut self, enabled: bool) -> Self {
        self.t1_get_response = enabled;
        self
    }

    /// Enable or disable removal of a trailing Le under T=1
    pub const fn with_t1_strip_le(mut self, enabled: bool) -> Self {
        self.t1_strip_le = enabled;
        self
    }

    /// Maximum number of physical exchanges per logical transmit
    pub const fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    const fn chaining_enabled(&self, protocol: LinkProtocol) -> bool {
        match protocol {
            LinkProtocol::T0 => self.t0_get_response,
            LinkProtocol::T1 => self.t1_get_response,
            LinkProtocol::Raw => false,
        }
    }

    const fn strips_le(&self, protocol: LinkProtocol) -> bool {
        match protocol {
            LinkProtocol::T0 => true,
            LinkProtocol::T1 => self.t1_strip_le,
            LinkProtocol::Raw => false,
        }
    }

    /// Exchange one command block with the card and return the complete response
    pub fn transmit<T>(&self, transport: &mut T, command: &[u8]) -> Result<Bytes>
    where
        T: CardTransport + ?Sized,
    {
        if command.is_empty() {
            return Err(Error::InvalidCommand("command cannot be empty"));
        }

        let protocol = transport
            .protocol()
            .ok_or_else(|| Error::illegal_state("no channel"))?;

        let (mut apdu, mut stripped) = self.normalize(protocol, command)?;
        let chaining = self.chaining_enabled(protocol);
        let mut result = BytesMut::new();
        let mut rounds = 0;

        loop {
            if rounds == self.max_rounds {
                debug!(rounds, "response chain exceeded the round limit");
                return Err(Error::ResponseChainTooLong { rounds });
            }
            rounds += 1;

            let response = transport
                .transmit_raw(&apdu)
                .map_err(|e| Error::from_transport("transmit failed", e))?;

            // See ISO 7816-4 (2005), 5.1.3
            if let &[sw1, sw2] = &response[..] {
                if StatusWord::new(sw1, sw2).is_wrong_length() {
                    trace!(le = sw2, "wrong length, resending with corrected Le");
                    match stripped {
                        0 => {
                            if let Some(le) = apdu.last_mut() {
                                *le = sw2;
                            }
                        }
                        1 => apdu.push(sw2),
                        _ => apdu.extend_from_slice(&[0x00, sw2]),
                    }
                    stripped = 0;
                    continue;
                }
            }

            match StatusWord::from_response(&response) {
                Some(sw) if chaining && sw.is_more_data_available() => {
                    result.extend_from_slice(&response[..response.len() - 2]);
                    trace!(le = sw.sw2, "more data available, issuing GET RESPONSE");
                    apdu = vec![apdu[0], INS_GET_RESPONSE, 0x00, 0x00, sw.sw2];
                    stripped = 0;
                }
                _ => {
                    result.extend_from_slice(&response);
                    return Ok(result.freeze());
                }
            }
        }
    }

    /// Reject unsupported cases and drop a trailing Le where the protocol wants it gone
    ///
    /// Returns the command to send and the number of Le bytes removed from it.
    fn normalize(&self, protocol: LinkProtocol, command: &[u8]) -> Result<(Vec<u8>, usize)> {
        let n = command.len();

        if protocol == LinkProtocol::T0 && n >= MIN_LENGTH_WITH_LE && command[LENGTH_OFFSET] == 0
        {
            return Err(Error::InvalidCommand("extended length not supported for T=0"));
        }

        let mut length = n;
        if self.strips_le(protocol) && n >= MIN_LENGTH_WITH_LE {
            let lc = command[LENGTH_OFFSET] as usize;
            if lc != 0 {
                if n == lc + 6 {
                    length -= 1;
                }
            } else {
                let lc = ((command[5] as usize) << 8) | command[6] as usize;
                if n == lc + 9 {
                    length -= 2;
                }
            }
        }

        Ok((command[..length].to_vec(), n - length))
    }
}
