//! Status word definitions for APDU responses

use std::fmt;

/// SW1 announcing that more response bytes can be fetched with GET RESPONSE
pub const SW1_MORE_DATA: u8 = 0x61;

/// SW1 announcing a wrong expected length, SW2 carrying the right one
pub const SW1_WRONG_LENGTH: u8 = 0x6C;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Read the trailing status word of a response, `None` if it is shorter than two bytes
    pub fn from_response(response: &[u8]) -> Option<Self> {
        match response {
            [.., sw1, sw2] => Some(Self::new(*sw1, *sw2)),
            _ => None,
        }
    }

    /// Check if this status word indicates more data is available (61 XX)
    pub const fn is_more_data_available(&self) -> bool {
        self.sw1 == SW1_MORE_DATA
    }

    /// Check if this status word reports a wrong expected length (6C XX)
    pub const fn is_wrong_length(&self) -> bool {
        self.sw1 == SW1_WRONG_LENGTH
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}
