//! Reader slot boundary
//!
//! [`Terminal`] is everything a reader session needs from a native resource manager:
//! connect and disconnect, exclusive access, the ATR, presence queries and bounded
//! presence waits. [`crate::PcscTerminal`] implements it on top of PC/SC; tests
//! substitute scripted terminals.

use std::time::Duration;

use nexum_apdu_core::{Bytes, CardTransport, TransportError};

use crate::config::{DisconnectionMode, IsoProtocol, SharingMode};

/// CCID escape control code, `SCARD_CTL_CODE(3500)` under WinSCard
#[cfg(windows)]
pub const IOCTL_CCID_ESCAPE: u32 = (0x31 << 16) | (3500 << 2);

/// CCID escape control code, `SCARD_CTL_CODE(3500)` under pcsc-lite
#[cfg(not(windows))]
pub const IOCTL_CCID_ESCAPE: u32 = 0x4200_0000 + 3500;

/// One physical reader slot
///
/// Block transmission and the negotiated protocol come from [`CardTransport`].
pub trait Terminal: CardTransport {
    /// Reader name as reported by the resource manager
    fn name(&self) -> &str;

    /// Connect to the card in the slot
    fn connect(
        &mut self,
        sharing_mode: SharingMode,
        protocol: IsoProtocol,
    ) -> Result<(), TransportError>;

    /// Disconnect from the card, applying `mode`
    fn disconnect(&mut self, mode: DisconnectionMode) -> Result<(), TransportError>;

    /// Acquire exclusive access on the current connection
    fn begin_exclusive(&mut self) -> Result<(), TransportError>;

    /// Release exclusive access on the current connection
    fn end_exclusive(&mut self) -> Result<(), TransportError>;

    /// ATR of the connected card, empty when not connected
    fn atr(&self) -> &[u8];

    /// Whether a card is in the slot right now
    fn is_card_present(&mut self) -> Result<bool, TransportError>;

    /// Block up to `timeout` for a card to be present; `true` once it is
    fn wait_for_card_present(&mut self, timeout: Duration) -> Result<bool, TransportError>;

    /// Block up to `timeout` for the slot to be empty; `true` once it is
    fn wait_for_card_absent(&mut self, timeout: Duration) -> Result<bool, TransportError>;

    /// Send a reader control command
    fn control(&mut self, code: u32, command: &[u8]) -> Result<Bytes, TransportError> {
        let _ = (code, command);
        Err(TransportError::native("control commands are not supported"))
    }
}
