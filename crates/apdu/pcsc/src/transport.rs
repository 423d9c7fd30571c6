//! PC/SC terminal implementation

use std::{ffi::CString, fmt, time::Duration};

use nexum_apdu_core::prelude::*;
use pcsc::{Card, Context, Disposition, Protocol, ReaderState, Scope, ShareMode, State};
use tracing::{debug, trace, warn};

use crate::{
    config::{DisconnectionMode, IsoProtocol, SharingMode},
    error::transport_error,
    terminal::Terminal,
};

/// Reader slot driven through PC/SC
///
/// The resource manager context is established lazily by the first operation that needs
/// it and released when the card is disconnected.
pub struct PcscTerminal {
    /// Reader name
    name: String,
    /// Reader name as passed to the resource manager
    reader: CString,
    /// PC/SC context, if established
    context: Option<Context>,
    /// Card connection, if established
    card: Option<Card>,
    /// Protocol mask requested at connection time
    protocols: pcsc::Protocols,
    /// Negotiated protocol
    protocol: Option<LinkProtocol>,
    /// Whether the connection currently holds exclusive access
    exclusive: bool,
    /// ATR captured at connection time
    atr: Vec<u8>,
}

impl fmt::Debug for PcscTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTerminal")
            .field("name", &self.name)
            .field("has_context", &self.context.is_some())
            .field("has_card", &self.card.is_some())
            .field("protocol", &self.protocol)
            .field("exclusive", &self.exclusive)
            .field("atr", &hex::encode_upper(&self.atr))
            .finish()
    }
}

impl PcscTerminal {
    /// Create a terminal for the reader named `name`
    pub fn new(name: &str) -> Result<Self, TransportError> {
        let reader = CString::new(name)
            .map_err(|_| TransportError::native(format!("invalid reader name {name:?}")))?;
        Ok(Self {
            name: name.to_owned(),
            reader,
            context: None,
            card: None,
            protocols: pcsc::Protocols::ANY,
            protocol: None,
            exclusive: false,
            atr: Vec::new(),
        })
    }

    fn establish_context(&mut self) -> Result<&Context, TransportError> {
        if self.context.is_none() {
            trace!(reader = %self.name, "establishing PC/SC context");
            self.context = Some(Context::establish(Scope::User).map_err(transport_error)?);
        }
        self.context.as_ref().ok_or(TransportError::NotConnected)
    }

    fn release_context(&mut self) {
        if let Some(context) = self.context.take() {
            if let Err((_, e)) = context.release() {
                debug!(reader = %self.name, error = %e, "failed to release PC/SC context");
            }
        }
    }

    fn card(&self) -> Result<&Card, TransportError> {
        self.card.as_ref().ok_or(TransportError::NotConnected)
    }

    fn reconnect(&mut self, exclusive: bool) -> Result<(), TransportError> {
        let mode = if exclusive {
            ShareMode::Exclusive
        } else {
            ShareMode::Shared
        };
        let protocols = self.protocols;
        let card = self.card.as_mut().ok_or(TransportError::NotConnected)?;
        card.reconnect(mode, protocols, Disposition::LeaveCard)
            .map_err(transport_error)?;
        let status = card.status2_owned().map_err(transport_error)?;
        self.exclusive = exclusive;
        self.apply_status(status.atr(), status.protocol2());
        trace!(reader = %self.name, protocol = ?self.protocol, exclusive, "card reconnected");
        Ok(())
    }

    /// Record the ATR and negotiated protocol reported by the resource manager
    fn apply_status(&mut self, atr: &[u8], protocol: Option<Protocol>) {
        self.atr = atr.to_vec();
        self.protocol = protocol.map(link_protocol);
    }

    /// Query the slot state, then block up to `timeout` until `present` holds
    fn wait_for(&mut self, present: bool, timeout: Duration) -> Result<bool, TransportError> {
        let reader = self.reader.clone();
        let context = self.establish_context()?;
        let mut states = [ReaderState::new(reader, State::UNAWARE)];

        match context.get_status_change(Some(Duration::ZERO), &mut states) {
            Ok(()) | Err(pcsc::Error::Timeout) => {}
            Err(e) => return Err(transport_error(e)),
        }
        if card_present(&states[0]) == present {
            return Ok(true);
        }

        states[0].sync_current_state();
        match context.get_status_change(Some(timeout), &mut states) {
            Ok(()) => Ok(card_present(&states[0]) == present),
            Err(pcsc::Error::Timeout) => Ok(false),
            Err(e) => Err(transport_error(e)),
        }
    }
}

fn card_present(state: &ReaderState) -> bool {
    let events = state.event_state();
    events.contains(State::PRESENT) && !events.contains(State::EMPTY)
}

const fn link_protocol(protocol: Protocol) -> LinkProtocol {
    match protocol {
        Protocol::T0 => LinkProtocol::T0,
        Protocol::T1 => LinkProtocol::T1,
        _ => LinkProtocol::Raw,
    }
}

impl CardTransport for PcscTerminal {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        let card = self.card()?;
        let mut buffer = vec![0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];
        let response = card.transmit(command, &mut buffer).map_err(transport_error)?;
        Ok(Bytes::copy_from_slice(response))
    }

    fn protocol(&self) -> Option<LinkProtocol> {
        self.protocol
    }
}

impl Terminal for PcscTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(
        &mut self,
        sharing_mode: SharingMode,
        protocol: IsoProtocol,
    ) -> Result<(), TransportError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader = self.reader.clone();
        let protocols = protocol.protocols();
        let context = self.establish_context()?;
        let card = match context.connect(&reader, sharing_mode.into(), protocols) {
            Ok(card) => card,
            Err(e) => {
                self.release_context();
                return Err(transport_error(e));
            }
        };

        let status = match card.status2_owned() {
            Ok(status) => status,
            Err(e) => {
                let _ = card.disconnect(Disposition::LeaveCard);
                self.release_context();
                return Err(transport_error(e));
            }
        };

        self.apply_status(status.atr(), status.protocol2());
        self.protocols = protocols;
        self.exclusive = sharing_mode == SharingMode::Exclusive;
        self.card = Some(card);

        debug!(
            reader = %self.name,
            atr = %hex::encode_upper(&self.atr),
            protocol = ?self.protocol,
            "card connected"
        );
        Ok(())
    }

    fn disconnect(&mut self, mode: DisconnectionMode) -> Result<(), TransportError> {
        let result = match self.card.take() {
            Some(card) => card.disconnect(mode.into()).map_err(|(_, e)| transport_error(e)),
            None => Ok(()),
        };

        self.protocol = None;
        self.exclusive = false;
        self.atr.clear();
        self.release_context();

        if let Err(e) = &result {
            warn!(reader = %self.name, error = %e, "disconnect failed");
        }
        result
    }

    fn begin_exclusive(&mut self) -> Result<(), TransportError> {
        if self.exclusive {
            return Ok(());
        }
        self.reconnect(true)
    }

    fn end_exclusive(&mut self) -> Result<(), TransportError> {
        if !self.exclusive {
            return Ok(());
        }
        self.reconnect(false)
    }

    fn atr(&self) -> &[u8] {
        &self.atr
    }

    fn is_card_present(&mut self) -> Result<bool, TransportError> {
        let reader = self.reader.clone();
        let context = self.establish_context()?;
        let mut states = [ReaderState::new(reader, State::UNAWARE)];
        match context.get_status_change(Some(Duration::ZERO), &mut states) {
            Ok(()) | Err(pcsc::Error::Timeout) => Ok(card_present(&states[0])),
            Err(e) => Err(transport_error(e)),
        }
    }

    fn wait_for_card_present(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.wait_for(true, timeout)
    }

    fn wait_for_card_absent(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.wait_for(false, timeout)
    }

    fn control(&mut self, code: u32, command: &[u8]) -> Result<Bytes, TransportError> {
        let card = self.card()?;
        let mut buffer = vec![0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];
        let response = card
            .control(code as _, command, &mut buffer)
            .map_err(transport_error)?;
        Ok(Bytes::copy_from_slice(response))
    }
}

impl Drop for PcscTerminal {
    fn drop(&mut self) {
        // Leave the card as it is
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
        self.release_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_replaces_previous_negotiation() {
        let mut terminal = PcscTerminal::new("ACS ACR122U PICC Interface 00 00").unwrap();
        assert_eq!(terminal.protocol(), None);

        terminal.apply_status(&[0x3B, 0x81, 0x80, 0x01, 0x80, 0x80], Some(Protocol::T0));
        assert_eq!(terminal.protocol(), Some(LinkProtocol::T0));

        terminal.apply_status(&[0x3B, 0x8B, 0x80, 0x01], Some(Protocol::T1));
        assert_eq!(terminal.protocol(), Some(LinkProtocol::T1));
        assert_eq!(terminal.atr(), &[0x3B, 0x8B, 0x80, 0x01]);
    }

    #[test]
    fn test_invalid_reader_name() {
        assert!(PcscTerminal::new("bad\0name").is_err());
    }
}
