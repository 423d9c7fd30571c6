//! Reader session: one terminal plus its channel state and configuration

use std::{fmt, sync::Arc};

use nexum_apdu_core::{ApduTransceiver, Bytes, Error, Result};
use tracing::{debug, trace, warn};

use crate::{
    capability::{ChannelLifecycle, PresencePoller, ProtocolClassifier, Transceiver},
    classifier::TransmissionMode,
    config::{DisconnectionMode, IsoProtocol, ReaderConfig, SharingMode},
    identification::ReaderIdentification,
    poller::{CardPresencePoller, PollCanceller, PresenceCondition},
    terminal::Terminal,
    util::atr_to_hex,
};

/// State of the physical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No connection (initial state)
    #[default]
    Closed,
    /// Connection in progress
    Opening,
    /// Connected, commands may be exchanged
    Open,
    /// Disconnection in progress
    Closing,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// A reader managed by a plugin
///
/// Channel and transmit operations are issued from one controlling thread. The presence
/// waits may run on a worker thread and are stopped through the handles returned by
/// [`ReaderSession::insertion_canceller`] and [`ReaderSession::removal_canceller`].
#[derive(Debug)]
pub struct ReaderSession<T> {
    terminal: T,
    identification: Arc<ReaderIdentification>,
    config: ReaderConfig,
    transceiver: ApduTransceiver,
    state: ChannelState,
    /// Contactless flag, `None` until set explicitly or classified from the name
    contactless: Option<bool>,
    insertion: CardPresencePoller,
    removal: CardPresencePoller,
}

impl<T: Terminal> ReaderSession<T> {
    /// Create a closed session on `terminal`
    pub fn new(
        terminal: T,
        identification: Arc<ReaderIdentification>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            terminal,
            identification,
            transceiver: config.transceiver(),
            config,
            state: ChannelState::Closed,
            contactless: None,
            insertion: CardPresencePoller::new(PresenceCondition::Present),
            removal: CardPresencePoller::new(PresenceCondition::Absent),
        }
    }

    /// Reader name
    pub fn name(&self) -> &str {
        self.terminal.name()
    }

    /// Underlying terminal
    pub const fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Current configuration
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Current channel state
    pub const fn channel_state(&self) -> ChannelState {
        self.state
    }

    /// Set the sharing mode
    ///
    /// Switching to [`SharingMode::Shared`] while the channel is open releases exclusive
    /// access immediately; otherwise the mode applies to the next [`ChannelLifecycle::open`].
    pub fn set_sharing_mode(&mut self, mode: SharingMode) -> Result<&mut Self> {
        trace!(reader = self.name(), ?mode, "set sharing mode");
        if mode == SharingMode::Shared && self.state == ChannelState::Open {
            self.terminal.end_exclusive().map_err(|e| {
                Error::illegal_state(format!(
                    "{}: couldn't disable exclusive mode: {e}",
                    self.name()
                ))
            })?;
        }
        self.config.sharing_mode = mode;
        Ok(self)
    }

    /// Set the protocol requested by the next [`ChannelLifecycle::open`]
    pub fn set_iso_protocol(&mut self, protocol: IsoProtocol) -> &mut Self {
        trace!(reader = self.name(), protocol = protocol.value(), "set ISO protocol");
        self.config.iso_protocol = protocol;
        self
    }

    /// Set the card disposition applied by [`ChannelLifecycle::close`]
    pub fn set_disconnection_mode(&mut self, mode: DisconnectionMode) -> &mut Self {
        trace!(reader = self.name(), ?mode, "set disconnection mode");
        self.config.disconnection_mode = mode;
        self
    }

    /// Declare the transmission mode explicitly, bypassing name classification
    pub fn set_contactless(&mut self, contactless: bool) -> &mut Self {
        trace!(reader = self.name(), contactless, "set contactless type");
        self.contactless = Some(contactless);
        self
    }

    /// Handle stopping a running insertion wait from another thread
    pub fn insertion_canceller(&self) -> PollCanceller {
        self.insertion.canceller()
    }

    /// Handle stopping a running removal wait from another thread
    pub fn removal_canceller(&self) -> PollCanceller {
        self.removal.canceller()
    }

    /// Send a reader control command, e.g. with [`crate::IOCTL_CCID_ESCAPE`]
    pub fn transmit_control_command(&mut self, code: u32, command: &[u8]) -> Result<Bytes> {
        trace!(reader = self.name(), code, command = %hex::encode_upper(command), "control >>");
        let response = self.terminal.control(code, command).map_err(|e| {
            Error::from_transport(format!("{}: control command failed", self.name()), e)
        })?;
        trace!(reader = self.name(), response = %hex::encode_upper(&response), "control <<");
        Ok(response)
    }
}

impl<T: Terminal> ChannelLifecycle for ReaderSession<T> {
    fn open(&mut self) -> Result<()> {
        if self.state == ChannelState::Open {
            return Ok(());
        }

        self.state = ChannelState::Opening;
        debug!(
            reader = self.name(),
            protocol = self.config.iso_protocol.value(),
            mode = ?self.config.sharing_mode,
            "opening of a card physical channel"
        );

        let connected = self
            .terminal
            .connect(self.config.sharing_mode, self.config.iso_protocol);
        let result = match connected {
            Ok(()) if self.config.sharing_mode == SharingMode::Exclusive => {
                self.terminal.begin_exclusive().inspect_err(|_| {
                    let _ = self.terminal.disconnect(DisconnectionMode::Leave);
                })
            }
            other => other,
        };

        match result {
            Ok(()) => {
                self.state = ChannelState::Open;
                debug!(
                    reader = self.name(),
                    atr = %self.power_on_data(),
                    "card physical channel opened"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ChannelState::Closed;
                Err(Error::reader_io(
                    format!("{}: error while opening physical channel", self.name()),
                    e,
                ))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.state != ChannelState::Open {
            trace!(reader = self.name(), "physical channel already closed");
            return Ok(());
        }

        self.state = ChannelState::Closing;
        debug!(
            reader = self.name(),
            mode = ?self.config.disconnection_mode,
            "closing of the card physical channel"
        );
        let result = self.terminal.disconnect(self.config.disconnection_mode);
        self.state = ChannelState::Closed;

        result.map_err(|e| {
            warn!(reader = self.name(), error = %e, "error while closing physical channel");
            Error::reader_io(
                format!("{}: error while closing physical channel", self.name()),
                e,
            )
        })
    }

    fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    fn check_card_presence(&mut self) -> Result<bool> {
        self.terminal.is_card_present().map_err(|e| {
            Error::reader_io(
                format!("{}: exception occurred in card presence check", self.name()),
                e,
            )
        })
    }

    fn power_on_data(&self) -> String {
        atr_to_hex(self.terminal.atr())
    }
}

impl<T: Terminal> Transceiver for ReaderSession<T> {
    fn transmit_apdu(&mut self, command: &[u8]) -> Result<Bytes> {
        if self.state != ChannelState::Open {
            return Err(Error::illegal_state(format!("{}: no channel", self.name())));
        }

        self.transceiver
            .transmit(&mut self.terminal, command)
            .map_err(|e| e.with_context(self.terminal.name()))
    }
}

impl<T: Terminal> PresencePoller for ReaderSession<T> {
    fn wait_for_card_insertion(&mut self) -> Result<()> {
        let terminal = &mut self.terminal;
        let name = terminal.name().to_owned();
        self.insertion
            .run(&name, |timeout| terminal.wait_for_card_present(timeout))
    }

    fn stop_wait_for_card_insertion(&self) {
        trace!(reader = self.name(), "stop waiting for card insertion requested");
        self.insertion.cancel();
    }

    fn wait_for_card_removal(&mut self) -> Result<()> {
        let terminal = &mut self.terminal;
        let name = terminal.name().to_owned();
        self.removal
            .run(&name, |timeout| terminal.wait_for_card_absent(timeout))
    }

    fn stop_wait_for_card_removal(&self) {
        trace!(reader = self.name(), "stop waiting for card removal requested");
        self.removal.cancel();
    }
}

impl<T: Terminal> ProtocolClassifier for ReaderSession<T> {
    fn is_protocol_supported(&self, protocol: &str) -> bool {
        self.identification.rules().contains(protocol)
    }

    fn activate_protocol(&mut self, protocol: &str) {
        trace!(reader = self.name(), protocol, "activating protocol, nothing to do");
    }

    fn deactivate_protocol(&mut self, protocol: &str) {
        trace!(reader = self.name(), protocol, "deactivating protocol, nothing to do");
    }

    fn is_current_protocol(&self, protocol: &str) -> bool {
        let Ok(rule) = self.identification.protocol_rule(protocol) else {
            return false;
        };
        let matched = rule.matches(&self.power_on_data());
        trace!(reader = self.name(), protocol, matched, "protocol check");
        matched
    }

    fn is_contactless(&mut self) -> Result<bool> {
        if let Some(contactless) = self.contactless {
            return Ok(contactless);
        }
        let contactless = self.identification.transmission_mode(self.terminal.name())?
            == TransmissionMode::Contactless;
        self.contactless = Some(contactless);
        Ok(contactless)
    }
}
