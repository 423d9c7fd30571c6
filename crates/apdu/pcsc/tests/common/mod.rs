//! Scripted terminals and slot providers for integration tests
#![allow(dead_code)]

use std::{collections::VecDeque, sync::Arc, thread, time::Duration};

use crossbeam_channel::Sender;
use nexum_apdu_core::{Bytes, CardTransport, LinkProtocol, TransportError};
use nexum_apdu_transport_pcsc::{
    DisconnectionMode, IsoProtocol, PcscPluginBuilder, Plugin, ReaderConfig, ReaderIdentification,
    ReaderSession, SharingMode, SlotProvider, Terminal,
};

pub const CONTACT_READER: &str = "Identiv uTrust 3700 F CL Reader 00 00";
pub const CONTACTLESS_READER: &str = "ACS ACR122U PICC Interface 00 00";
pub const DESFIRE_ATR: &str = "3B8180018080";

/// Decode a spaced hex string
pub fn bytes(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).unwrap()
}

/// Terminal replaying scripted responses and presence answers
#[derive(Debug)]
pub struct ScriptedTerminal {
    pub name: String,
    pub atr: Vec<u8>,
    pub link: LinkProtocol,
    pub connected: bool,
    pub exclusive: bool,
    pub connects: Vec<(SharingMode, IsoProtocol)>,
    pub disconnects: Vec<DisconnectionMode>,
    pub commands: Vec<Bytes>,
    pub responses: VecDeque<Result<Bytes, TransportError>>,
    /// Answers of the bounded presence waits; when exhausted, waits time out
    pub presence: VecDeque<Result<bool, TransportError>>,
    /// Notified at the start of every presence wait
    pub wait_started: Option<Sender<()>>,
    pub connect_error: Option<TransportError>,
}

impl ScriptedTerminal {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            atr: bytes(DESFIRE_ATR),
            link: LinkProtocol::T1,
            connected: false,
            exclusive: false,
            connects: Vec::new(),
            disconnects: Vec::new(),
            commands: Vec::new(),
            responses: VecDeque::new(),
            presence: VecDeque::new(),
            wait_started: None,
            connect_error: None,
        }
    }

    pub fn with_link(mut self, link: LinkProtocol) -> Self {
        self.link = link;
        self
    }

    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses = responses
            .iter()
            .map(|r| Ok(Bytes::from(bytes(r))))
            .collect();
        self
    }

    pub fn with_presence(mut self, presence: &[bool]) -> Self {
        self.presence = presence.iter().map(|p| Ok(*p)).collect();
        self
    }

    fn wait(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        if let Some(started) = &self.wait_started {
            let _ = started.try_send(());
        }
        match self.presence.pop_front() {
            Some(answer) => answer,
            None => {
                thread::sleep(timeout);
                Ok(false)
            }
        }
    }
}

impl CardTransport for ScriptedTerminal {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::native("no scripted response")))
    }

    fn protocol(&self) -> Option<LinkProtocol> {
        self.connected.then_some(self.link)
    }
}

impl Terminal for ScriptedTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(
        &mut self,
        sharing_mode: SharingMode,
        protocol: IsoProtocol,
    ) -> Result<(), TransportError> {
        if let Some(e) = self.connect_error.clone() {
            return Err(e);
        }
        self.connects.push((sharing_mode, protocol));
        self.connected = true;
        self.exclusive = sharing_mode == SharingMode::Exclusive;
        Ok(())
    }

    fn disconnect(&mut self, mode: DisconnectionMode) -> Result<(), TransportError> {
        self.disconnects.push(mode);
        self.connected = false;
        self.exclusive = false;
        Ok(())
    }

    fn begin_exclusive(&mut self) -> Result<(), TransportError> {
        self.exclusive = true;
        Ok(())
    }

    fn end_exclusive(&mut self) -> Result<(), TransportError> {
        self.exclusive = false;
        Ok(())
    }

    fn atr(&self) -> &[u8] {
        if self.connected { self.atr.as_slice() } else { &[] }
    }

    fn is_card_present(&mut self) -> Result<bool, TransportError> {
        Ok(self.connected || !self.atr.is_empty())
    }

    fn wait_for_card_present(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.wait(timeout)
    }

    fn wait_for_card_absent(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.wait(timeout)
    }

    fn control(&mut self, code: u32, command: &[u8]) -> Result<Bytes, TransportError> {
        let mut echo = code.to_be_bytes().to_vec();
        echo.extend_from_slice(command);
        Ok(Bytes::from(echo))
    }
}

/// Slot provider over a fixed list of scripted readers
#[derive(Debug, Default)]
pub struct ScriptedSlots {
    pub names: Vec<String>,
}

impl ScriptedSlots {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| (*n).to_owned()).collect(),
        }
    }
}

impl SlotProvider for ScriptedSlots {
    type Terminal = ScriptedTerminal;

    fn list_slots(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.names.clone())
    }

    fn terminal(&self, name: &str) -> Result<Self::Terminal, TransportError> {
        Ok(ScriptedTerminal::new(name))
    }
}

/// Plugin over scripted readers with filters telling the two test readers apart
pub fn scripted_plugin(names: &[&str]) -> Plugin<ScriptedSlots> {
    PcscPluginBuilder::new()
        .use_contact_reader_identification_filter(".*Identiv.*")
        .use_contactless_reader_identification_filter(".*(ACR122|PICC).*")
        .build_with_provider(ScriptedSlots::new(names))
        .unwrap()
}

/// Session on `terminal` sharing the identification of a scripted plugin
pub fn session(terminal: ScriptedTerminal) -> ReaderSession<ScriptedTerminal> {
    session_with_config(terminal, ReaderConfig::default())
}

pub fn session_with_config(
    terminal: ScriptedTerminal,
    config: ReaderConfig,
) -> ReaderSession<ScriptedTerminal> {
    let identification: Arc<ReaderIdentification> =
        Arc::clone(scripted_plugin(&[]).identification());
    ReaderSession::new(terminal, identification, config)
}
