//! Reader session behaviour against scripted terminals

mod common;

use common::{CONTACTLESS_READER, DESFIRE_ATR, ScriptedTerminal, bytes, session};
use nexum_apdu_core::{Error, LinkProtocol, MAX_ROUNDS, TransportError};
use nexum_apdu_transport_pcsc::{
    ChannelLifecycle, ChannelState, DisconnectionMode, IOCTL_CCID_ESCAPE, IsoProtocol,
    ProtocolClassifier, ReaderConfig, SharingMode, Transceiver,
};

#[test]
fn test_open_connects_once_with_configured_modes() {
    let mut reader = session(ScriptedTerminal::new(CONTACTLESS_READER));
    reader
        .set_iso_protocol(IsoProtocol::Tcl)
        .set_disconnection_mode(DisconnectionMode::Reset);

    reader.open().unwrap();
    reader.open().unwrap();
    assert_eq!(reader.channel_state(), ChannelState::Open);
    assert_eq!(
        reader.terminal().connects,
        vec![(SharingMode::Exclusive, IsoProtocol::Tcl)]
    );
    assert!(reader.terminal().exclusive);

    reader.close().unwrap();
    reader.close().unwrap();
    assert!(!reader.is_open());
    assert_eq!(reader.terminal().disconnects, vec![DisconnectionMode::Reset]);
}

#[test]
fn test_open_failure_carries_native_cause() {
    let mut terminal = ScriptedTerminal::new(CONTACTLESS_READER);
    terminal.connect_error = Some(TransportError::NoCard);
    let mut reader = session(terminal);

    match reader.open().unwrap_err() {
        Error::ReaderIo { source, .. } => assert_eq!(source, TransportError::NoCard),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(reader.channel_state(), ChannelState::Closed);
}

#[test]
fn test_shared_mode_skips_exclusive_access() {
    let mut reader = session(ScriptedTerminal::new(CONTACTLESS_READER));
    reader.set_sharing_mode(SharingMode::Shared).unwrap();
    reader.open().unwrap();
    assert!(!reader.terminal().exclusive);

    reader.set_sharing_mode(SharingMode::Exclusive).unwrap();
    assert!(!reader.terminal().exclusive);
}

#[test]
fn test_transmit_with_chaining() {
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER)
        .with_link(LinkProtocol::T0)
        .with_responses(&["61 02", "AA BB 90 00"]);
    let mut reader = session(terminal);
    reader.open().unwrap();

    let response = reader.transmit_apdu(&bytes("00 B0 00 00 05")).unwrap();
    assert_eq!(response.as_ref(), bytes("AA BB 90 00"));
    assert_eq!(
        reader.terminal().commands,
        vec![bytes("00 B0 00 00 05"), bytes("00 C0 00 00 02")]
    );
}

#[test]
fn test_transmit_wrong_length_resend() {
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER)
        .with_link(LinkProtocol::T1)
        .with_responses(&["6C 08", "01 02 03 04 05 06 07 08 90 00"]);
    let mut reader = session(terminal);
    reader.open().unwrap();

    let response = reader.transmit_apdu(&bytes("00 B0 00 00 04")).unwrap();
    assert_eq!(response.len(), 10);
    assert_eq!(reader.terminal().commands[1].as_ref(), bytes("00 B0 00 00 08"));
}

#[test]
fn test_transmit_round_limit() {
    let responses = vec!["61 01"; MAX_ROUNDS + 5];
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER).with_responses(&responses);
    let mut reader = session(terminal);
    reader.open().unwrap();

    let err = reader.transmit_apdu(&bytes("00 B0 00 00 01")).unwrap_err();
    assert_eq!(err, Error::ResponseChainTooLong { rounds: MAX_ROUNDS });
    assert_eq!(reader.terminal().commands.len(), MAX_ROUNDS);
}

#[test]
fn test_transmit_chaining_disabled_by_config() {
    let config = ReaderConfig {
        t1_get_response: false,
        ..ReaderConfig::default()
    };
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER).with_responses(&["61 10"]);
    let mut reader = common::session_with_config(terminal, config);
    reader.open().unwrap();

    let response = reader.transmit_apdu(&bytes("00 B0 00 00 10")).unwrap();
    assert_eq!(response.as_ref(), bytes("61 10"));
}

#[test]
fn test_transmit_card_removed() {
    let mut terminal = ScriptedTerminal::new(CONTACTLESS_READER);
    terminal.responses.push_back(Err(TransportError::CardRemoved));
    let mut reader = session(terminal);
    reader.open().unwrap();

    let err = reader.transmit_apdu(&bytes("00 A4 04 00 00")).unwrap_err();
    assert!(err.is_card_removed());
}

#[test]
fn test_transmit_after_close_is_illegal() {
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER).with_responses(&["90 00"]);
    let mut reader = session(terminal);
    reader.open().unwrap();
    reader.close().unwrap();

    assert!(matches!(
        reader.transmit_apdu(&bytes("00 A4 04 00 00")),
        Err(Error::IllegalState(_))
    ));
    assert!(reader.terminal().commands.is_empty());
}

#[test]
fn test_protocol_identification() {
    let mut reader = session(ScriptedTerminal::new(CONTACTLESS_READER));
    assert_eq!(reader.power_on_data(), "");

    reader.open().unwrap();
    assert_eq!(reader.power_on_data(), DESFIRE_ATR);
    assert!(reader.is_current_protocol("MIFARE_DESFIRE"));
    assert!(reader.is_current_protocol("ISO_7816_3"));
    assert!(!reader.is_current_protocol("MIFARE_ULTRA_LIGHT"));
    assert!(!reader.is_current_protocol("CALYPSO"));

    reader.activate_protocol("MIFARE_DESFIRE");
    reader.deactivate_protocol("MIFARE_DESFIRE");
    assert!(reader.is_protocol_supported("MIFARE_DESFIRE"));
}

#[test]
fn test_contactless_classification_is_cached() {
    let mut reader = session(ScriptedTerminal::new(CONTACTLESS_READER));
    assert!(reader.is_contactless().unwrap());
    assert!(reader.is_contactless().unwrap());

    let mut unknown = session(ScriptedTerminal::new("Yubico YubiKey CCID"));
    assert!(matches!(
        unknown.is_contactless(),
        Err(Error::AmbiguousTransmissionMode(_))
    ));
    unknown.set_contactless(true);
    assert!(unknown.is_contactless().unwrap());
}

#[test]
fn test_control_command() {
    let mut reader = session(ScriptedTerminal::new(CONTACTLESS_READER));
    let response = reader
        .transmit_control_command(IOCTL_CCID_ESCAPE, &[0xFF, 0x00])
        .unwrap();

    assert_eq!(&response[..4], IOCTL_CCID_ESCAPE.to_be_bytes());
    assert_eq!(&response[4..], [0xFF, 0x00]);
}
