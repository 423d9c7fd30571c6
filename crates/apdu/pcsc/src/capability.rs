//! Capabilities exposed by a reader session
//!
//! Each trait is one facet of a reader; [`crate::ReaderSession`] implements all of them.

use nexum_apdu_core::{Bytes, Result};

/// Physical channel lifecycle
pub trait ChannelLifecycle {
    /// Open the physical channel; no effect when already open
    fn open(&mut self) -> Result<()>;

    /// Close the physical channel; always leaves the channel closed
    fn close(&mut self) -> Result<()>;

    /// Whether the physical channel is open
    fn is_open(&self) -> bool;

    /// Whether a card is in the reader
    fn check_card_presence(&mut self) -> Result<bool>;

    /// Upper-case hexadecimal ATR of the connected card, empty when closed
    fn power_on_data(&self) -> String;
}

/// APDU exchange over an open channel
pub trait Transceiver {
    /// Send one command and return the complete response
    fn transmit_apdu(&mut self, command: &[u8]) -> Result<Bytes>;
}

/// Blocking, cancellable card presence waits
pub trait PresencePoller {
    /// Block until a card is inserted
    fn wait_for_card_insertion(&mut self) -> Result<()>;

    /// Stop a running insertion wait
    fn stop_wait_for_card_insertion(&self);

    /// Block until the card is removed
    fn wait_for_card_removal(&mut self) -> Result<()>;

    /// Stop a running removal wait
    fn stop_wait_for_card_removal(&self);
}

/// Card protocol and transmission mode identification
pub trait ProtocolClassifier {
    /// Whether an identification rule exists for `protocol`
    fn is_protocol_supported(&self, protocol: &str) -> bool;

    /// Enable `protocol` on this reader
    fn activate_protocol(&mut self, protocol: &str);

    /// Disable `protocol` on this reader
    fn deactivate_protocol(&mut self, protocol: &str);

    /// Whether the connected card's ATR matches the rule of `protocol`
    fn is_current_protocol(&self, protocol: &str) -> bool;

    /// Whether the reader is contactless
    fn is_contactless(&mut self) -> Result<bool>;
}
