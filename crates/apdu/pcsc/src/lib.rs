//! PC/SC reader sessions
//!
//! This crate drives smart-card readers through the PC/SC resource manager:
//!
//! - [`ProtocolRuleRegistry`]: ATR regular expressions identifying card protocols
//! - [`TransmissionModeClassifier`]: contact or contactless, from the reader name
//! - [`Terminal`] and its PC/SC implementation [`PcscTerminal`]
//! - [`ReaderSession`]: channel lifecycle, APDU exchange and presence waits for one reader
//! - [`CardPresencePoller`]: cancellable, bounded-latency presence waits
//! - [`PcscPlugin`]: reader discovery, built with [`PcscPluginBuilder`]
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use nexum_apdu_transport_pcsc::prelude::*;
//!
//! let plugin = PcscPluginBuilder::new()
//!     .use_contact_reader_identification_filter(".*(Identiv|Gemalto).*")
//!     .use_contactless_reader_identification_filter(".*(ACR122|PICC).*")
//!     .build()?;
//!
//! for mut reader in plugin.search_available_readers()? {
//!     if !reader.check_card_presence()? {
//!         continue;
//!     }
//!     reader.open()?;
//!     println!("{}: ATR {}", reader.name(), reader.power_on_data());
//!
//!     let response = reader.transmit_apdu(&[0x00, 0xA4, 0x04, 0x00, 0x00])?;
//!     println!("Response: {}", hex::encode_upper(&response));
//!     reader.close()?;
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod capability;
mod classifier;
mod config;
mod error;
mod identification;
mod plugin;
mod poller;
mod protocol;
mod session;
mod terminal;
mod transport;
mod util;

pub use capability::{ChannelLifecycle, PresencePoller, ProtocolClassifier, Transceiver};
pub use classifier::{TransmissionMode, TransmissionModeClassifier};
pub use config::{
    DisconnectionMode, ENV_PREFIX, IsoProtocol, PluginConfig, ReaderConfig, SharingMode,
};
pub use identification::ReaderIdentification;
pub use plugin::{
    MONITORING_CYCLE_DURATION, PLUGIN_NAME, PcscPlugin, PcscPluginBuilder, PcscSlotProvider,
    Plugin, SlotProvider, initialize, instance, shutdown,
};
pub use poller::{CardPresencePoller, POLLING_LATENCY, PollCanceller, PresenceCondition};
pub use protocol::{
    ContactProtocol, ContactlessProtocol, DISABLED_RULE, ProtocolRule, ProtocolRuleRegistry,
};
pub use session::{ChannelState, ReaderSession};
pub use terminal::{IOCTL_CCID_ESCAPE, Terminal};
pub use transport::PcscTerminal;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        ChannelLifecycle, DisconnectionMode, IsoProtocol, PcscPlugin, PcscPluginBuilder,
        PresencePoller, ProtocolClassifier, ReaderConfig, ReaderSession, SharingMode, Terminal,
        Transceiver,
    };
    pub use nexum_apdu_core::prelude::*;
}
