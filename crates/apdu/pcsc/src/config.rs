//! Configuration options for PC/SC reader sessions
//!
//! [`ReaderConfig`] holds the per-reader settings applied when a physical channel is
//! opened. [`PluginConfig`] is the file/environment representation consumed by
//! [`crate::PcscPluginBuilder::from_config`].

use std::{collections::BTreeMap, fmt, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use nexum_apdu_core::{ApduTransceiver, Error, Result};
use pcsc::{Disposition, Protocols, ShareMode};
use serde::Deserialize;

/// Environment variable prefix for [`PluginConfig`] overrides
pub const ENV_PREFIX: &str = "NEXUM_PCSC_";

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharingMode {
    /// Other applications may use the card concurrently
    Shared,
    /// Exclusive access to the card (default)
    #[default]
    Exclusive,
}

impl From<SharingMode> for ShareMode {
    fn from(mode: SharingMode) -> Self {
        match mode {
            SharingMode::Shared => Self::Shared,
            SharingMode::Exclusive => Self::Exclusive,
        }
    }
}

/// Transmission protocol requested when connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsoProtocol {
    /// Let the resource manager negotiate (default)
    #[default]
    Any,
    /// Character-oriented T=0
    T0,
    /// Block-oriented T=1
    T1,
    /// Contactless
    Tcl,
}

impl IsoProtocol {
    /// Identifier string of the protocol
    pub const fn value(&self) -> &'static str {
        match self {
            Self::Any => "*",
            Self::T0 => "T=0",
            Self::T1 => "T=1",
            Self::Tcl => "T=CL",
        }
    }

    /// Protocol mask passed to the resource manager
    pub(crate) const fn protocols(&self) -> Protocols {
        match self {
            Self::T0 => Protocols::T0,
            Self::T1 => Protocols::T1,
            // contactless readers expose the card through T=1 emulation
            Self::Any | Self::Tcl => Protocols::ANY,
        }
    }
}

impl fmt::Display for IsoProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Card disposition applied when the channel is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisconnectionMode {
    /// Reset the card
    Reset,
    /// Leave the card powered (default)
    #[default]
    Leave,
}

impl From<DisconnectionMode> for Disposition {
    fn from(mode: DisconnectionMode) -> Self {
        match mode {
            DisconnectionMode::Reset => Self::ResetCard,
            DisconnectionMode::Leave => Self::LeaveCard,
        }
    }
}

/// Per-reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Sharing mode used when opening the channel
    pub sharing_mode: SharingMode,
    /// Protocol requested when opening the channel
    pub iso_protocol: IsoProtocol,
    /// Disposition applied when closing the channel
    pub disconnection_mode: DisconnectionMode,
    /// Automatic GET RESPONSE under T=0
    pub t0_get_response: bool,
    /// Automatic GET RESPONSE under T=1
    pub t1_get_response: bool,
    /// Strip a trailing Le under T=1
    pub t1_strip_le: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            sharing_mode: SharingMode::default(),
            iso_protocol: IsoProtocol::default(),
            disconnection_mode: DisconnectionMode::default(),
            t0_get_response: true,
            t1_get_response: true,
            t1_strip_le: true,
        }
    }
}

impl ReaderConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_sharing_mode(mut self, mode: SharingMode) -> Self {
        self.sharing_mode = mode;
        self
    }

    /// Set the requested protocol
    pub const fn with_iso_protocol(mut self, protocol: IsoProtocol) -> Self {
        self.iso_protocol = protocol;
        self
    }

    /// Set the disconnection mode
    pub const fn with_disconnection_mode(mut self, mode: DisconnectionMode) -> Self {
        self.disconnection_mode = mode;
        self
    }

    /// Transceiver honoring the chaining switches of this configuration
    pub const fn transceiver(&self) -> ApduTransceiver {
        ApduTransceiver::new()
            .with_t0_get_response(self.t0_get_response)
            .with_t1_get_response(self.t1_get_response)
            .with_t1_strip_le(self.t1_strip_le)
    }
}

/// Plugin configuration as read from a TOML file and the environment
///
/// ```toml
/// contact_reader_filter = ".*(Identiv|SCM).*"
/// contactless_reader_filter = ".*(ACR122|Contactless).*"
///
/// [protocol_rules]
/// MIFARE_CLASSIC = "3B8F8001804F0CA000000306030001000000006A"
///
/// [reader]
/// sharing_mode = "SHARED"
/// disconnection_mode = "RESET"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Reader-name pattern identifying contact readers
    pub contact_reader_filter: Option<String>,
    /// Reader-name pattern identifying contactless readers
    pub contactless_reader_filter: Option<String>,
    /// Protocol rule overrides keyed by protocol name
    pub protocol_rules: BTreeMap<String, String>,
    /// Settings applied to every reader the plugin creates
    pub reader: ReaderConfig,
}

impl PluginConfig {
    /// Load the configuration from `path`, overridden by `NEXUM_PCSC_*` variables
    ///
    /// Nested keys use a double underscore, e.g. `NEXUM_PCSC_READER__SHARING_MODE=SHARED`.
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }
}
