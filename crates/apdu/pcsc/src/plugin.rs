//! Reader discovery and the process-wide plugin instance
//!
//! A [`Plugin`] lists the slots of a [`SlotProvider`] and wraps each one in a
//! [`ReaderSession`] sharing the plugin's [`ReaderIdentification`]. The PC/SC flavour is
//! built with [`PcscPluginBuilder`] and may be registered as the process-wide instance
//! with [`initialize`], retrieved with [`instance`] and torn down with [`shutdown`].

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use nexum_apdu_core::{Error, Result, TransportError};
use parking_lot::{Mutex, const_mutex};
use pcsc::{Context, Scope};
use tracing::{debug, trace, warn};

use crate::{
    classifier::TransmissionModeClassifier,
    config::{PluginConfig, ReaderConfig},
    error::transport_error,
    identification::ReaderIdentification,
    protocol::{DISABLED_RULE, ProtocolRuleRegistry},
    session::ReaderSession,
    terminal::Terminal,
    transport::PcscTerminal,
};

/// Name of the PC/SC plugin
pub const PLUGIN_NAME: &str = "PcscPlugin";

/// Period of a reader monitoring cycle
pub const MONITORING_CYCLE_DURATION: Duration = Duration::from_millis(1000);

/// Source of reader slots
pub trait SlotProvider: Send + Sync + fmt::Debug {
    /// Terminal type handed to reader sessions
    type Terminal: Terminal;

    /// Names of the slots currently attached
    fn list_slots(&self) -> Result<Vec<String>, TransportError>;

    /// Terminal for the slot named `name`
    fn terminal(&self, name: &str) -> Result<Self::Terminal, TransportError>;
}

/// Slots enumerated by the PC/SC resource manager
#[derive(Debug, Default, Clone, Copy)]
pub struct PcscSlotProvider;

impl SlotProvider for PcscSlotProvider {
    type Terminal = PcscTerminal;

    fn list_slots(&self) -> Result<Vec<String>, TransportError> {
        let context = Context::establish(Scope::User).map_err(transport_error)?;
        match context.list_readers_owned() {
            Ok(readers) => Ok(readers
                .into_iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(transport_error(e)),
        }
    }

    fn terminal(&self, name: &str) -> Result<Self::Terminal, TransportError> {
        PcscTerminal::new(name)
    }
}

/// Reader plugin over a slot provider
#[derive(Debug)]
pub struct Plugin<P> {
    name: String,
    provider: P,
    identification: Arc<ReaderIdentification>,
    reader_config: ReaderConfig,
}

/// The PC/SC plugin
pub type PcscPlugin = Plugin<PcscSlotProvider>;

impl<P: SlotProvider> Plugin<P> {
    /// Plugin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identification rules and filters shared with every created reader
    pub fn identification(&self) -> &Arc<ReaderIdentification> {
        &self.identification
    }

    /// Configuration applied to every created reader
    pub const fn reader_config(&self) -> &ReaderConfig {
        &self.reader_config
    }

    /// Period of a reader monitoring cycle
    pub const fn monitoring_cycle_duration(&self) -> Duration {
        MONITORING_CYCLE_DURATION
    }

    /// Names of the readers currently attached
    pub fn search_available_reader_names(&self) -> Result<Vec<String>> {
        let names = self.provider.list_slots().map_err(|e| {
            Error::reader_io(format!("{}: could not access terminals list", self.name), e)
        })?;
        if names.is_empty() {
            warn!(plugin = %self.name, "no reader available");
        } else {
            trace!(plugin = %self.name, readers = ?names, "readers found");
        }
        Ok(names)
    }

    /// One closed session per reader currently attached
    pub fn search_available_readers(&self) -> Result<Vec<ReaderSession<P::Terminal>>> {
        self.search_available_reader_names()?
            .iter()
            .map(|name| self.create_reader(name))
            .collect()
    }

    /// Session for the reader named `name`, if it is attached
    pub fn search_reader(&self, name: &str) -> Result<Option<ReaderSession<P::Terminal>>> {
        if !self.search_available_reader_names()?.iter().any(|n| n == name) {
            debug!(plugin = %self.name, reader = name, "reader not found");
            return Ok(None);
        }
        self.create_reader(name).map(Some)
    }

    /// Whether `reader_name` is contactless according to the plugin filters
    pub fn is_contactless(&self, reader_name: &str) -> Result<bool> {
        self.identification
            .classifier()
            .is_contactless(reader_name)
    }

    fn create_reader(&self, name: &str) -> Result<ReaderSession<P::Terminal>> {
        let terminal = self.provider.terminal(name).map_err(|e| {
            Error::reader_io(format!("{}: could not create terminal {name}", self.name), e)
        })?;
        debug!(plugin = %self.name, reader = name, "reader created");
        Ok(ReaderSession::new(
            terminal,
            Arc::clone(&self.identification),
            self.reader_config,
        ))
    }
}

/// Builder for [`PcscPlugin`]
#[derive(Debug, Clone, Default)]
pub struct PcscPluginBuilder {
    contact_filter: Option<String>,
    contactless_filter: Option<String>,
    protocol_rules: BTreeMap<String, String>,
    reader_config: ReaderConfig,
}

impl PcscPluginBuilder {
    /// Create a builder with the built-in protocol rules and no reader filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder seeded from a loaded [`PluginConfig`]
    pub fn from_config(config: &PluginConfig) -> Self {
        let mut builder = Self::new().with_reader_config(config.reader);
        builder.contact_filter = config.contact_reader_filter.clone();
        builder.contactless_filter = config.contactless_reader_filter.clone();
        for (protocol, rule) in &config.protocol_rules {
            builder = builder.update_protocol_identification_rule(protocol, rule);
        }
        builder
    }

    /// Reader-name pattern identifying contact readers
    pub fn use_contact_reader_identification_filter(mut self, filter: &str) -> Self {
        self.contact_filter = Some(filter.to_owned());
        self
    }

    /// Reader-name pattern identifying contactless readers
    pub fn use_contactless_reader_identification_filter(mut self, filter: &str) -> Self {
        self.contactless_filter = Some(filter.to_owned());
        self
    }

    /// Replace or add the ATR rule of `protocol`; an empty rule disables the protocol
    pub fn update_protocol_identification_rule(mut self, protocol: &str, rule: &str) -> Self {
        let rule = if rule.is_empty() { DISABLED_RULE } else { rule };
        self.protocol_rules.insert(protocol.to_owned(), rule.to_owned());
        self
    }

    /// Configuration applied to every created reader
    pub fn with_reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config;
        self
    }

    /// Build the PC/SC plugin
    pub fn build(self) -> Result<PcscPlugin> {
        self.build_with_provider(PcscSlotProvider)
    }

    /// Build a plugin over a custom slot provider
    pub fn build_with_provider<P: SlotProvider>(self, provider: P) -> Result<Plugin<P>> {
        for (kind, filter) in [
            ("contact", &self.contact_filter),
            ("contactless", &self.contactless_filter),
        ] {
            if filter.as_deref() == Some("") {
                return Err(Error::InvalidConfiguration(format!(
                    "{kind} reader identification filter cannot be empty"
                )));
            }
        }
        if self.protocol_rules.contains_key("") {
            return Err(Error::InvalidConfiguration(
                "protocol name cannot be empty".to_owned(),
            ));
        }

        let mut rules = ProtocolRuleRegistry::new()?;
        rules.merge(self.protocol_rules)?;
        let classifier = TransmissionModeClassifier::from_filters(
            self.contact_filter.as_deref(),
            self.contactless_filter.as_deref(),
        )?;

        debug!(plugin = PLUGIN_NAME, rules = rules.len(), "plugin built");
        Ok(Plugin {
            name: PLUGIN_NAME.to_owned(),
            provider,
            identification: Arc::new(ReaderIdentification::new(rules, classifier)),
            reader_config: self.reader_config,
        })
    }
}

static INSTANCE: Mutex<Option<Arc<PcscPlugin>>> = const_mutex(None);

/// Register `plugin` as the process-wide instance
///
/// Fails with [`Error::IllegalState`] if an instance is already registered.
pub fn initialize(plugin: PcscPlugin) -> Result<Arc<PcscPlugin>> {
    let mut instance = INSTANCE.lock();
    if instance.is_some() {
        return Err(Error::illegal_state("the PC/SC plugin is already initialized"));
    }
    let plugin = Arc::new(plugin);
    *instance = Some(Arc::clone(&plugin));
    debug!(plugin = %plugin.name(), "plugin initialized");
    Ok(plugin)
}

/// Process-wide instance, if registered
pub fn instance() -> Option<Arc<PcscPlugin>> {
    INSTANCE.lock().clone()
}

/// Unregister the process-wide instance and return it
///
/// Sessions created from it keep working until dropped.
pub fn shutdown() -> Option<Arc<PcscPlugin>> {
    let plugin = INSTANCE.lock().take();
    if let Some(plugin) = &plugin {
        debug!(plugin = %plugin.name(), "plugin shut down");
    }
    plugin
}
