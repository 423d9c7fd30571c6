//! Identification state shared by a plugin and the sessions it creates

use nexum_apdu_core::Result;

use crate::{
    classifier::{TransmissionMode, TransmissionModeClassifier},
    protocol::{ProtocolRule, ProtocolRuleRegistry},
};

/// Protocol rules and reader-name filters, fixed once the plugin is built
#[derive(Debug, Clone)]
pub struct ReaderIdentification {
    rules: ProtocolRuleRegistry,
    classifier: TransmissionModeClassifier,
}

impl ReaderIdentification {
    /// Combine a rule registry and a classifier
    pub const fn new(rules: ProtocolRuleRegistry, classifier: TransmissionModeClassifier) -> Self {
        Self { rules, classifier }
    }

    /// Protocol rule registry
    pub const fn rules(&self) -> &ProtocolRuleRegistry {
        &self.rules
    }

    /// Reader-name classifier
    pub const fn classifier(&self) -> &TransmissionModeClassifier {
        &self.classifier
    }

    /// Rule registered for `protocol`
    pub fn protocol_rule(&self, protocol: &str) -> Result<&ProtocolRule> {
        self.rules.get(protocol)
    }

    /// Transmission mode of `reader_name`
    pub fn transmission_mode(&self, reader_name: &str) -> Result<TransmissionMode> {
        self.classifier.classify(reader_name)
    }
}
