//! Contact / contactless classification of readers by name

use std::fmt;

use nexum_apdu_core::{Error, Result};
use regex::Regex;
use tracing::trace;

use crate::util::full_match_regex;

/// Physical transmission mode of a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionMode {
    /// Card inserted into a contact slot
    Contact,
    /// Card presented to an RF field
    Contactless,
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contact => f.write_str("CONTACT"),
            Self::Contactless => f.write_str("CONTACTLESS"),
        }
    }
}

/// Classifies readers using two reader-name filters
///
/// The contact filter is consulted first; a name matched by both filters is contact.
/// A filter that was never configured matches nothing.
#[derive(Debug, Clone, Default)]
pub struct TransmissionModeClassifier {
    contact: Option<Regex>,
    contactless: Option<Regex>,
}

impl TransmissionModeClassifier {
    /// Compile the two filters, each matched against the whole reader name
    pub fn new(contact_filter: &str, contactless_filter: &str) -> Result<Self> {
        Self::from_filters(Some(contact_filter), Some(contactless_filter))
    }

    /// Compile whichever filters are configured
    pub fn from_filters(
        contact_filter: Option<&str>,
        contactless_filter: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            contact: contact_filter.map(full_match_regex).transpose()?,
            contactless: contactless_filter.map(full_match_regex).transpose()?,
        })
    }

    /// Classify `reader_name`
    pub fn classify(&self, reader_name: &str) -> Result<TransmissionMode> {
        let matches = |filter: &Option<Regex>| {
            filter.as_ref().is_some_and(|re| re.is_match(reader_name))
        };

        let mode = if matches(&self.contact) {
            TransmissionMode::Contact
        } else if matches(&self.contactless) {
            TransmissionMode::Contactless
        } else {
            return Err(Error::AmbiguousTransmissionMode(reader_name.to_owned()));
        };
        trace!(reader = reader_name, %mode, "reader classified");
        Ok(mode)
    }

    /// Whether `reader_name` designates a contactless reader
    pub fn is_contactless(&self, reader_name: &str) -> Result<bool> {
        self.classify(reader_name)
            .map(|mode| mode == TransmissionMode::Contactless)
    }
}
