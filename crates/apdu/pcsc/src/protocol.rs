//! Card protocol identification rules
//!
//! A rule is a regular expression matched against the whole upper-case hexadecimal ATR
//! of the inserted card. The registry starts from the built-in table below and accepts
//! per-deployment overrides; overriding a rule with [`DISABLED_RULE`] turns the protocol
//! off without removing it.

use std::collections::BTreeMap;

use nexum_apdu_core::{Error, Result};
use regex::Regex;
use tracing::debug;

use crate::util::full_match_regex;

/// Rule that no hexadecimal ATR can match
pub const DISABLED_RULE: &str = "X";

/// Protocols recognized on contactless readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactlessProtocol {
    /// ISO/IEC 14443-4 (type A and B)
    Iso14443_4,
    /// Innovatron B Prime
    InnovatronBPrimeCard,
    /// NXP Mifare Ultralight
    MifareUltraLight,
    /// NXP Mifare Classic
    MifareClassic,
    /// NXP Mifare DESFire
    MifareDesfire,
    /// STMicroelectronics ST25 memory tags
    MemorySt25,
}

impl ContactlessProtocol {
    /// Every contactless protocol with a built-in rule
    pub const ALL: [Self; 6] = [
        Self::Iso14443_4,
        Self::InnovatronBPrimeCard,
        Self::MifareUltraLight,
        Self::MifareClassic,
        Self::MifareDesfire,
        Self::MemorySt25,
    ];

    /// Registry name of the protocol
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Iso14443_4 => "ISO_14443_4",
            Self::InnovatronBPrimeCard => "INNOVATRON_B_PRIME_CARD",
            Self::MifareUltraLight => "MIFARE_ULTRA_LIGHT",
            Self::MifareClassic => "MIFARE_CLASSIC",
            Self::MifareDesfire => "MIFARE_DESFIRE",
            Self::MemorySt25 => "MEMORY_ST25",
        }
    }

    /// Built-in ATR rule
    pub const fn default_rule(&self) -> &'static str {
        match self {
            Self::Iso14443_4 => "3B8880....................|3B8B80.*|3B8C800150.*|.*4F4D4141544C4153.*",
            Self::InnovatronBPrimeCard => "3B8F8001805A0...................829000..",
            Self::MifareUltraLight => "3B8F8001804F0CA0000003060300030000000068",
            Self::MifareClassic => "3B8F8001804F0CA000000306030001000000006A",
            Self::MifareDesfire => "3B8180018080",
            Self::MemorySt25 => "3B8F8001804F0CA000000306070007D0020C00B6",
        }
    }
}

/// Protocols recognized on contact readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactProtocol {
    /// ISO/IEC 7816-3, any transmission protocol
    Iso7816_3,
    /// ISO/IEC 7816-3 T=0
    Iso7816_3T0,
    /// ISO/IEC 7816-3 T=1
    Iso7816_3T1,
}

impl ContactProtocol {
    /// Every contact protocol with a built-in rule
    pub const ALL: [Self; 3] = [Self::Iso7816_3, Self::Iso7816_3T0, Self::Iso7816_3T1];

    /// Registry name of the protocol
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Iso7816_3 => "ISO_7816_3",
            Self::Iso7816_3T0 => "ISO_7816_3_T0",
            Self::Iso7816_3T1 => "ISO_7816_3_T1",
        }
    }

    /// Built-in ATR rule
    pub const fn default_rule(&self) -> &'static str {
        "3.*"
    }
}

/// A compiled identification rule
#[derive(Debug, Clone)]
pub struct ProtocolRule {
    pattern: String,
    regex: Regex,
}

impl ProtocolRule {
    /// Compile a rule matching the whole hexadecimal ATR
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_owned(),
            regex: full_match_regex(pattern)?,
        })
    }

    /// Source pattern of the rule
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the upper-case hexadecimal ATR satisfies the rule
    ///
    /// An empty rule never matches, even an empty ATR.
    pub fn matches(&self, atr_hex: &str) -> bool {
        !self.pattern.is_empty() && self.regex.is_match(atr_hex)
    }
}

/// Mapping from protocol name to identification rule
#[derive(Debug, Clone)]
pub struct ProtocolRuleRegistry {
    rules: BTreeMap<String, ProtocolRule>,
}

impl ProtocolRuleRegistry {
    /// Registry populated with the built-in contact and contactless rules
    pub fn new() -> Result<Self> {
        let builtin = ContactlessProtocol::ALL
            .iter()
            .map(|p| (p.name(), p.default_rule()))
            .chain(ContactProtocol::ALL.iter().map(|p| (p.name(), p.default_rule())));

        let mut rules = BTreeMap::new();
        for (name, pattern) in builtin {
            rules.insert(name.to_owned(), ProtocolRule::new(pattern)?);
        }
        Ok(Self { rules })
    }

    /// Look up the rule registered for `protocol`
    pub fn get(&self, protocol: &str) -> Result<&ProtocolRule> {
        self.rules
            .get(protocol)
            .ok_or_else(|| Error::UnknownProtocol(protocol.to_owned()))
    }

    /// Whether a rule is registered for `protocol`
    pub fn contains(&self, protocol: &str) -> bool {
        self.rules.contains_key(protocol)
    }

    /// Registered protocol names, in lexical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry holds no rule
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replace or add the given rules
    ///
    /// Every pattern is compiled before the registry is touched, so a single
    /// malformed override leaves the registry unchanged.
    pub fn merge<I, K, V>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let compiled = overrides
            .into_iter()
            .map(|(name, pattern)| Ok((name.into(), ProtocolRule::new(pattern.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;

        for (name, rule) in compiled {
            debug!(protocol = %name, rule = rule.pattern(), "protocol identification rule updated");
            self.rules.insert(name, rule);
        }
        Ok(())
    }

    /// Names of the protocols whose rule matches `atr_hex`
    pub fn identify<'a>(&'a self, atr_hex: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |(_, rule)| rule.matches(atr_hex))
            .map(|(name, _)| name.as_str())
    }
}
