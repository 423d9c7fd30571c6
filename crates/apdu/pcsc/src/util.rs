//! Regular expression helpers shared by rule and filter matching

use nexum_apdu_core::{Error, Result};
use regex::Regex;

/// Compile `pattern` so that it only matches a whole input
pub(crate) fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| Error::InvalidConfiguration(format!("invalid pattern {pattern:?}: {e}")))
}

/// Upper-case hexadecimal rendering used for ATR matching
pub(crate) fn atr_to_hex(atr: &[u8]) -> String {
    hex::encode_upper(atr)
}
