//! Mapping of native PC/SC failures onto the transport error taxonomy

use nexum_apdu_core::TransportError;

/// Translate a PC/SC status code into a [`TransportError`]
///
/// Removal and reset are kept distinct so that sessions can report a
/// [`nexum_apdu_core::Error::CardRemoved`] instead of a generic reader failure.
pub(crate) fn transport_error(error: pcsc::Error) -> TransportError {
    match error {
        pcsc::Error::RemovedCard => TransportError::CardRemoved,
        pcsc::Error::ResetCard => TransportError::CardReset,
        pcsc::Error::NoSmartcard => TransportError::NoCard,
        pcsc::Error::NoReadersAvailable => TransportError::NoReadersAvailable,
        pcsc::Error::Timeout => TransportError::Timeout,
        other => TransportError::native(other.to_string()),
    }
}
