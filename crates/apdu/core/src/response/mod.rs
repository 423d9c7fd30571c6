//! Response helpers for APDU exchanges

pub mod status;
