//! Error types for packetgen.
//!
//! This module provides structured error types for all packetgen operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`FieldError`] - Errors from reading or assigning header fields
//! - [`PacketError`] - Errors from packet composition and dispatch
//! - [`PcapNgError`] - Errors from the PCAP-NG reader/writer
//!
//! All errors implement `std::error::Error`. Unknown blocks and unknown
//! link types are *not* errors — they are preserved as first-class data.

use thiserror::Error;

/// Main error type for packetgen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading or assigning a header field
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    /// Error during packet composition or header dispatch
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// Error in the PCAP-NG reader/writer
    #[error("pcapng error: {0}")]
    PcapNg(#[from] PcapNgError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to header fields.
#[derive(Error, Debug)]
pub enum FieldError {
    /// A read would pass the end of the input buffer
    #[error("{field}: truncated (need {needed} bytes, have {have})")]
    Truncated {
        field: &'static str,
        needed: usize,
        have: usize,
    },

    /// Assigned value is out of range or malformed
    #[error("{field}: invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Field name not present in the header schema
    #[error("{header}: no field named {field}")]
    UnknownField { header: &'static str, field: String },

    /// Bit-field name not declared on any host field
    #[error("{header}: no bit field named {field}")]
    UnknownBitField { header: &'static str, field: String },
}

/// Errors related to packet composition and dispatch.
#[derive(Error, Debug)]
pub enum PacketError {
    /// `Packet::add` with no binding from the current top header
    #[error("no binding from {lower} to {upper}")]
    UnboundStack { lower: String, upper: String },

    /// Two bindings of equal specificity matched different upper kinds
    #[error("ambiguous binding under {lower}: both {first} and {second} match")]
    AmbiguousBinding {
        lower: String,
        first: String,
        second: String,
    },

    /// Header kind name not present in the registry
    #[error("unknown header kind: {name}")]
    UnknownHeader { name: String },

    /// Unknown link type and no fallback header accepted the buffer
    #[error("unparseable packet (link type {link_type})")]
    Unparseable { link_type: u32 },
}

/// Errors related to the PCAP-NG format.
#[derive(Error, Debug)]
pub enum PcapNgError {
    /// Stream does not start with a Section Header Block
    #[error("invalid pcapng file: {reason}")]
    InvalidFile { reason: String },

    /// Trailing length mismatch, unknown byte-order magic, or other
    /// structural damage inside a block
    #[error("malformed block: {reason}")]
    MalformedBlock { reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
