//! Protocol-level error types.
//!
//! These errors cover malformed wire data: short reads, unrecognized
//! discriminants, and field values outside the set this crate understands.
//! They never represent transport or authentication failures — those are
//! owned by higher-level crates that carry a live connection.

use thiserror::Error;

use crate::prelude::String;

/// Errors produced while decoding TDS wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A fixed-size structure needed more bytes than were available.
    #[error("incomplete packet: expected {expected} bytes, got {actual}")]
    IncompletePacket {
        /// Bytes required to decode the structure.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A read ran past the end of the buffer with no fixed expected size
    /// known in advance (e.g. a varchar whose declared length exceeds what
    /// remains).
    #[error("unexpected end of buffer")]
    UnexpectedEof,

    /// A one-byte token type discriminant did not match any known token,
    /// or matched a token that requires column-metadata context to parse
    /// and was encountered through `next_token` instead of
    /// `next_token_with_metadata`.
    #[error("invalid or context-dependent token type: 0x{0:02X}")]
    InvalidTokenType(u8),

    /// An unrecognized TDS packet type byte.
    #[error("invalid packet type: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// An unrecognized packet status byte.
    #[error("invalid packet status: 0x{0:02X}")]
    InvalidPacketStatus(u8),

    /// An unrecognized PRELOGIN option token.
    #[error("invalid PRELOGIN option: 0x{0:02X}")]
    InvalidPreloginOption(u8),

    /// A fixed-width field held a value outside the range this crate
    /// understands (e.g. an Always Encrypted encryption-type byte).
    #[error("invalid value {value} for field {field}")]
    InvalidField {
        /// Name of the field that failed validation.
        field: &'static str,
        /// Raw value that failed validation.
        value: u32,
    },

    /// A length-prefixed or fixed-width string failed to decode as valid
    /// text (e.g. unpaired UTF-16 surrogates in a context that requires
    /// strict decoding, such as a routing hostname).
    #[error("string encoding error: {0}")]
    StringEncoding(
        #[cfg(feature = "std")] String,
        #[cfg(not(feature = "std"))] &'static str,
    ),

    /// A column's wire type id is not one this crate decodes
    /// (XML/UDT/SQL_VARIANT/IMAGE/TEXT/NTEXT).
    #[error("unsupported column type 0x{type_id:02X} for column {column}")]
    UnsupportedColumnType {
        /// Column name as reported in COLMETADATA.
        column: String,
        /// Raw wire type id.
        type_id: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_packet_display() {
        let err = ProtocolError::IncompletePacket {
            expected: 12,
            actual: 4,
        };
        assert_eq!(err.to_string(), "incomplete packet: expected 12 bytes, got 4");
    }

    #[test]
    fn invalid_token_type_display() {
        let err = ProtocolError::InvalidTokenType(0x81);
        assert_eq!(err.to_string(), "invalid or context-dependent token type: 0x81");
    }
}
