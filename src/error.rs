//! AMF error type.

use std::io;
use std::num::TryFromIntError;
use std::string::FromUtf8Error;

use crate::amf0::Amf0Marker;
use crate::amf3::Amf3Marker;

/// Result type.
pub type Result<T> = std::result::Result<T, AmfError>;

/// AMF error.
///
/// Every failure aborts the current encode or decode call; the codecs never
/// recover or return partial values.
#[derive(thiserror::Error, Debug)]
pub enum AmfError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The byte source cannot satisfy a requested length.
    #[error("unexpected end of input: needed {needed} more bytes, {remaining} remaining")]
    UnexpectedEof {
        /// The number of bytes the decoder asked for.
        needed: usize,
        /// The number of bytes left in the source.
        remaining: usize,
    },
    /// A byte read where a marker was expected matches no known marker.
    #[error("unknown marker: {0}")]
    UnknownMarker(u8),
    /// This AMF0 marker cannot be deserialized.
    #[error("this marker cannot be deserialized: {0:?}")]
    UnsupportedAmf0Marker(Amf0Marker),
    /// This AMF3 marker cannot be deserialized.
    #[error("this marker cannot be deserialized: {0:?}")]
    UnsupportedAmf3Marker(Amf3Marker),
    /// Unexpected AMF0 marker.
    #[error("unexpected marker: expected one of {expected:?}, got {got:?}")]
    UnexpectedAmf0Marker {
        /// The expected markers.
        expected: &'static [Amf0Marker],
        /// The actual marker.
        got: Amf0Marker,
    },
    /// Element (string, sequence or reference index) is too long.
    #[error("element is too long: {0}")]
    TooLong(#[from] TryFromIntError),
    /// String parse error.
    #[error("string parse error: {0}")]
    StringParse(#[from] FromUtf8Error),
    /// A back-reference index has no corresponding table entry.
    #[error("dangling reference: {index}")]
    DanglingReference {
        /// The unresolvable table index.
        index: usize,
    },
    /// The value does not fit into the 4-byte variable-length integer.
    #[error("value out of range for u29: {0}")]
    U29OutOfRange(u32),
    /// The externalizable class is not in the registry.
    #[error("unsupported externalizable class: {0}")]
    UnsupportedExternalizable(String),
}
