//! AMF3 codec.
//!
//! The successor format: a single marker byte per value, a 29-bit
//! variable-length integer for every length, index and reference prefix, and
//! three independent reference tables (non-empty strings, complex-value
//! identities, object traits). Numbers split into an integer and a double
//! encoding; object shape metadata (traits) is written once and referenced
//! by index afterwards.

use std::io;

use crate::error::Result;
use crate::value::{Object, Value, ValueArena};

mod decoder;
mod encoder;

pub use decoder::Amf3Decoder;
pub use encoder::Amf3Encoder;

/// AMF3 marker types.
///
/// The numeric tags are part of the wire contract and must not change.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf3Marker {
    /// undefined-marker
    Undefined = 0x00,
    /// null-marker
    Null = 0x01,
    /// false-marker
    False = 0x02,
    /// true-marker
    True = 0x03,
    /// integer-marker
    Integer = 0x04,
    /// double-marker
    Double = 0x05,
    /// string-marker
    String = 0x06,
    /// xml-doc-marker
    ///
    /// not supported
    XmlDoc = 0x07,
    /// date-marker
    Date = 0x08,
    /// array-marker
    Array = 0x09,
    /// object-marker
    Object = 0x0a,
    /// xml-marker
    ///
    /// not supported
    Xml = 0x0b,
    /// byte-array-marker
    ///
    /// not supported
    ByteArray = 0x0c,
    /// vector-int-marker
    ///
    /// not supported
    VectorInt = 0x0d,
    /// vector-uint-marker
    ///
    /// not supported
    VectorUint = 0x0e,
    /// vector-double-marker
    ///
    /// not supported
    VectorDouble = 0x0f,
    /// vector-object-marker
    ///
    /// not supported
    VectorObject = 0x10,
    /// dictionary-marker
    ///
    /// not supported
    Dictionary = 0x11,
}

/// Smallest value representable with the integer marker.
pub const INTEGER_MIN: i32 = -(1 << 28);
/// Largest value representable with the integer marker.
pub const INTEGER_MAX: i32 = (1 << 28) - 1;

/// The only externalizable class in the registry. Its payload is exactly one
/// value, stored under the member key `source`.
pub const ARRAY_COLLECTION: &str = "flex.messaging.io.ArrayCollection";

/// The shared shape metadata of a family of objects. Cached once per
/// session, keyed by the full tuple, and referenced by index thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Traits {
    pub(crate) name: String,
    pub(crate) dynamic: bool,
    pub(crate) externalizable: bool,
    pub(crate) properties: Vec<String>,
}

impl Traits {
    pub(crate) fn of(object: &Object) -> Self {
        Traits {
            name: object.name.clone(),
            dynamic: object.dynamic,
            externalizable: object.externalizable,
            properties: object.sealed_properties.clone(),
        }
    }
}

/// Encode a value into a given writer.
pub fn to_writer<W>(writer: W, arena: &ValueArena, value: &Value) -> Result<()>
where
    W: io::Write,
{
    let mut encoder = Amf3Encoder::new(writer);
    encoder.encode_value(arena, value)
}

/// Encode a value into a new byte vector.
pub fn to_bytes(arena: &ValueArena, value: &Value) -> Result<Vec<u8>> {
    let mut writer = Vec::new();
    to_writer(&mut writer, arena, value)?;
    Ok(writer)
}

/// Decode a single value from a byte slice, allocating arrays and objects in
/// the given arena.
pub fn from_bytes(arena: &mut ValueArena, bytes: &[u8]) -> Result<Value> {
    let mut decoder = Amf3Decoder::new(bytes);
    decoder.decode_value(arena)
}
