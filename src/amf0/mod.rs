//! AMF0 codec.
//!
//! The legacy tagged-value format: one marker byte per value, fixed-width
//! big-endian length prefixes, and a single reference table shared by arrays
//! and objects. The `avmplus-object` marker escapes into the [AMF3
//! codec](crate::amf3) for a single value; the packet layer uses it to embed
//! message bodies.

use std::io;

use crate::error::Result;
use crate::value::{Value, ValueArena};

mod decoder;
mod encoder;

pub use decoder::Amf0Decoder;
pub use encoder::Amf0Encoder;

/// AMF0 marker types.
///
/// The numeric tags are part of the wire contract and must not change.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf0Marker {
    /// number-marker
    Number = 0x00,
    /// boolean-marker
    Boolean = 0x01,
    /// string-marker
    String = 0x02,
    /// object-marker
    Object = 0x03,
    /// movieclip-marker
    ///
    /// reserved, not supported
    MovieClip = 0x04,
    /// null-marker
    Null = 0x05,
    /// undefined-marker
    Undefined = 0x06,
    /// reference-marker
    Reference = 0x07,
    /// ecma-array-marker
    ///
    /// not supported
    EcmaArray = 0x08,
    /// object-end-marker
    ObjectEnd = 0x09,
    /// strict-array-marker
    StrictArray = 0x0a,
    /// date-marker
    Date = 0x0b,
    /// long-string-marker
    LongString = 0x0c,
    /// unsupported-marker
    Unsupported = 0x0d,
    /// recordset-marker
    ///
    /// reserved, not supported
    Recordset = 0x0e,
    /// xml-document-marker
    ///
    /// not supported
    XmlDocument = 0x0f,
    /// typed-object-marker
    TypedObject = 0x10,
    /// avmplus-object-marker
    ///
    /// escapes into AMF3 for one value
    AvmPlusObject = 0x11,
}

/// Encode a value into a given writer.
pub fn to_writer<W>(writer: W, arena: &ValueArena, value: &Value) -> Result<()>
where
    W: io::Write,
{
    let mut encoder = Amf0Encoder::new(writer);
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
    let mut decoder = Amf0Decoder::new(bytes);
    decoder.decode_value(arena)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::{Amf0Marker, from_bytes, to_bytes};
    use crate::value::{Object, Value, ValueArena};

    fn round_trip(arena: &ValueArena, value: &Value) -> (ValueArena, Value) {
        let bytes = to_bytes(arena, value).unwrap();
        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        (decoded_arena, decoded)
    }

    #[test]
    fn scalar_round_trip() {
        let arena = ValueArena::new();

        for value in [
            Value::Null,
            Value::Undefined,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(1.5),
            Value::Number(-0.25),
            Value::Date(1_234_567_890_000.0),
            Value::from("hello"),
            Value::from(""),
        ] {
            let (decoded_arena, decoded) = round_trip(&arena, &value);
            assert!(arena.value_eq(&value, &decoded_arena, &decoded), "{value:?}");
        }
    }

    #[test]
    fn integer_widens_to_number() {
        let arena = ValueArena::new();

        let bytes = to_bytes(&arena, &Value::Integer(42)).unwrap();
        assert_eq!(bytes[0], Amf0Marker::Number as u8);

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        assert_eq!(decoded, Value::Number(42.0));
    }

    #[test]
    fn long_string_threshold() {
        let arena = ValueArena::new();

        let short = "a".repeat(0xFFFF);
        let bytes = to_bytes(&arena, &Value::from(short.as_str())).unwrap();
        assert_eq!(bytes[0], Amf0Marker::String as u8);

        let long = "a".repeat(0x1_0000);
        let bytes = to_bytes(&arena, &Value::from(long.as_str())).unwrap();
        assert_eq!(bytes[0], Amf0Marker::LongString as u8);

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        assert_eq!(decoded, Value::String(long));
    }

    #[test]
    fn array_round_trip() {
        let mut arena = ValueArena::new();
        let array = arena.alloc_array(vec![Value::Number(1.0), Value::from("two"), Value::Null]);
        let value = Value::Array(array);

        let (decoded_arena, decoded) = round_trip(&arena, &value);
        assert!(arena.value_eq(&value, &decoded_arena, &decoded));
    }

    #[test]
    fn anonymous_object_round_trip() {
        let mut arena = ValueArena::new();

        let mut object = Object::default();
        object.members.insert("a".to_owned(), Value::Boolean(true));
        object.members.insert("b".to_owned(), Value::from("text"));
        let value = Value::Object(arena.alloc_object(object));

        let (decoded_arena, decoded) = round_trip(&arena, &value);
        assert!(arena.value_eq(&value, &decoded_arena, &decoded));
    }

    #[test]
    fn typed_object_round_trip() {
        let mut arena = ValueArena::new();

        let mut object = Object::default();
        object.name = "com.example.Thing".to_owned();
        object.members.insert("id".to_owned(), Value::Number(7.0));
        let value = Value::Object(arena.alloc_object(object));

        let bytes = to_bytes(&arena, &value).unwrap();
        assert_eq!(bytes[0], Amf0Marker::TypedObject as u8);

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        assert!(arena.value_eq(&value, &decoded_arena, &decoded));
    }

    #[test]
    fn shared_array_uses_reference() {
        let mut arena = ValueArena::new();

        let inner = arena.alloc_array(vec![Value::Number(1.0)]);
        let outer = arena.alloc_array(vec![Value::Array(inner), Value::Array(inner)]);
        let value = Value::Array(outer);

        let bytes = to_bytes(&arena, &value).unwrap();
        // outer is table index 0, inner is index 1; the second occurrence of
        // inner is a reference to index 1
        let reference = [Amf0Marker::Reference as u8, 0x00, 0x01];
        assert_eq!(&bytes[bytes.len() - reference.len()..], reference);

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        let Value::Array(decoded_outer) = decoded else {
            panic!("expected an array");
        };
        let items = decoded_arena.array(decoded_outer);
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn self_referential_array_terminates() {
        let mut arena = ValueArena::new();

        let array = arena.alloc_array(Vec::new());
        arena.array_mut(array).push(Value::Array(array));
        let value = Value::Array(array);

        let bytes = to_bytes(&arena, &value).unwrap();
        #[rustfmt::skip]
        assert_eq!(
            bytes,
            vec![
                Amf0Marker::StrictArray as u8,
                0x00, 0x00, 0x00, 0x01, // count
                Amf0Marker::Reference as u8,
                0x00, 0x00, // index of the array itself
            ]
        );

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        let Value::Array(decoded_array) = decoded else {
            panic!("expected an array");
        };
        assert_eq!(decoded_arena.array(decoded_array)[0], Value::Array(decoded_array));
    }

    #[test]
    fn self_referential_object_round_trip() {
        let mut arena = ValueArena::new();

        let object = arena.alloc_object(Object::default());
        arena.object_mut(object).members.insert("me".to_owned(), Value::Object(object));
        let value = Value::Object(object);

        let bytes = to_bytes(&arena, &value).unwrap();

        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &bytes).unwrap();
        let Value::Object(decoded_object) = decoded else {
            panic!("expected an object");
        };
        assert_eq!(
            decoded_arena.object(decoded_object).members.get("me"),
            Some(&Value::Object(decoded_object))
        );
    }
}
