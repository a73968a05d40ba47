//! AMF3 encoder.

use std::collections::HashMap;
use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use super::{ARRAY_COLLECTION, Amf3Marker, INTEGER_MAX, INTEGER_MIN, Traits};
use crate::error::{AmfError, Result};
use crate::value::{Handle, Value, ValueArena};

/// AMF3 encoder.
///
/// Holds the three reference tables for one encode session: non-empty
/// strings, complex-value identities (arrays, objects, dates), and object
/// traits. Reusing the encoder across calls accumulates the tables.
#[derive(Debug)]
pub struct Amf3Encoder<W> {
    writer: W,
    strings: HashMap<String, usize>,
    complex: HashMap<Handle, usize>,
    // dates occupy complex-table slots without a handle, so the next index
    // is tracked separately from the map size
    complex_count: usize,
    traits: HashMap<Traits, usize>,
}

impl<W> Amf3Encoder<W> {
    /// Create a new encoder from a writer.
    pub fn new(writer: W) -> Self {
        Amf3Encoder {
            writer,
            strings: HashMap::new(),
            complex: HashMap::new(),
            complex_count: 0,
            traits: HashMap::new(),
        }
    }
}

impl<W> Amf3Encoder<W>
where
    W: io::Write,
{
    /// Encode a [`Value`] of the given arena.
    pub fn encode_value(&mut self, arena: &ValueArena, value: &Value) -> Result<()> {
        match value {
            Value::Null => {
                self.writer.write_u8(Amf3Marker::Null as u8)?;
                Ok(())
            }
            Value::Undefined => {
                self.writer.write_u8(Amf3Marker::Undefined as u8)?;
                Ok(())
            }
            Value::Boolean(true) => {
                self.writer.write_u8(Amf3Marker::True as u8)?;
                Ok(())
            }
            Value::Boolean(false) => {
                self.writer.write_u8(Amf3Marker::False as u8)?;
                Ok(())
            }
            Value::Integer(value) => self.encode_number(*value as f64),
            Value::Number(value) => self.encode_number(*value),
            Value::Date(epoch_ms) => {
                self.writer.write_u8(Amf3Marker::Date as u8)?;
                self.encode_date(*epoch_ms)
            }
            Value::String(value) => {
                self.writer.write_u8(Amf3Marker::String as u8)?;
                self.encode_string(value)
            }
            Value::Array(handle) => {
                self.writer.write_u8(Amf3Marker::Array as u8)?;
                self.encode_array(arena, *handle)
            }
            Value::Object(handle) => {
                self.writer.write_u8(Amf3Marker::Object as u8)?;
                self.encode_object(arena, *handle)
            }
        }
    }

    /// Encode an unsigned integer as a 1–4 byte u29.
    ///
    /// Non-terminal bytes carry 7 significant bits and set the high bit as a
    /// continuation flag; the terminal byte of the 4-byte form carries all 8
    /// bits. Values of `0x4000_0000` and above fail with
    /// [`AmfError::U29OutOfRange`].
    pub fn encode_u29(&mut self, value: u32) -> Result<()> {
        if value < 0x80 {
            self.writer.write_u8(value as u8)?;
        } else if value < 0x4000 {
            self.writer.write_u8((value >> 7 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value & 0x7f) as u8)?;
        } else if value < 0x20_0000 {
            self.writer.write_u8((value >> 14 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value >> 7 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value & 0x7f) as u8)?;
        } else if value < 0x4000_0000 {
            self.writer.write_u8((value >> 22 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value >> 15 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value >> 8 & 0x7f | 0x80) as u8)?;
            self.writer.write_u8((value & 0xff) as u8)?;
        } else {
            return Err(AmfError::U29OutOfRange(value));
        }

        Ok(())
    }

    /// Encode a signed integer as a u29, masked to 29 bits
    /// (two's-complement within the 29-bit field).
    pub fn encode_i29(&mut self, value: i32) -> Result<()> {
        self.encode_u29(value as u32 & 0x1FFF_FFFF)
    }

    /// Encode a number, choosing the integer marker for exact integers
    /// within the 29-bit signed range and the double marker otherwise.
    pub fn encode_number(&mut self, value: f64) -> Result<()> {
        if value.fract() == 0.0 && (INTEGER_MIN as f64..=INTEGER_MAX as f64).contains(&value) {
            self.writer.write_u8(Amf3Marker::Integer as u8)?;
            self.encode_i29(value as i32)
        } else {
            self.writer.write_u8(Amf3Marker::Double as u8)?;
            self.writer.write_f64::<BigEndian>(value)?;
            Ok(())
        }
    }

    /// Encode a string, inline on first encounter and as a string-table
    /// reference afterwards.
    ///
    /// The empty string is always inline and never enters the table, so two
    /// empty strings never alias.
    pub fn encode_string(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.encode_u29(1);
        }

        if let Some(&index) = self.strings.get(value) {
            let index: u32 = index.try_into()?;
            self.encode_u29(index << 1)
        } else {
            let next = self.strings.len();
            self.strings.insert(value.to_owned(), next);

            let len: u32 = value.len().try_into()?;
            self.encode_u29(len << 1 | 1)?;
            self.writer.write_all(value.as_bytes())?;
            Ok(())
        }
    }

    /// Encode an epoch-milliseconds timestamp as an inline date.
    ///
    /// The date occupies a complex-table index so that index numbering stays
    /// interoperable, but [`Value::Date`] carries no identity, so the
    /// encoder never emits a date back-reference itself.
    pub fn encode_date(&mut self, epoch_ms: f64) -> Result<()> {
        self.complex_count += 1;

        self.encode_u29(1)?;
        self.writer.write_f64::<BigEndian>(epoch_ms)?;
        Ok(())
    }

    /// Encode an array of the given arena, inline on first encounter and as
    /// a complex-table reference afterwards.
    ///
    /// The associative part is always written empty; sparse or keyed array
    /// slots are not supported.
    pub fn encode_array(&mut self, arena: &ValueArena, handle: Handle) -> Result<()> {
        if let Some(&index) = self.complex.get(&handle) {
            let index: u32 = index.try_into()?;
            return self.encode_u29(index << 1);
        }
        self.register_complex(handle);

        let items = arena.array(handle);

        let len: u32 = items.len().try_into()?;
        self.encode_u29(len << 1 | 1)?;
        // associative part
        self.encode_string("")?;
        // dense part
        for item in items {
            self.encode_value(arena, item)?;
        }

        Ok(())
    }

    /// Encode an object of the given arena, inline on first encounter and as
    /// a complex-table reference afterwards. Traits are written once per
    /// distinct (name, dynamic, externalizable, properties) tuple and
    /// referenced by trait index afterwards.
    ///
    /// # Panics
    ///
    /// Panics if a sealed property name or dynamic member key starts with
    /// the reserved `@` sigil.
    pub fn encode_object(&mut self, arena: &ValueArena, handle: Handle) -> Result<()> {
        if let Some(&index) = self.complex.get(&handle) {
            let index: u32 = index.try_into()?;
            return self.encode_u29(index << 1);
        }
        self.register_complex(handle);

        let object = arena.object(handle);

        let traits = Traits::of(object);
        if let Some(&index) = self.traits.get(&traits) {
            let index: u32 = index.try_into()?;
            self.encode_u29(index << 2 | 0x01)?;
        } else {
            let next = self.traits.len();
            self.traits.insert(traits, next);

            let count: u32 = object.sealed_properties.len().try_into()?;
            self.encode_u29(count << 4 | (object.dynamic as u32) << 3 | (object.externalizable as u32) << 2 | 0x03)?;
            self.encode_string(&object.name)?;
            for property in &object.sealed_properties {
                self.encode_string(property)?;
            }
        }

        if object.externalizable {
            match object.name.as_str() {
                ARRAY_COLLECTION => {
                    let source = object.members.get("source").unwrap_or(&Value::Undefined);
                    self.encode_value(arena, source)
                }
                name => Err(AmfError::UnsupportedExternalizable(name.to_owned())),
            }
        } else {
            for property in &object.sealed_properties {
                assert!(!property.starts_with('@'), "reserved property name: {property}");
                let value = object.members.get(property).unwrap_or(&Value::Undefined);
                self.encode_value(arena, value)?;
            }

            if object.dynamic {
                for (key, value) in &object.members {
                    if object.sealed_properties.contains(key) {
                        continue;
                    }
                    assert!(!key.starts_with('@'), "reserved member key: {key}");
                    self.encode_string(key)?;
                    self.encode_value(arena, value)?;
                }
                self.encode_string("")?;
            }

            Ok(())
        }
    }

    fn register_complex(&mut self, handle: Handle) {
        self.complex.insert(handle, self.complex_count);
        self.complex_count += 1;
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::Amf3Encoder;
    use crate::amf3::{Amf3Marker, from_bytes};
    use crate::error::AmfError;
    use crate::value::{Object, Value, ValueArena};

    fn u29(value: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        Amf3Encoder::new(&mut buf).encode_u29(value).unwrap();
        buf
    }

    #[test]
    fn u29_boundaries() {
        assert_eq!(u29(0), vec![0x00]);
        assert_eq!(u29(0x7F), vec![0x7F]);
        assert_eq!(u29(0x80), vec![0x81, 0x00]);
        assert_eq!(u29(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(u29(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(u29(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(u29(0x20_0000), vec![0x80, 0xC0, 0x80, 0x00]);
        assert_eq!(u29(0x3FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn u29_out_of_range() {
        let mut buf = Vec::new();
        let err = Amf3Encoder::new(&mut buf).encode_u29(0x4000_0000).unwrap_err();
        assert!(matches!(err, AmfError::U29OutOfRange(0x4000_0000)));
        assert!(buf.is_empty());
    }

    #[test]
    fn signed_extremes_use_the_4_byte_form() {
        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_i29((1 << 28) - 1).unwrap();
        encoder.encode_i29(-(1 << 28)).unwrap();
        encoder.encode_i29(-1).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                0xBF, 0xFF, 0xFF, 0xFF, // 2^28 - 1
                0xC0, 0x80, 0x80, 0x00, // -2^28
                0xFF, 0xFF, 0xFF, 0xFF, // -1
            ]
        );
    }

    #[test]
    fn integer_and_double_layouts() {
        let arena = ValueArena::new();
        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);

        encoder.encode_value(&arena, &Value::Integer(1)).unwrap();
        encoder.encode_value(&arena, &Value::Number(2.0)).unwrap();
        encoder.encode_value(&arena, &Value::Number(1.5)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Integer as u8, 0x01,
                Amf3Marker::Integer as u8, 0x02, // exact integer collapses
                Amf3Marker::Double as u8,
                0x3F, 0xF8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 1.5
            ]
        );
    }

    #[test]
    fn out_of_range_integral_number_uses_double() {
        let arena = ValueArena::new();
        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);

        encoder.encode_value(&arena, &Value::Number((1i64 << 28) as f64)).unwrap();
        assert_eq!(buf[0], Amf3Marker::Double as u8);
    }

    #[test]
    fn repeated_string_uses_the_string_table() {
        let mut arena = ValueArena::new();
        let array = arena.alloc_array(vec![Value::from("abc"), Value::from("abc")]);

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&arena, &Value::Array(array)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Array as u8,
                0x05, // length 2, inline
                0x01, // empty associative part
                Amf3Marker::String as u8,
                0x07, // length 3, inline
                b'a', b'b', b'c',
                Amf3Marker::String as u8,
                0x00, // reference to string 0
            ]
        );
    }

    #[test]
    fn empty_strings_never_alias() {
        let mut arena = ValueArena::new();
        let array = arena.alloc_array(vec![Value::from(""), Value::from("")]);

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&arena, &Value::Array(array)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Array as u8,
                0x05, // length 2, inline
                0x01, // empty associative part
                Amf3Marker::String as u8,
                0x01, // inline, length 0
                Amf3Marker::String as u8,
                0x01, // inline again, not a reference
            ]
        );
    }

    #[test]
    fn self_referential_array_layout() {
        let mut arena = ValueArena::new();
        let array = arena.alloc_array(Vec::new());
        arena.array_mut(array).push(Value::Array(array));

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&arena, &Value::Array(array)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Array as u8,
                0x03, // length 1, inline
                0x01, // empty associative part
                Amf3Marker::Array as u8,
                0x00, // reference to complex value 0: the array itself
            ]
        );
    }

    #[test]
    fn trait_definition_is_written_once() {
        fn point(arena: &mut ValueArena, x: i32, y: i32) -> Value {
            let mut object = Object::default();
            object.name = "Point".to_owned();
            object.dynamic = false;
            object.sealed_properties = vec!["x".to_owned(), "y".to_owned()];
            object.members.insert("x".to_owned(), Value::Integer(x));
            object.members.insert("y".to_owned(), Value::Integer(y));
            Value::Object(arena.alloc_object(object))
        }

        let mut arena = ValueArena::new();
        let first = point(&mut arena, 1, 2);
        let second = point(&mut arena, 3, 4);
        let array = arena.alloc_array(vec![first, second]);

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&arena, &Value::Array(array)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Array as u8,
                0x05, // length 2, inline
                0x01, // empty associative part
                Amf3Marker::Object as u8,
                0x23, // inline traits: 2 sealed properties, not dynamic
                0x0B, b'P', b'o', b'i', b'n', b't',
                0x03, b'x',
                0x03, b'y',
                Amf3Marker::Integer as u8, 0x01,
                Amf3Marker::Integer as u8, 0x02,
                Amf3Marker::Object as u8,
                0x01, // reference to trait 0
                Amf3Marker::Integer as u8, 0x03,
                Amf3Marker::Integer as u8, 0x04,
            ]
        );

        // the stream decodes back to two distinct but equal objects
        let mut decoded_arena = ValueArena::new();
        let decoded = from_bytes(&mut decoded_arena, &buf).unwrap();
        let Value::Array(decoded_array) = decoded else {
            panic!("expected an array");
        };
        let items = decoded_arena.array(decoded_array).clone();
        assert_ne!(items[0], items[1]);

        let mut expected_arena = ValueArena::new();
        let expected = point(&mut expected_arena, 1, 2);
        assert!(decoded_arena.value_eq(&items[0], &expected_arena, &expected));
    }

    #[test]
    fn dates_do_not_alias_on_encode() {
        let mut arena = ValueArena::new();
        let array = arena.alloc_array(vec![Value::Date(1000.0), Value::Date(1000.0)]);

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&arena, &Value::Array(array)).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::Array as u8,
                0x05, // length 2, inline
                0x01, // empty associative part
                Amf3Marker::Date as u8,
                0x01, // inline
                0x40, 0x8F, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, // 1000.0
                Amf3Marker::Date as u8,
                0x01, // inline again
                0x40, 0x8F, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn encoder_reuse_accumulates_the_string_table() {
        let arena = ValueArena::new();
        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);

        encoder.encode_value(&arena, &Value::from("abc")).unwrap();
        encoder.encode_value(&arena, &Value::from("abc")).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf3Marker::String as u8,
                0x07, b'a', b'b', b'c',
                Amf3Marker::String as u8,
                0x00, // reference to string 0
            ]
        );
    }

    #[test]
    #[should_panic(expected = "reserved member key")]
    fn reserved_member_key_panics() {
        let mut arena = ValueArena::new();
        let mut object = Object::default();
        object.members.insert("@dynamic".to_owned(), Value::Null);
        let handle = arena.alloc_object(object);

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        let _ = encoder.encode_value(&arena, &Value::Object(handle));
    }
}
