//! AMF0 decoder.

use num_traits::FromPrimitive;

use super::Amf0Marker;
use crate::amf3::Amf3Decoder;
use crate::error::{AmfError, Result};
use crate::value::{Object, Value, ValueArena};

/// AMF0 decoder.
///
/// Holds the reference table for one decode session. Containers are
/// registered in the table immediately after their marker is read, before
/// their children, so back-references inside a still-incomplete container
/// resolve correctly.
#[derive(Debug)]
pub struct Amf0Decoder<B> {
    buf: B,
    references: Vec<Value>,
}

impl<B> Amf0Decoder<B> {
    /// Create a new decoder from a [`bytes::Buf`].
    pub fn new(buf: B) -> Self {
        Amf0Decoder {
            buf,
            references: Vec::new(),
        }
    }
}

impl<B> Amf0Decoder<B>
where
    B: bytes::Buf,
{
    /// Check if there are remaining bytes to read.
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(AmfError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn read_string(&mut self, len: usize) -> Result<String> {
        self.ensure(len)?;
        let bytes = self.buf.copy_to_bytes(len);
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read a u16-length-prefixed UTF-8 string without a marker, as used for
    /// object keys and the packet framing fields.
    pub(crate) fn read_raw_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        self.read_string(len)
    }

    fn read_marker(&mut self) -> Result<Amf0Marker> {
        let byte = self.read_u8()?;
        Amf0Marker::from_u8(byte).ok_or(AmfError::UnknownMarker(byte))
    }

    /// Decode a [`Value`] from the buffer, allocating arrays and objects in
    /// the given arena.
    pub fn decode_value(&mut self, arena: &mut ValueArena) -> Result<Value> {
        let marker = self.read_marker()?;

        match marker {
            Amf0Marker::Number => Ok(Value::Number(self.read_f64()?)),
            Amf0Marker::Boolean => Ok(Value::Boolean(self.read_u8()? != 0)),
            Amf0Marker::String => {
                let len = self.read_u16()? as usize;
                Ok(Value::String(self.read_string(len)?))
            }
            Amf0Marker::LongString => {
                let len = self.read_u32()? as usize;
                Ok(Value::String(self.read_string(len)?))
            }
            Amf0Marker::Null => Ok(Value::Null),
            Amf0Marker::Undefined => Ok(Value::Undefined),
            Amf0Marker::Date => {
                let epoch_ms = self.read_f64()?;
                // the timezone field is always ignored
                self.read_i16()?;
                Ok(Value::Date(epoch_ms))
            }
            Amf0Marker::StrictArray => self.decode_strict_array(arena),
            Amf0Marker::Object => self.decode_object(arena, false),
            Amf0Marker::TypedObject => self.decode_object(arena, true),
            Amf0Marker::Reference => self.decode_reference(),
            Amf0Marker::AvmPlusObject => {
                // one value in AMF3, with fresh reference tables
                let mut decoder = Amf3Decoder::new(&mut self.buf);
                decoder.decode_value(arena)
            }
            _ => Err(AmfError::UnsupportedAmf0Marker(marker)),
        }
    }

    fn decode_strict_array(&mut self, arena: &mut ValueArena) -> Result<Value> {
        let handle = arena.alloc_array(Vec::new());
        self.references.push(Value::Array(handle));

        let len = self.read_u32()? as usize;

        for _ in 0..len {
            let value = self.decode_value(arena)?;
            arena.array_mut(handle).push(value);
        }

        Ok(Value::Array(handle))
    }

    fn decode_object(&mut self, arena: &mut ValueArena, typed: bool) -> Result<Value> {
        let handle = arena.alloc_object(Object::default());
        self.references.push(Value::Object(handle));

        if typed {
            arena.object_mut(handle).name = self.read_raw_string()?;
        }

        loop {
            let key = self.read_raw_string()?;

            // the object end marker is preceded by an empty key
            if key.is_empty() {
                let marker = self.read_marker()?;
                if marker != Amf0Marker::ObjectEnd {
                    return Err(AmfError::UnexpectedAmf0Marker {
                        expected: &[Amf0Marker::ObjectEnd],
                        got: marker,
                    });
                }
                break;
            }

            assert!(!key.starts_with('@'), "reserved member key: {key}");

            let value = self.decode_value(arena)?;
            arena.object_mut(handle).members.insert(key, value);
        }

        Ok(Value::Object(handle))
    }

    fn decode_reference(&mut self) -> Result<Value> {
        let index = self.read_u16()? as usize;
        self.references
            .get(index)
            .cloned()
            .ok_or(AmfError::DanglingReference { index })
    }
}
