//! AMF3 decoder.

use num_traits::FromPrimitive;

use super::{ARRAY_COLLECTION, Amf3Marker, Traits};
use crate::error::{AmfError, Result};
use crate::value::{Object, Value, ValueArena};

/// AMF3 decoder.
///
/// Holds the three reference tables for one decode session: non-empty
/// strings, complex values (arrays, objects, dates), and object traits.
/// Containers are registered in the complex table immediately after their
/// reference prefix is read, before their children, so back-references
/// inside a still-incomplete container resolve correctly.
#[derive(Debug)]
pub struct Amf3Decoder<B> {
    buf: B,
    strings: Vec<String>,
    complex: Vec<Value>,
    traits: Vec<Traits>,
}

impl<B> Amf3Decoder<B> {
    /// Create a new decoder from a [`bytes::Buf`].
    pub fn new(buf: B) -> Self {
        Amf3Decoder {
            buf,
            strings: Vec::new(),
            complex: Vec::new(),
            traits: Vec::new(),
        }
    }
}

impl<B> Amf3Decoder<B>
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

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    /// Decode a 1–4 byte u29.
    ///
    /// Stops at the first byte without a continuation flag among the first
    /// three; a 4th byte is always terminal and contributes all 8 bits. The
    /// asymmetry with the encoder's bit widths is part of the format.
    pub fn decode_u29(&mut self) -> Result<u32> {
        let b0 = self.read_u8()? as u32;
        if b0 & 0x80 == 0 {
            return Ok(b0);
        }

        let b1 = self.read_u8()? as u32;
        if b1 & 0x80 == 0 {
            return Ok((b0 & 0x7f) << 7 | b1);
        }

        let b2 = self.read_u8()? as u32;
        if b2 & 0x80 == 0 {
            return Ok((b0 & 0x7f) << 14 | (b1 & 0x7f) << 7 | b2);
        }

        let b3 = self.read_u8()? as u32;
        Ok((b0 & 0x7f) << 22 | (b1 & 0x7f) << 15 | (b2 & 0x7f) << 8 | b3)
    }

    /// Decode a signed integer: a u29 with bit 28 sign-extended into an
    /// [`i32`].
    pub fn decode_i29(&mut self) -> Result<i32> {
        let value = self.decode_u29()?;

        if value & 0x1000_0000 != 0 {
            Ok((value | 0xE000_0000) as i32)
        } else {
            Ok(value as i32)
        }
    }

    /// Decode a string, registering non-empty inline strings in the string
    /// table and resolving references through it.
    pub fn decode_string(&mut self) -> Result<String> {
        let prefix = self.decode_u29()?;

        if prefix & 1 == 1 {
            let len = (prefix >> 1) as usize;
            self.ensure(len)?;
            let bytes = self.buf.copy_to_bytes(len);
            let string = String::from_utf8(bytes.to_vec())?;

            if !string.is_empty() {
                self.strings.push(string.clone());
            }

            Ok(string)
        } else {
            let index = (prefix >> 1) as usize;
            self.strings
                .get(index)
                .cloned()
                .ok_or(AmfError::DanglingReference { index })
        }
    }

    /// Decode a [`Value`] from the buffer, allocating arrays and objects in
    /// the given arena.
    pub fn decode_value(&mut self, arena: &mut ValueArena) -> Result<Value> {
        let byte = self.read_u8()?;
        let marker = Amf3Marker::from_u8(byte).ok_or(AmfError::UnknownMarker(byte))?;

        match marker {
            Amf3Marker::Undefined => Ok(Value::Undefined),
            Amf3Marker::Null => Ok(Value::Null),
            Amf3Marker::False => Ok(Value::Boolean(false)),
            Amf3Marker::True => Ok(Value::Boolean(true)),
            Amf3Marker::Integer => Ok(Value::Integer(self.decode_i29()?)),
            Amf3Marker::Double => Ok(Value::Number(self.read_f64()?)),
            Amf3Marker::String => Ok(Value::String(self.decode_string()?)),
            Amf3Marker::Date => self.decode_date(),
            Amf3Marker::Array => self.decode_array(arena),
            Amf3Marker::Object => self.decode_object(arena),
            _ => Err(AmfError::UnsupportedAmf3Marker(marker)),
        }
    }

    fn complex_ref(&self, index: usize) -> Result<Value> {
        self.complex
            .get(index)
            .cloned()
            .ok_or(AmfError::DanglingReference { index })
    }

    fn decode_date(&mut self) -> Result<Value> {
        let prefix = self.decode_u29()?;

        if prefix & 1 == 0 {
            return self.complex_ref((prefix >> 1) as usize);
        }

        let value = Value::Date(self.read_f64()?);
        self.complex.push(value.clone());
        Ok(value)
    }

    fn decode_array(&mut self, arena: &mut ValueArena) -> Result<Value> {
        let prefix = self.decode_u29()?;

        if prefix & 1 == 0 {
            return self.complex_ref((prefix >> 1) as usize);
        }

        let handle = arena.alloc_array(Vec::new());
        self.complex.push(Value::Array(handle));

        let len = (prefix >> 1) as usize;

        // associative part
        let key = self.decode_string()?;
        assert!(key.is_empty(), "associative array part must be empty");

        // dense part
        for _ in 0..len {
            let value = self.decode_value(arena)?;
            arena.array_mut(handle).push(value);
        }

        Ok(Value::Array(handle))
    }

    fn decode_object(&mut self, arena: &mut ValueArena) -> Result<Value> {
        let prefix = self.decode_u29()?;

        if prefix & 0x01 == 0 {
            return self.complex_ref((prefix >> 1) as usize);
        }

        let handle = arena.alloc_object(Object::default());
        self.complex.push(Value::Object(handle));

        let traits = if prefix & 0x02 != 0 {
            // inline trait definition
            let externalizable = prefix & 0x04 != 0;
            let dynamic = prefix & 0x08 != 0;
            let count = (prefix >> 4) as usize;

            let name = self.decode_string()?;
            let mut properties = Vec::new();
            for _ in 0..count {
                properties.push(self.decode_string()?);
            }

            let traits = Traits {
                name,
                dynamic,
                externalizable,
                properties,
            };
            self.traits.push(traits.clone());
            traits
        } else {
            let index = (prefix >> 2) as usize;
            self.traits
                .get(index)
                .cloned()
                .ok_or(AmfError::DanglingReference { index })?
        };

        {
            let object = arena.object_mut(handle);
            object.name = traits.name.clone();
            object.dynamic = traits.dynamic;
            object.externalizable = traits.externalizable;
            object.sealed_properties = traits.properties.clone();
        }

        if traits.externalizable {
            match traits.name.as_str() {
                ARRAY_COLLECTION => {
                    let source = self.decode_value(arena)?;
                    arena.object_mut(handle).members.insert("source".to_owned(), source);
                }
                name => return Err(AmfError::UnsupportedExternalizable(name.to_owned())),
            }
        } else {
            for property in &traits.properties {
                assert!(!property.starts_with('@'), "reserved property name: {property}");
                let value = self.decode_value(arena)?;
                arena.object_mut(handle).members.insert(property.clone(), value);
            }

            if traits.dynamic {
                loop {
                    let key = self.decode_string()?;
                    if key.is_empty() {
                        break;
                    }
                    assert!(!key.starts_with('@'), "reserved member key: {key}");

                    let value = self.decode_value(arena)?;
                    arena.object_mut(handle).members.insert(key, value);
                }
            }
        }

        Ok(Value::Object(handle))
    }
}
