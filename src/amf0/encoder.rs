//! AMF0 encoder.

use std::collections::HashMap;
use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use super::Amf0Marker;
use crate::error::Result;
use crate::value::{Handle, Value, ValueArena};

/// AMF0 encoder.
///
/// Holds the reference table for one encode session: arrays and objects are
/// registered on first encounter and written as back-references afterwards,
/// so shared and cyclic structures terminate. Reusing the encoder across
/// calls accumulates the table.
#[derive(Debug)]
pub struct Amf0Encoder<W> {
    writer: W,
    references: HashMap<Handle, usize>,
}

impl<W> Amf0Encoder<W> {
    /// Create a new encoder from a writer.
    pub fn new(writer: W) -> Self {
        Amf0Encoder {
            writer,
            references: HashMap::new(),
        }
    }
}

impl<W> Amf0Encoder<W>
where
    W: io::Write,
{
    /// Encode a [`Value`] of the given arena.
    pub fn encode_value(&mut self, arena: &ValueArena, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.encode_null(),
            Value::Undefined => self.encode_undefined(),
            Value::Boolean(value) => self.encode_boolean(*value),
            Value::Number(value) => self.encode_number(*value),
            // AMF0 has no integer marker
            Value::Integer(value) => self.encode_number(*value as f64),
            Value::Date(epoch_ms) => self.encode_date(*epoch_ms),
            Value::String(value) => self.encode_string(value),
            Value::Array(handle) => self.encode_array(arena, *handle),
            Value::Object(handle) => self.encode_object(arena, *handle),
        }
    }

    /// Encode AMF0 Null.
    pub fn encode_null(&mut self) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Null as u8)?;
        Ok(())
    }

    /// Encode AMF0 Undefined.
    pub fn encode_undefined(&mut self) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Undefined as u8)?;
        Ok(())
    }

    /// Encode a [`bool`] as an AMF0 boolean value.
    pub fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Boolean as u8)?;
        self.writer.write_u8(value as u8)?;
        Ok(())
    }

    /// Encode a [`f64`] as an AMF0 number value.
    pub fn encode_number(&mut self, value: f64) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Number as u8)?;
        self.writer.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    /// Encode an epoch-milliseconds timestamp as an AMF0 date value.
    pub fn encode_date(&mut self, epoch_ms: f64) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Date as u8)?;
        self.writer.write_f64::<BigEndian>(epoch_ms)?;
        // timezone field, always zero on the wire
        self.writer.write_i16::<BigEndian>(0)?;
        Ok(())
    }

    /// Encode a [`&str`](str) as an AMF0 string value.
    ///
    /// Switches to a long string when the UTF-8 byte length exceeds `u16`.
    pub fn encode_string(&mut self, value: &str) -> Result<()> {
        let len = value.len();

        if len <= (u16::MAX as usize) {
            self.writer.write_u8(Amf0Marker::String as u8)?;
            self.writer.write_u16::<BigEndian>(len as u16)?;
        } else {
            // This try_into fails if the length is greater than u32::MAX
            let len: u32 = len.try_into()?;

            self.writer.write_u8(Amf0Marker::LongString as u8)?;
            self.writer.write_u32::<BigEndian>(len)?;
        }

        self.writer.write_all(value.as_bytes())?;

        Ok(())
    }

    /// Encode an array of the given arena as an AMF0 strict array, or as a
    /// back-reference if this encoder has already written it.
    pub fn encode_array(&mut self, arena: &ValueArena, handle: Handle) -> Result<()> {
        if let Some(&index) = self.references.get(&handle) {
            return self.encode_reference(index);
        }
        self.register(handle);

        let items = arena.array(handle);

        self.writer.write_u8(Amf0Marker::StrictArray as u8)?;
        self.writer.write_u32::<BigEndian>(items.len().try_into()?)?;

        for item in items {
            self.encode_value(arena, item)?;
        }

        Ok(())
    }

    /// Encode an object of the given arena as an AMF0 object or typed
    /// object, or as a back-reference if this encoder has already written it.
    ///
    /// # Panics
    ///
    /// Panics if a member key starts with the reserved `@` sigil.
    pub fn encode_object(&mut self, arena: &ValueArena, handle: Handle) -> Result<()> {
        if let Some(&index) = self.references.get(&handle) {
            return self.encode_reference(index);
        }
        self.register(handle);

        let object = arena.object(handle);

        if !object.name.is_empty() {
            self.writer.write_u8(Amf0Marker::TypedObject as u8)?;
            self.encode_raw_string(&object.name)?;
        } else {
            self.writer.write_u8(Amf0Marker::Object as u8)?;
        }

        for (key, value) in &object.members {
            assert!(!key.starts_with('@'), "reserved member key: {key}");
            self.encode_raw_string(key)?;
            self.encode_value(arena, value)?;
        }

        self.encode_raw_string("")?;
        self.writer.write_u8(Amf0Marker::ObjectEnd as u8)?;

        Ok(())
    }

    fn encode_reference(&mut self, index: usize) -> Result<()> {
        self.writer.write_u8(Amf0Marker::Reference as u8)?;
        self.writer.write_u16::<BigEndian>(index.try_into()?)?;
        Ok(())
    }

    fn register(&mut self, handle: Handle) {
        let index = self.references.len();
        self.references.insert(handle, index);
    }

    // Raw field helpers used by the packet framing, which writes its scalar
    // fields in AMF0 style without markers.

    pub(crate) fn encode_raw_string(&mut self, value: &str) -> Result<()> {
        self.writer.write_u16::<BigEndian>(value.len().try_into()?)?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    pub(crate) fn encode_raw_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        Ok(())
    }

    pub(crate) fn encode_raw_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<BigEndian>(value)?;
        Ok(())
    }
}
