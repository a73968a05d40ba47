//! AMF packet framing.
//!
//! A packet is a length-prefixed envelope of headers and messages. The
//! framing fields are written in AMF0 style (big-endian fixed-width
//! integers, u16-length-prefixed strings); header values are AMF0 and
//! message bodies are always AMF3, introduced by the `avmplus-object`
//! marker. Every header and message gets fresh codec instances, so
//! reference tables never leak across them.

use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::amf0::{Amf0Decoder, Amf0Encoder, Amf0Marker};
use crate::amf3::Amf3Encoder;
use crate::error::{AmfError, Result};
use crate::value::{Value, ValueArena};

// The length fields are sentinels: upstream producers are not guaranteed to
// populate them meaningfully, so they are written as all-ones and read back
// without validation.
const UNKNOWN_LENGTH: u32 = 0xFFFF_FFFF;

/// A packet header: a named out-of-band value.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value, encoded in AMF0.
    pub value: Value,
    /// If true, the receiver must process this header or reject the packet.
    pub must_understand: bool,
}

impl Header {
    /// Create a header that the receiver is not required to understand.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Header {
            name: name.into(),
            value,
            must_understand: false,
        }
    }

    fn encode<W>(&self, arena: &ValueArena, writer: &mut W) -> Result<()>
    where
        W: io::Write,
    {
        let mut encoder = Amf0Encoder::new(writer);
        encoder.encode_raw_string(&self.name)?;
        encoder.encode_raw_u8(self.must_understand as u8)?;
        encoder.encode_raw_u32(UNKNOWN_LENGTH)?;
        encoder.encode_value(arena, &self.value)
    }

    fn decode<B>(arena: &mut ValueArena, buf: &mut B) -> Result<Header>
    where
        B: bytes::Buf,
    {
        let mut decoder = Amf0Decoder::new(buf);
        let name = decoder.read_raw_string()?;
        let must_understand = decoder.read_u8()? != 0;
        // reserved length, ignored
        decoder.read_u32()?;
        let value = decoder.decode_value(arena)?;

        Ok(Header {
            name,
            value,
            must_understand,
        })
    }
}

/// A packet message: a routed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The operation the message targets.
    pub target_uri: String,
    /// Where the response should be delivered.
    pub response_uri: String,
    /// Message body, always encoded in AMF3.
    pub value: Value,
}

impl Message {
    /// Create a message.
    pub fn new(target_uri: impl Into<String>, response_uri: impl Into<String>, value: Value) -> Self {
        Message {
            target_uri: target_uri.into(),
            response_uri: response_uri.into(),
            value,
        }
    }

    fn encode<W>(&self, arena: &ValueArena, writer: &mut W) -> Result<()>
    where
        W: io::Write,
    {
        let mut encoder = Amf0Encoder::new(&mut *writer);
        encoder.encode_raw_string(&self.target_uri)?;
        encoder.encode_raw_string(&self.response_uri)?;
        encoder.encode_raw_u32(UNKNOWN_LENGTH)?;
        encoder.encode_raw_u8(Amf0Marker::AvmPlusObject as u8)?;

        let mut encoder = Amf3Encoder::new(&mut *writer);
        encoder.encode_value(arena, &self.value)
    }

    fn decode<B>(arena: &mut ValueArena, buf: &mut B) -> Result<Message>
    where
        B: bytes::Buf,
    {
        let mut decoder = Amf0Decoder::new(buf);
        let target_uri = decoder.read_raw_string()?;
        let response_uri = decoder.read_raw_string()?;
        // reserved length, ignored
        decoder.read_u32()?;
        // the avmplus-object marker dispatches into AMF3
        let value = decoder.decode_value(arena)?;

        Ok(Message {
            target_uri,
            response_uri,
            value,
        })
    }
}

/// An AMF packet: a version number plus ordered headers and messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Packet version. Zero in practice.
    pub version: u16,
    /// Out-of-band headers.
    pub headers: Vec<Header>,
    /// Message bodies.
    pub messages: Vec<Message>,
}

impl Packet {
    /// Create a version-0 packet.
    pub fn new(headers: Vec<Header>, messages: Vec<Message>) -> Self {
        Packet {
            version: 0,
            headers,
            messages,
        }
    }

    /// Encode the packet into a given writer.
    pub fn encode<W>(&self, arena: &ValueArena, writer: &mut W) -> Result<()>
    where
        W: io::Write,
    {
        writer.write_u16::<BigEndian>(self.version)?;

        writer.write_u16::<BigEndian>(self.headers.len().try_into()?)?;
        for header in &self.headers {
            header.encode(arena, writer)?;
        }

        writer.write_u16::<BigEndian>(self.messages.len().try_into()?)?;
        for message in &self.messages {
            message.encode(arena, writer)?;
        }

        Ok(())
    }

    /// Encode the packet into a new byte vector.
    pub fn to_bytes(&self, arena: &ValueArena) -> Result<Vec<u8>> {
        let mut writer = Vec::new();
        self.encode(arena, &mut writer)?;
        Ok(writer)
    }

    /// Decode a packet, allocating arrays and objects in the given arena.
    pub fn decode<B>(arena: &mut ValueArena, buf: &mut B) -> Result<Packet>
    where
        B: bytes::Buf,
    {
        let version = read_u16(buf)?;

        let header_count = read_u16(buf)?;
        let mut headers = Vec::with_capacity(header_count as usize);
        for _ in 0..header_count {
            headers.push(Header::decode(arena, buf)?);
        }

        let message_count = read_u16(buf)?;
        let mut messages = Vec::with_capacity(message_count as usize);
        for _ in 0..message_count {
            messages.push(Message::decode(arena, buf)?);
        }

        Ok(Packet {
            version,
            headers,
            messages,
        })
    }

    /// Decode a packet from a byte slice.
    pub fn from_bytes(arena: &mut ValueArena, mut bytes: &[u8]) -> Result<Packet> {
        Packet::decode(arena, &mut bytes)
    }
}

fn read_u16<B: bytes::Buf>(buf: &mut B) -> Result<u16> {
    let remaining = buf.remaining();
    if remaining < 2 {
        return Err(AmfError::UnexpectedEof { needed: 2, remaining });
    }
    Ok(buf.get_u16())
}
