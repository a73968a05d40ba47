//! A pure-rust implementation of the AMF0 and AMF3 encoders and decoders,
//! plus the packet framing that carries both formats inside one envelope.
//!
//! Values form graphs, not trees: arrays and objects live in a [`ValueArena`]
//! and are referred to by [`Handle`], so shared and cyclic structures
//! round-trip through the reference tables both formats define.
//!
//! # Limitations
//!
//! - Does not support the reserved AMF0 markers (movie clips, ECMA arrays,
//!   recordsets, XML documents).
//! - Does not support the AMF3 vector, dictionary, byte-array, and XML
//!   markers.
//! - The only supported externalizable class is
//!   `flex.messaging.io.ArrayCollection`.
//!
//! # Examples
//!
//! ```rust
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use amf::{Value, ValueArena, amf3};
//!
//! let mut arena = ValueArena::new();
//! let array = arena.alloc_array(vec![Value::Integer(1), Value::from("two")]);
//!
//! let bytes = amf3::to_bytes(&arena, &Value::Array(array))?;
//!
//! let mut decoded_arena = ValueArena::new();
//! let decoded = amf3::from_bytes(&mut decoded_arena, &bytes)?;
//! assert!(arena.value_eq(&Value::Array(array), &decoded_arena, &decoded));
//! # Ok(())
//! # }
//! # test().expect("test failed");
//! ```
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod amf0;
pub mod amf3;
pub mod error;
pub mod packet;
pub mod value;

pub use error::{AmfError, Result};
pub use packet::{Header, Message, Packet};
pub use value::{Complex, Handle, Object, Value, ValueArena};
