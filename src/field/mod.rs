//! Primitive field types.
//!
//! A header is an ordered sequence of typed fields; this module provides the
//! types those fields can take. Every [`FieldType`] knows how to read itself
//! from a byte buffer, write itself back, report its wire size for a given
//! value, and produce a default value. Variable-length types (strings, byte
//! runs, arrays) are parameterised at read time by the enclosing header's
//! builder callbacks.
//!
//! Values are owned ([`Value`]) so headers can be freely mutated between
//! parse and serialize.

mod ty;
mod value;

pub use ty::{enum_name, enum_value, FieldType, IntWidth, NameMap};
pub use value::{Endian, MacAddr, Value};
