//! Header schema framework.
//!
//! This module provides:
//! - [`Schema`] - declarative field list for one header kind
//! - [`Header`] - a mutable instance of a schema, with field-by-field
//!   parse/serialize and get/set-by-name
//! - [`Registry`] - the process-wide (or injected) table of header kinds
//!   and bindings
//!
//! Reading proceeds field-by-field in declared order; each field's builder
//! (if present) is evaluated against the already-materialised fields to size
//! variable-length types. A schema with a subkind hook re-parses itself as
//! the resolved subkind after its base fields are read.

mod registry;
mod schema;

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use smallvec::SmallVec;

use crate::error::{Error, FieldError};
use crate::field::{enum_name, Endian, Value};

pub use registry::Registry;
pub use schema::{
    BitGroup, BitSubField, Builder, BuilderFn, Calc, ChecksumFn, ChecksumSpec, FieldDef, Schema,
    SubkindFn, ValidateFn,
};

/// A header instance: a schema plus one value per declared field.
///
/// Two headers with identical field sequences are not interchangeable —
/// identity is the schema's kind name, not the layout.
#[derive(Debug, Clone)]
pub struct Header {
    schema: Arc<Schema>,
    endian: Endian,
    values: SmallVec<[Value; 16]>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.endian == other.endian
            && self.values == other.values
    }
}

impl Header {
    /// New instance with every field at its declared default.
    pub fn new(schema: Arc<Schema>) -> Self {
        let endian = schema.default_endian();
        let values = schema
            .fields()
            .iter()
            .map(|d| d.default.clone().unwrap_or_else(|| d.ty.default_value()))
            .collect();
        Self {
            schema,
            endian,
            values,
        }
    }

    /// Stable kind identifier (usable in binding tables).
    pub fn name(&self) -> &'static str {
        self.schema.name()
    }

    /// Human-readable protocol name.
    pub fn display_name(&self) -> &'static str {
        self.schema.display_name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Override the instance endian (PCAP-NG sections).
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.schema
            .field_index(field)
            .map(|idx| &self.values[idx])
    }

    /// Unsigned integer value of a field.
    pub fn value_u64(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_u64)
    }

    /// Set a field value by name, coercing the usual input forms (integers,
    /// enum names, address strings, raw bytes).
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let schema = Arc::clone(&self.schema);
        let idx = schema
            .field_index(field)
            .ok_or_else(|| FieldError::UnknownField {
                header: schema.name(),
                field: field.to_string(),
            })?;
        let def = &schema.fields()[idx];
        let value = def.ty.coerce(def.name, value.into(), def.names)?;
        self.values[idx] = value;
        Ok(())
    }

    /// Render a field for humans: the enum name when one is mapped, the raw
    /// value otherwise.
    pub fn human(&self, field: &str) -> Option<String> {
        let idx = self.schema.field_index(field)?;
        let def = &self.schema.fields()[idx];
        let value = &self.values[idx];
        if let (Some(map), Some(raw)) = (def.names, value.as_u64()) {
            if let Some(name) = enum_name(map, raw) {
                return Some(name.to_string());
            }
        }
        Some(value.to_string())
    }

    /// Parse this header from the front of `buf`, returning the number of
    /// bytes consumed. When the schema has a subkind hook and it resolves,
    /// the instance becomes the subkind and the buffer is re-parsed under
    /// its layout.
    pub fn read(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let consumed = self.read_fields(buf)?;
        if let Some(resolver) = self.schema.subkind {
            if let Some(sub) = resolver(self) {
                if sub.name() != self.schema.name() {
                    let endian = self.endian;
                    *self = Header::new(sub);
                    self.endian = endian;
                    return self.read_fields(buf);
                }
            }
        }
        Ok(consumed)
    }

    fn read_fields(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let schema = Arc::clone(&self.schema);
        let mut cursor = 0usize;
        for (idx, def) in schema.fields().iter().enumerate() {
            let param = self.builder_param(def)?;
            let (value, n) = def.ty.read(def.name, &buf[cursor..], self.endian, param)?;
            self.values[idx] = value;
            cursor += n;
        }
        Ok(cursor)
    }

    fn builder_param(&self, def: &FieldDef) -> Result<Option<usize>, Error> {
        match &def.builder {
            None => Ok(None),
            Some(Builder::FieldValue(field)) => {
                let v = self.value_u64(field).ok_or_else(|| FieldError::InvalidValue {
                    field: def.name.to_string(),
                    reason: format!("builder field {field} is not an unsigned integer"),
                })?;
                Ok(Some(v as usize))
            }
            Some(Builder::Func(f)) => {
                let v = f(self).ok_or_else(|| FieldError::InvalidValue {
                    field: def.name.to_string(),
                    reason: "builder could not size field".to_string(),
                })?;
                Ok(Some(v))
            }
        }
    }

    /// Append the header's wire image to `out`.
    pub fn write(&self, out: &mut BytesMut) {
        for (def, value) in self.schema.fields().iter().zip(&self.values) {
            def.ty.write(value, self.endian, out);
        }
    }

    /// The header's wire image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(self.wire_size());
        self.write(&mut out);
        out.to_vec()
    }

    /// Current wire length: the sum of each field's wire length.
    pub fn wire_size(&self) -> usize {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(def, value)| def.ty.wire_size(value))
            .sum()
    }

    /// Run the schema's validate hook ("parses cleanly"); true when absent.
    pub fn is_valid(&self) -> bool {
        self.schema.validate.map_or(true, |f| f(self))
    }

    /// Read a bit-group sub-field of its host integer.
    pub fn bit_field(&self, name: &str) -> Result<u64, Error> {
        let (idx, shift, width) = self.locate_bit(name)?;
        let host = self.values[idx].as_u64().unwrap_or(0);
        Ok((host >> shift) & mask(width))
    }

    /// Write a bit-group sub-field, leaving the host's other bits intact.
    pub fn set_bit_field(&mut self, name: &str, value: u64) -> Result<(), Error> {
        let (idx, shift, width) = self.locate_bit(name)?;
        if value > mask(width) {
            return Err(FieldError::InvalidValue {
                field: name.to_string(),
                reason: format!("{value} out of range for a {width}-bit sub-field"),
            }
            .into());
        }
        let schema = Arc::clone(&self.schema);
        let def = &schema.fields()[idx];
        let host = self.values[idx].as_u64().unwrap_or(0);
        let new = (host & !(mask(width) << shift)) | (value << shift);
        self.values[idx] = def.ty.coerce(def.name, Value::U64(new), None)?;
        Ok(())
    }

    /// Boolean view of a width-1 sub-field (or "any bit set" for wider ones).
    pub fn is_set(&self, name: &str) -> Result<bool, Error> {
        Ok(self.bit_field(name)? != 0)
    }

    fn locate_bit(&self, name: &str) -> Result<(usize, u32, u32), Error> {
        for group in self.schema.bit_groups() {
            let Some(host_idx) = self.schema.field_index(group.host) else {
                continue;
            };
            let Some(width) = schema::int_width(&self.schema.fields()[host_idx].ty) else {
                continue;
            };
            let host_bits = width.bits();
            let mut offset = 0;
            for sub in &group.subs {
                if sub.name == name {
                    return Ok((host_idx, host_bits - offset - sub.width, sub.width));
                }
                offset += sub.width;
            }
        }
        Err(FieldError::UnknownBitField {
            header: self.schema.name(),
            field: name.to_string(),
        }
        .into())
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.display_name())?;
        for def in self.schema.fields() {
            if let Some(h) = self.human(def.name) {
                write!(f, " {}={}", def.name, h)?;
            }
        }
        Ok(())
    }
}
