//! Header kind declarations.
//!
//! A header kind is a value-level schema: an ordered list of [`FieldDef`]s
//! plus bit groups and per-kind hooks. The schema is the single source of
//! truth — parse and serialize loops walk it, and instances ([`Header`])
//! store one value per declared field. Schemas are built during static
//! initialization and are immutable once registered, so declaration mistakes
//! (duplicate names, unknown targets, bad defaults) panic at load.

use std::sync::Arc;

use crate::field::{Endian, FieldType, IntWidth, NameMap, Value};

use super::Header;

/// Sizes a variable-length field at read time, against the
/// already-materialised earlier fields. `None` means the field cannot be
/// sized (malformed input).
pub type BuilderFn = fn(&Header) -> Option<usize>;

/// Inspects a just-read header and names the subkind schema its tail should
/// be re-parsed as (discriminator dispatch).
pub type SubkindFn = fn(&Header) -> Option<Arc<Schema>>;

/// "Parses cleanly" predicate used by the link-type fallback guess.
pub type ValidateFn = fn(&Header) -> bool;

/// Computes a checksum for the header at `idx` of `stack`. `own` is the
/// header's wire image with the checksum field zeroed, `inner` the
/// concatenated wire image of everything stacked after it plus the payload.
pub type ChecksumFn = fn(stack: &[Header], idx: usize, own: &[u8], inner: &[u8]) -> u16;

/// How a variable-length field learns its size (bytes) or count (elements).
#[derive(Debug, Clone)]
pub enum Builder {
    /// The integer value of an earlier field.
    FieldValue(&'static str),
    /// Arbitrary function of the already-parsed fields.
    Func(BuilderFn),
}

/// Declarative reconciliation applied by `Packet::recalc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calc {
    /// Element count of the named array field.
    CountOf(&'static str),
    /// Wire length in bytes of the named sibling field.
    LengthOf(&'static str),
    /// Bytes following this header in the packet, optionally plus the
    /// header's own wire size.
    PayloadLength { include_header: bool },
}

/// A typed, named slot in a header schema.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: Option<Value>,
    pub names: Option<NameMap>,
    pub builder: Option<Builder>,
    pub calc: Option<Calc>,
}

impl FieldDef {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            default: None,
            names: None,
            builder: None,
            calc: None,
        }
    }

    /// Default value for new instances. Accepts the same input forms as
    /// `Header::set`; canonicalised when the field is defined.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a name <-> value map (enumerated integer field).
    pub fn with_names(mut self, names: NameMap) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_builder(mut self, builder: Builder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_calc(mut self, calc: Calc) -> Self {
        self.calc = Some(calc);
        self
    }

    /// Replace the default (canonicalised immediately). For use through
    /// `Schema::update_field`.
    pub fn set_default(&mut self, value: impl Into<Value>) {
        match self.ty.coerce(self.name, value.into(), self.names) {
            Ok(v) => self.default = Some(v),
            Err(e) => panic!("bad default for field {}: {e}", self.name),
        }
    }

    /// Replace the enum map. For use through `Schema::update_field`.
    pub fn set_names(&mut self, names: NameMap) {
        self.names = Some(names);
    }
}

/// One sub-field of a bit group.
#[derive(Debug, Clone)]
pub struct BitSubField {
    pub name: &'static str,
    pub width: u32,
}

/// Decomposition of an integer host field into contiguous bit ranges,
/// most-significant-first.
#[derive(Debug, Clone)]
pub struct BitGroup {
    pub host: &'static str,
    pub subs: Vec<BitSubField>,
}

/// Checksum declaration: which field receives the value, and how to compute
/// it.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumSpec {
    pub field: &'static str,
    pub compute: ChecksumFn,
}

/// Ordered field list plus metadata for one header kind.
#[derive(Debug, Clone)]
pub struct Schema {
    name: &'static str,
    display_name: &'static str,
    endian: Endian,
    fields: Vec<FieldDef>,
    bit_groups: Vec<BitGroup>,
    pub(crate) checksum: Option<ChecksumSpec>,
    pub(crate) subkind: Option<SubkindFn>,
    pub(crate) validate: Option<ValidateFn>,
}

impl Schema {
    /// New empty schema. `name` is the stable kind identifier used in
    /// binding tables (`"IP"`, `"TFTP::ACK"`); `display_name` is for humans.
    /// Integer fields default to big endian (network order).
    pub fn new(name: &'static str, display_name: &'static str) -> Self {
        Self {
            name,
            display_name,
            endian: Endian::Big,
            fields: Vec::new(),
            bit_groups: Vec::new(),
            checksum: None,
            subkind: None,
            validate: None,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn display_name(&self) -> &'static str {
        self.display_name
    }

    pub fn default_endian(&self) -> Endian {
        self.endian
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    pub fn bit_groups(&self) -> &[BitGroup] {
        &self.bit_groups
    }

    /// Append a field.
    pub fn define_field(&mut self, def: FieldDef) -> &mut Self {
        self.insert_field(self.fields.len(), def)
    }

    /// Insert a field immediately before `target`.
    pub fn define_field_before(&mut self, target: &str, def: FieldDef) -> &mut Self {
        let idx = self.require_index(target);
        self.insert_field(idx, def)
    }

    /// Insert a field immediately after `target`.
    pub fn define_field_after(&mut self, target: &str, def: FieldDef) -> &mut Self {
        let idx = self.require_index(target);
        self.insert_field(idx + 1, def)
    }

    /// Remove a field. Bit groups hosted on it go with it.
    pub fn delete_field(&mut self, name: &str) -> &mut Self {
        let idx = self.require_index(name);
        self.fields.remove(idx);
        self.bit_groups.retain(|g| g.host != name);
        self
    }

    /// Mutable access to a field declaration, for changing its default or
    /// enum map.
    pub fn update_field(&mut self, name: &str) -> &mut FieldDef {
        let idx = self.require_index(name);
        &mut self.fields[idx]
    }

    /// Declare a bit group on an integer host field, most-significant-first.
    /// Widths must sum to the host's bit width.
    pub fn define_bit_fields_on(
        &mut self,
        host: &'static str,
        subs: &[(&'static str, u32)],
    ) -> &mut Self {
        let host_bits = match self.field(host).map(|f| &f.ty) {
            Some(FieldType::Int { width, .. }) => width.bits(),
            Some(_) => panic!("schema {}: bit group host {host} is not an integer", self.name),
            None => panic!("schema {}: no field named {host}", self.name),
        };
        let total: u32 = subs.iter().map(|(_, w)| *w).sum();
        if total != host_bits {
            panic!(
                "schema {}: bit widths on {host} sum to {total}, host has {host_bits} bits",
                self.name
            );
        }
        for (sub, _) in subs {
            if self
                .bit_groups
                .iter()
                .flat_map(|g| g.subs.iter())
                .any(|s| s.name == *sub)
            {
                panic!("schema {}: duplicate bit field {sub}", self.name);
            }
        }
        self.bit_groups.push(BitGroup {
            host,
            subs: subs
                .iter()
                .map(|&(name, width)| BitSubField { name, width })
                .collect(),
        });
        self
    }

    /// Declare the checksum field and its compute hook.
    pub fn set_checksum(&mut self, field: &'static str, compute: ChecksumFn) -> &mut Self {
        self.checksum = Some(ChecksumSpec { field, compute });
        self
    }

    /// Install the subkind re-parse hook (discriminator dispatch).
    pub fn set_subkind(&mut self, resolver: SubkindFn) -> &mut Self {
        self.subkind = Some(resolver);
        self
    }

    /// Install the "parses cleanly" predicate for link-type guessing.
    pub fn set_validate(&mut self, validate: ValidateFn) -> &mut Self {
        self.validate = Some(validate);
        self
    }

    /// Clone this schema's layout under a new kind name, dropping the
    /// subkind and validate hooks. Subkinds start from here and then apply
    /// `delete_field`/`define_field*`.
    pub fn derive(&self, name: &'static str, display_name: &'static str) -> Schema {
        Schema {
            name,
            display_name,
            endian: self.endian,
            fields: self.fields.clone(),
            bit_groups: self.bit_groups.clone(),
            checksum: self.checksum,
            subkind: None,
            validate: None,
        }
    }

    fn insert_field(&mut self, idx: usize, mut def: FieldDef) -> &mut Self {
        if self.has_field(def.name) {
            panic!("schema {}: duplicate field {}", self.name, def.name);
        }
        if let Some(default) = def.default.take() {
            match def.ty.coerce(def.name, default, def.names) {
                Ok(v) => def.default = Some(v),
                Err(e) => panic!("schema {}: bad default for {}: {e}", self.name, def.name),
            }
        }
        self.fields.insert(idx, def);
        self
    }

    fn require_index(&self, name: &str) -> usize {
        match self.field_index(name) {
            Some(idx) => idx,
            None => panic!("schema {}: no field named {name}", self.name),
        }
    }
}

// Widths used when locating bit fields.
pub(crate) fn int_width(ty: &FieldType) -> Option<IntWidth> {
    match ty {
        FieldType::Int { width, .. } => Some(*width),
        _ => None,
    }
}
