//! Block schemas.
//!
//! Block layouts are declared with the same framework as protocol headers.
//! Length-driven builders size each trailing area from the leading total
//! length, so a block read consumes exactly its declared length — verified
//! against the trailing length copy by [`read_block`].

use std::sync::{Arc, LazyLock};

use crate::error::{Error, PcapNgError};
use crate::field::{Endian, FieldType};
use crate::header::{Builder, FieldDef, Header, Registry, Schema};

use super::{align32, BOM_MAGIC, EPB_TYPE, IDB_TYPE, SECTION_LEN_UNDEFINED, SHB_TYPE, SPB_TYPE};

pub const SHB_KIND: &str = "PcapNG::SHB";
pub const IDB_KIND: &str = "PcapNG::IDB";
pub const EPB_KIND: &str = "PcapNG::EPB";
pub const SPB_KIND: &str = "PcapNG::SPB";
pub const UNKNOWN_KIND: &str = "PcapNG::Unknown";

static SHB: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(SHB_KIND, "Section Header Block").with_endian(Endian::Little);
    s.define_field(FieldDef::new("type", FieldType::u32()).with_default(SHB_TYPE))
        .define_field(FieldDef::new("block_len", FieldType::u32()).with_default(28u32))
        .define_field(FieldDef::new("magic", FieldType::u32()).with_default(BOM_MAGIC))
        .define_field(FieldDef::new("version_major", FieldType::u16()).with_default(1u16))
        .define_field(FieldDef::new("version_minor", FieldType::u16()))
        .define_field(
            FieldDef::new("section_len", FieldType::u64()).with_default(SECTION_LEN_UNDEFINED),
        )
        .define_field(
            FieldDef::new("options", FieldType::VarBytes).with_builder(Builder::Func(shb_options)),
        )
        .define_field(FieldDef::new("block_len2", FieldType::u32()).with_default(28u32));
    Arc::new(s)
});

static IDB: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(IDB_KIND, "Interface Description Block").with_endian(Endian::Little);
    s.define_field(FieldDef::new("type", FieldType::u32()).with_default(IDB_TYPE))
        .define_field(FieldDef::new("block_len", FieldType::u32()).with_default(20u32))
        .define_field(FieldDef::new("link_type", FieldType::u16()).with_default(1u16))
        .define_field(FieldDef::new("reserved", FieldType::u16()))
        .define_field(FieldDef::new("snaplen", FieldType::u32()))
        .define_field(
            FieldDef::new("options", FieldType::VarBytes).with_builder(Builder::Func(idb_options)),
        )
        .define_field(FieldDef::new("block_len2", FieldType::u32()).with_default(20u32));
    Arc::new(s)
});

static EPB: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(EPB_KIND, "Enhanced Packet Block").with_endian(Endian::Little);
    s.define_field(FieldDef::new("type", FieldType::u32()).with_default(EPB_TYPE))
        .define_field(FieldDef::new("block_len", FieldType::u32()).with_default(32u32))
        .define_field(FieldDef::new("interface_id", FieldType::u32()))
        .define_field(FieldDef::new("tsh", FieldType::u32()))
        .define_field(FieldDef::new("tsl", FieldType::u32()))
        .define_field(FieldDef::new("cap_len", FieldType::u32()))
        .define_field(FieldDef::new("orig_len", FieldType::u32()))
        .define_field(
            FieldDef::new("data", FieldType::VarBytes)
                .with_builder(Builder::FieldValue("cap_len")),
        )
        .define_field(
            FieldDef::new("pad", FieldType::VarBytes).with_builder(Builder::Func(epb_pad)),
        )
        .define_field(
            FieldDef::new("options", FieldType::VarBytes).with_builder(Builder::Func(epb_options)),
        )
        .define_field(FieldDef::new("block_len2", FieldType::u32()).with_default(32u32));
    Arc::new(s)
});

static SPB: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(SPB_KIND, "Simple Packet Block").with_endian(Endian::Little);
    s.define_field(FieldDef::new("type", FieldType::u32()).with_default(SPB_TYPE))
        .define_field(FieldDef::new("block_len", FieldType::u32()).with_default(16u32))
        .define_field(FieldDef::new("orig_len", FieldType::u32()))
        .define_field(
            FieldDef::new("data", FieldType::VarBytes).with_builder(Builder::Func(spb_data)),
        )
        .define_field(FieldDef::new("block_len2", FieldType::u32()).with_default(16u32));
    Arc::new(s)
});

static UNKNOWN: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(UNKNOWN_KIND, "Unknown Block").with_endian(Endian::Little);
    s.define_field(FieldDef::new("type", FieldType::u32()))
        .define_field(FieldDef::new("block_len", FieldType::u32()).with_default(12u32))
        .define_field(
            FieldDef::new("body", FieldType::VarBytes)
                .with_builder(Builder::Func(unknown_body)),
        )
        .define_field(FieldDef::new("block_len2", FieldType::u32()).with_default(12u32));
    Arc::new(s)
});

fn shb_options(h: &Header) -> Option<usize> {
    (h.value_u64("block_len")? as usize).checked_sub(28)
}

fn idb_options(h: &Header) -> Option<usize> {
    (h.value_u64("block_len")? as usize).checked_sub(20)
}

fn epb_pad(h: &Header) -> Option<usize> {
    let cap = h.value_u64("cap_len")? as usize;
    Some(align32(cap) - cap)
}

fn epb_options(h: &Header) -> Option<usize> {
    let cap = h.value_u64("cap_len")? as usize;
    (h.value_u64("block_len")? as usize).checked_sub(32 + align32(cap))
}

fn spb_data(h: &Header) -> Option<usize> {
    (h.value_u64("block_len")? as usize).checked_sub(16)
}

fn unknown_body(h: &Header) -> Option<usize> {
    (h.value_u64("block_len")? as usize).checked_sub(12)
}

pub(crate) fn shb_schema() -> Arc<Schema> {
    Arc::clone(&SHB)
}

pub(crate) fn idb_schema() -> Arc<Schema> {
    Arc::clone(&IDB)
}

pub(crate) fn epb_schema() -> Arc<Schema> {
    Arc::clone(&EPB)
}

pub(crate) fn spb_schema() -> Arc<Schema> {
    Arc::clone(&SPB)
}

pub(crate) fn unknown_schema() -> Arc<Schema> {
    Arc::clone(&UNKNOWN)
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SHB));
    reg.register_arc(Arc::clone(&IDB));
    reg.register_arc(Arc::clone(&EPB));
    reg.register_arc(Arc::clone(&SPB));
    reg.register_arc(Arc::clone(&UNKNOWN));
}

/// Read one block with the section's endian and verify its framing:
/// trailing length equals leading length, and the declared length equals
/// the bytes actually consumed (a 32-bit multiple by construction).
pub(crate) fn read_block(
    schema: &Arc<Schema>,
    endian: Endian,
    input: &[u8],
) -> Result<(Header, usize), Error> {
    let mut header = Header::new(Arc::clone(schema));
    header.set_endian(endian);
    let consumed = header.read(input)?;
    let lead = header.value_u64("block_len").unwrap_or(0);
    let trail = header.value_u64("block_len2").unwrap_or(0);
    if lead != trail {
        return Err(PcapNgError::MalformedBlock {
            reason: format!("trailing length {trail} != leading length {lead}"),
        }
        .into());
    }
    if lead as usize != consumed || lead % 4 != 0 {
        return Err(PcapNgError::MalformedBlock {
            reason: format!("declared length {lead} does not frame a {consumed}-byte block"),
        }
        .into());
    }
    Ok((header, consumed))
}

/// Recompute both length copies from the block's current wire size.
pub(crate) fn sync_block_len(header: &mut Header) -> Result<(), Error> {
    // both length fields are 4 bytes; the wire size cannot change here
    let len = header.wire_size() as u64;
    header.set("block_len", len)?;
    header.set("block_len2", len)?;
    Ok(())
}

/// Build an Enhanced Packet Block around captured bytes.
pub(crate) fn build_epb(
    endian: Endian,
    interface_id: u32,
    ts_units: u64,
    data: &[u8],
) -> Result<Header, Error> {
    let mut h = Header::new(epb_schema());
    h.set_endian(endian);
    h.set("interface_id", interface_id)?;
    h.set("tsh", (ts_units >> 32) as u32)?;
    h.set("tsl", (ts_units & 0xffff_ffff) as u32)?;
    h.set("cap_len", data.len() as u32)?;
    h.set("orig_len", data.len() as u32)?;
    h.set("data", data.to_vec())?;
    h.set("pad", vec![0u8; align32(data.len()) - data.len()])?;
    sync_block_len(&mut h)?;
    Ok(h)
}
