//! TCP header.

use std::sync::{Arc, LazyLock};

use crate::field::FieldType;
use crate::header::{Builder, FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::{checksum, ipv4, ipv6};

/// Kind identifier used in binding tables.
pub const KIND: &str = "TCP";

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "TCP");
    s.define_field(FieldDef::new("src_port", FieldType::u16()))
        .define_field(FieldDef::new("dst_port", FieldType::u16()))
        .define_field(FieldDef::new("seq", FieldType::u32()))
        .define_field(FieldDef::new("ack", FieldType::u32()))
        // data offset 5 words, no flags
        .define_field(FieldDef::new("offset_flags", FieldType::u16()).with_default(0x5000u16))
        .define_field(FieldDef::new("window", FieldType::u16()))
        .define_field(FieldDef::new("checksum", FieldType::u16()))
        .define_field(FieldDef::new("urgent", FieldType::u16()))
        .define_field(
            FieldDef::new("options", FieldType::VarBytes).with_builder(Builder::Func(options_len)),
        );
    s.define_bit_fields_on("offset_flags", &[("data_offset", 4), ("reserved", 3), ("flags", 9)]);
    s.set_checksum("checksum", tcp_checksum);
    Arc::new(s)
});

fn options_len(h: &Header) -> Option<usize> {
    let words = h.bit_field("data_offset").ok()? as usize;
    (words * 4).checked_sub(20)
}

fn tcp_checksum(stack: &[Header], idx: usize, own: &[u8], inner: &[u8]) -> u16 {
    checksum::transport(stack, idx, own, inner, IP_PROTO_TCP)
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
    reg.bind(Binding::new(ipv4::KIND, KIND).eq("protocol", IP_PROTO_TCP));
    reg.bind(Binding::new(ipv6::KIND, KIND).eq("next", IP_PROTO_TCP));
}
