//! IPv6 header.

use std::sync::{Arc, LazyLock};

use crate::field::FieldType;
use crate::header::{Calc, FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::{ethernet, ipv4};

/// Kind identifier used in binding tables.
pub const KIND: &str = "IPv6";

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "IPv6");
    s.define_field(FieldDef::new("vtcfl", FieldType::u32()).with_default(0x6000_0000u32))
        .define_field(
            FieldDef::new("length", FieldType::u16()).with_calc(Calc::PayloadLength {
                include_header: false,
            }),
        )
        .define_field(FieldDef::new("next", FieldType::u8()).with_names(ipv4::PROTOCOLS))
        .define_field(FieldDef::new("hop_limit", FieldType::u8()).with_default(64u8))
        .define_field(FieldDef::new("src_ip", FieldType::Ipv6))
        .define_field(FieldDef::new("dst_ip", FieldType::Ipv6));
    s.define_bit_fields_on("vtcfl", &[("version", 4), ("tclass", 8), ("flow", 20)]);
    s.set_validate(is_ipv6);
    Arc::new(s)
});

fn is_ipv6(h: &Header) -> bool {
    h.bit_field("version").is_ok_and(|v| v == 6)
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
    reg.bind(Binding::new(ethernet::KIND, KIND).eq("ethertype", 0x86DDu16));
}
