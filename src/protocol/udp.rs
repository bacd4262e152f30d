//! UDP header.

use std::sync::{Arc, LazyLock};

use crate::field::FieldType;
use crate::header::{Calc, FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::{checksum, ipv4, ipv6};

/// Kind identifier used in binding tables.
pub const KIND: &str = "UDP";

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "UDP");
    s.define_field(FieldDef::new("src_port", FieldType::u16()))
        .define_field(FieldDef::new("dst_port", FieldType::u16()))
        .define_field(
            FieldDef::new("length", FieldType::u16())
                .with_default(8u16)
                .with_calc(Calc::PayloadLength {
                    include_header: true,
                }),
        )
        .define_field(FieldDef::new("checksum", FieldType::u16()));
    s.set_checksum("checksum", udp_checksum);
    Arc::new(s)
});

// RFC 768: a computed checksum of zero is transmitted as all-ones.
fn udp_checksum(stack: &[Header], idx: usize, own: &[u8], inner: &[u8]) -> u16 {
    match checksum::transport(stack, idx, own, inner, IP_PROTO_UDP) {
        0 => 0xffff,
        sum => sum,
    }
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
    reg.bind(Binding::new(ipv4::KIND, KIND).eq("protocol", IP_PROTO_UDP));
    reg.bind(Binding::new(ipv6::KIND, KIND).eq("next", IP_PROTO_UDP));
}
