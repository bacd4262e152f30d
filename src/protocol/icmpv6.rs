//! ICMPv6 header, with the Multicast Listener Discovery messages.
//!
//! MLD (v1) and MLQ (the MLDv2 query) are separate kinds stacked under
//! ICMPv6. Both bind on type 130; an MLDv2 query is told apart by its body
//! running past the 24-byte v1 message, so the MLQ binding carries an extra
//! length predicate and wins on specificity.

use std::sync::{Arc, LazyLock};

use crate::field::FieldType;
use crate::header::{Builder, Calc, FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::checksum;

/// Kind identifier used in binding tables.
pub const KIND: &str = "ICMPv6";
/// Multicast Listener Discovery (v1 layout).
pub const MLD_KIND: &str = "ICMPv6::MLD";
/// MLDv2 Multicast Listener Query.
pub const MLQ_KIND: &str = "ICMPv6::MLQ";

/// IP protocol number for ICMPv6.
pub const IP_PROTO_ICMPV6: u8 = 58;

/// ICMPv6 type values.
pub const TYPES: crate::field::NameMap = &[
    ("DestUnreachable", 1),
    ("PacketTooBig", 2),
    ("TimeExceeded", 3),
    ("ParameterProblem", 4),
    ("EchoRequest", 128),
    ("EchoReply", 129),
    ("MLQuery", 130),
    ("MLReport", 131),
    ("MLDone", 132),
];

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "ICMPv6");
    s.define_field(FieldDef::new("type", FieldType::u8()).with_names(TYPES))
        .define_field(FieldDef::new("code", FieldType::u8()))
        .define_field(FieldDef::new("checksum", FieldType::u16()));
    s.set_checksum("checksum", icmpv6_checksum);
    Arc::new(s)
});

static MLD: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(MLD_KIND, "MLD");
    s.define_field(FieldDef::new("max_resp_delay", FieldType::u16()))
        .define_field(FieldDef::new("reserved", FieldType::u16()))
        .define_field(FieldDef::new("mcast_addr", FieldType::Ipv6));
    Arc::new(s)
});

static MLQ: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(MLQ_KIND, "MLDv2 Query");
    s.define_field(FieldDef::new("max_resp_delay", FieldType::u16()))
        .define_field(FieldDef::new("reserved", FieldType::u16()))
        .define_field(FieldDef::new("mcast_addr", FieldType::Ipv6))
        .define_field(FieldDef::new("flags", FieldType::u8()))
        .define_field(FieldDef::new("qqic", FieldType::u8()))
        .define_field(
            FieldDef::new("nb_sources", FieldType::u16()).with_calc(Calc::CountOf("src_addrs")),
        )
        .define_field(
            FieldDef::new("src_addrs", FieldType::array(FieldType::Ipv6))
                .with_builder(Builder::FieldValue("nb_sources")),
        );
    s.define_bit_fields_on("flags", &[("resv", 4), ("s_flag", 1), ("qrv", 3)]);
    Arc::new(s)
});

// RFC 4443: the checksum covers the ICMPv6 message and the v6 pseudo-header.
fn icmpv6_checksum(stack: &[Header], idx: usize, own: &[u8], inner: &[u8]) -> u16 {
    checksum::transport(stack, idx, own, inner, IP_PROTO_ICMPV6)
}

// An MLDv2 query body outgrows the fixed v1 message.
fn mldv2_query(_h: &Header, rest: &[u8]) -> bool {
    rest.len() > 23
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
    reg.register_arc(Arc::clone(&MLD));
    reg.register_arc(Arc::clone(&MLQ));
    reg.bind(Binding::new(super::ipv6::KIND, KIND).eq("next", IP_PROTO_ICMPV6));
    reg.bind(Binding::new(KIND, MLD_KIND).one_of("type", [130u8, 131, 132]));
    reg.bind(
        Binding::new(KIND, MLQ_KIND)
            .eq("type", 130u8)
            .when("body", mldv2_query),
    );
}
