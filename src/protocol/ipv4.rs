//! IPv4 header.

use std::sync::{Arc, LazyLock};

use crate::field::{FieldType, NameMap};
use crate::header::{Builder, Calc, FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::{checksum, ethernet};

/// Kind identifier used in binding tables.
pub const KIND: &str = "IP";

/// IP protocol numbers carried by the `protocol` field.
pub const PROTOCOLS: NameMap = &[
    ("ICMP", 1),
    ("IGMP", 2),
    ("TCP", 6),
    ("UDP", 17),
    ("IPv6", 41),
    ("GRE", 47),
    ("ESP", 50),
    ("ICMPv6", 58),
    ("OSPF", 89),
];

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "IPv4");
    s.define_field(FieldDef::new("vihl", FieldType::u8()).with_default(0x45u8))
        .define_field(FieldDef::new("tos", FieldType::u8()))
        .define_field(
            FieldDef::new("length", FieldType::u16()).with_calc(Calc::PayloadLength {
                include_header: true,
            }),
        )
        .define_field(FieldDef::new("id", FieldType::u16()))
        .define_field(FieldDef::new("frag", FieldType::u16()))
        .define_field(FieldDef::new("ttl", FieldType::u8()).with_default(64u8))
        .define_field(FieldDef::new("protocol", FieldType::u8()).with_names(PROTOCOLS))
        .define_field(FieldDef::new("checksum", FieldType::u16()))
        .define_field(FieldDef::new("src_ip", FieldType::Ipv4))
        .define_field(FieldDef::new("dst_ip", FieldType::Ipv4))
        .define_field(
            FieldDef::new("options", FieldType::VarBytes).with_builder(Builder::Func(options_len)),
        );
    s.define_bit_fields_on("vihl", &[("version", 4), ("ihl", 4)]);
    s.define_bit_fields_on("frag", &[("flags", 3), ("frag_offset", 13)]);
    s.set_checksum("checksum", header_checksum);
    s.set_validate(is_ipv4);
    Arc::new(s)
});

// Options run from the end of the fixed header to ihl words.
fn options_len(h: &Header) -> Option<usize> {
    let ihl = h.bit_field("ihl").ok()? as usize;
    (ihl * 4).checked_sub(20)
}

fn is_ipv4(h: &Header) -> bool {
    h.bit_field("version").is_ok_and(|v| v == 4) && h.bit_field("ihl").is_ok_and(|v| v >= 5)
}

// RFC 791: the header checksum covers the header alone.
fn header_checksum(_stack: &[Header], _idx: usize, own: &[u8], _inner: &[u8]) -> u16 {
    checksum::rfc1071(&[own])
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
    reg.bind(Binding::new(ethernet::KIND, KIND).eq("ethertype", 0x0800u16));
}

#[cfg(test)]
mod tests {
    use super::*;

    // 192.168.0.1 -> 192.168.0.199, UDP, 115 bytes total
    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn test_parse_ipv4() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        let n = h.read(&HEADER).unwrap();
        assert_eq!(n, 20);
        assert_eq!(h.bit_field("version").unwrap(), 4);
        assert_eq!(h.bit_field("ihl").unwrap(), 5);
        assert_eq!(h.value_u64("length"), Some(0x73));
        assert_eq!(h.bit_field("flags").unwrap(), 0b010); // DF
        assert_eq!(h.value_u64("ttl"), Some(64));
        assert_eq!(h.human("protocol").as_deref(), Some("UDP"));
        assert_eq!(h.human("src_ip").as_deref(), Some("192.168.0.1"));
        assert_eq!(h.human("dst_ip").as_deref(), Some("192.168.0.199"));
        assert!(h.get("options").unwrap().as_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.read(&HEADER).unwrap();
        assert_eq!(h.to_bytes(), HEADER);
    }

    #[test]
    fn test_checksum_matches_known_vector() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.read(&HEADER).unwrap();
        h.set("checksum", 0u16).unwrap();
        let sum = header_checksum(&[], 0, &h.to_bytes(), &[]);
        assert_eq!(sum, 0xb861);
    }

    #[test]
    fn test_options_follow_ihl() {
        let mut bytes = Vec::from(HEADER);
        bytes[0] = 0x46; // ihl 6: one option word
        bytes.extend_from_slice(&[0x01, 0x01, 0x01, 0x01]);
        let mut h = Header::new(Arc::clone(&SCHEMA));
        let n = h.read(&bytes).unwrap();
        assert_eq!(n, 24);
        assert_eq!(
            h.get("options").unwrap().as_bytes(),
            Some(&[0x01, 0x01, 0x01, 0x01][..])
        );
    }

    #[test]
    fn test_validate() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        assert!(h.is_valid()); // default 0x45
        h.set("vihl", 0x60u8).unwrap();
        assert!(!h.is_valid());
        h.set("vihl", 0x44u8).unwrap();
        assert!(!h.is_valid()); // ihl below the fixed header
    }

    #[test]
    fn test_set_address_from_string() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.set("src_ip", "10.1.2.3").unwrap();
        assert_eq!(h.to_bytes()[12..16], [10, 1, 2, 3]);
        assert!(h.set("src_ip", "999.1.2.3").is_err());
    }
}
