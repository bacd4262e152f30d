//! Ethernet II header.

use std::sync::{Arc, LazyLock};

use crate::field::{FieldType, NameMap};
use crate::header::{FieldDef, Header, Registry, Schema};

/// Kind identifier used in binding tables.
pub const KIND: &str = "Eth";

/// EtherType values carried by the `ethertype` field.
pub const ETHERTYPES: NameMap = &[
    ("IPv4", 0x0800),
    ("ARP", 0x0806),
    ("WakeOnLan", 0x0842),
    ("VLAN", 0x8100),
    ("IPv6", 0x86DD),
    ("MPLS", 0x8847),
];

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "Ethernet");
    s.define_field(FieldDef::new("dst_mac", FieldType::Mac))
        .define_field(FieldDef::new("src_mac", FieldType::Mac))
        .define_field(FieldDef::new("ethertype", FieldType::u16()).with_names(ETHERTYPES));
    s.set_validate(looks_like_ethernet_ii);
    Arc::new(s)
});

// Ethernet II carries a type >= 0x0600; smaller values are 802.3 lengths.
fn looks_like_ethernet_ii(h: &Header) -> bool {
    h.value_u64("ethertype").is_some_and(|t| t >= 0x0600)
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&SCHEMA));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> [u8; 18] {
        [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst mac
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src mac
            0x08, 0x00, // ethertype (IPv4)
            0xde, 0xad, 0xbe, 0xef, // payload
        ]
    }

    #[test]
    fn test_parse_ethernet() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        let n = h.read(&frame()).unwrap();
        assert_eq!(n, 14);
        assert_eq!(h.human("dst_mac").as_deref(), Some("ff:ff:ff:ff:ff:ff"));
        assert_eq!(h.human("src_mac").as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(h.value_u64("ethertype"), Some(0x0800));
        assert_eq!(h.human("ethertype").as_deref(), Some("IPv4"));
    }

    #[test]
    fn test_round_trip() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.read(&frame()).unwrap();
        assert_eq!(h.to_bytes(), frame()[..14]);
    }

    #[test]
    fn test_set_mac_from_string() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.set("dst_mac", "01:00:5e:00:00:fb").unwrap();
        assert_eq!(h.to_bytes()[..6], [0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb]);
    }

    #[test]
    fn test_validate_rejects_8023_length() {
        let mut h = Header::new(Arc::clone(&SCHEMA));
        h.set("ethertype", 0x0100u16).unwrap();
        assert!(!h.is_valid());
        h.set("ethertype", "IPv6").unwrap();
        assert!(h.is_valid());
    }
}
