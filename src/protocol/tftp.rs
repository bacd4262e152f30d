//! TFTP (RFC 1350).
//!
//! The base header is the opcode alone; its layout past that depends on the
//! opcode, so the base schema carries a subkind resolver and re-parses
//! itself as the matching message kind. Building addresses the subkinds
//! directly (`"TFTP::ACK"`); the UDP binding is declared on the base kind
//! and subkinds fall back to it.

use std::sync::{Arc, LazyLock};

use crate::field::{FieldType, NameMap};
use crate::header::{FieldDef, Header, Registry, Schema};
use crate::packet::Binding;

use super::udp;

/// Kind identifier used in binding tables.
pub const KIND: &str = "TFTP";
pub const RRQ_KIND: &str = "TFTP::RRQ";
pub const WRQ_KIND: &str = "TFTP::WRQ";
pub const DATA_KIND: &str = "TFTP::DATA";
pub const ACK_KIND: &str = "TFTP::ACK";
pub const ERROR_KIND: &str = "TFTP::Error";

/// TFTP server port.
pub const TFTP_PORT: u16 = 69;

pub const OPCODES: NameMap = &[
    ("RRQ", 1),
    ("WRQ", 2),
    ("DATA", 3),
    ("ACK", 4),
    ("Error", 5),
];

static BASE: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = Schema::new(KIND, "TFTP");
    s.define_field(FieldDef::new("opcode", FieldType::u16()).with_names(OPCODES));
    s.set_subkind(resolve_subkind);
    Arc::new(s)
});

static RRQ: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = BASE.derive(RRQ_KIND, "TFTP Read Request");
    s.update_field("opcode").set_default("RRQ");
    s.define_field(FieldDef::new("filename", FieldType::CStr))
        .define_field(FieldDef::new("mode", FieldType::CStr).with_default("octet"));
    Arc::new(s)
});

static WRQ: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = BASE.derive(WRQ_KIND, "TFTP Write Request");
    s.update_field("opcode").set_default("WRQ");
    s.define_field(FieldDef::new("filename", FieldType::CStr))
        .define_field(FieldDef::new("mode", FieldType::CStr).with_default("octet"));
    Arc::new(s)
});

static DATA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = BASE.derive(DATA_KIND, "TFTP Data");
    s.update_field("opcode").set_default("DATA");
    s.define_field(FieldDef::new("block_num", FieldType::u16()))
        .define_field(FieldDef::new("data", FieldType::VarBytes));
    Arc::new(s)
});

static ACK: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = BASE.derive(ACK_KIND, "TFTP Ack");
    s.update_field("opcode").set_default("ACK");
    s.define_field(FieldDef::new("block_num", FieldType::u16()));
    Arc::new(s)
});

static ERROR: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let mut s = BASE.derive(ERROR_KIND, "TFTP Error");
    s.update_field("opcode").set_default("Error");
    s.define_field(FieldDef::new("error_code", FieldType::u16()))
        .define_field(FieldDef::new("error_msg", FieldType::CStr));
    Arc::new(s)
});

fn resolve_subkind(h: &Header) -> Option<Arc<Schema>> {
    match h.value_u64("opcode")? {
        1 => Some(Arc::clone(&RRQ)),
        2 => Some(Arc::clone(&WRQ)),
        3 => Some(Arc::clone(&DATA)),
        4 => Some(Arc::clone(&ACK)),
        5 => Some(Arc::clone(&ERROR)),
        _ => None,
    }
}

pub(crate) fn register(reg: &mut Registry) {
    reg.register_arc(Arc::clone(&BASE));
    reg.register_arc(Arc::clone(&RRQ));
    reg.register_arc(Arc::clone(&WRQ));
    reg.register_arc(Arc::clone(&DATA));
    reg.register_arc(Arc::clone(&ACK));
    reg.register_arc(Arc::clone(&ERROR));
    reg.bind(Binding::new(udp::KIND, KIND).eq("dst_port", TFTP_PORT));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    const RRQ_BYTES: &[u8] = b"\x00\x01file\x00octet\x00";

    #[test]
    fn test_rrq_reparses_as_subkind() {
        let mut h = Header::new(Arc::clone(&BASE));
        let n = h.read(RRQ_BYTES).unwrap();
        assert_eq!(n, RRQ_BYTES.len());
        assert_eq!(h.name(), RRQ_KIND);
        assert_eq!(h.value_u64("opcode"), Some(1));
        assert_eq!(h.get("filename").unwrap().as_str(), Some("file"));
        assert_eq!(h.get("mode").unwrap().as_str(), Some("octet"));
    }

    #[test]
    fn test_rrq_round_trip() {
        let mut h = Header::new(Arc::clone(&BASE));
        h.read(RRQ_BYTES).unwrap();
        assert_eq!(h.to_bytes(), RRQ_BYTES);
    }

    #[test]
    fn test_unknown_opcode_stays_base() {
        let mut h = Header::new(Arc::clone(&BASE));
        let n = h.read(b"\x00\x09rest").unwrap();
        assert_eq!(n, 2);
        assert_eq!(h.name(), KIND);
    }

    #[test]
    fn test_data_swallows_remaining_bytes() {
        let mut h = Header::new(Arc::clone(&BASE));
        let bytes = b"\x00\x03\x00\x07abcdef";
        h.read(bytes).unwrap();
        assert_eq!(h.name(), DATA_KIND);
        assert_eq!(h.value_u64("block_num"), Some(7));
        assert_eq!(h.get("data").unwrap().as_bytes(), Some(&b"abcdef"[..]));
    }

    #[test]
    fn test_ack_defaults() {
        let reg = crate::protocol::default_registry();
        let h = reg.header(ACK_KIND).unwrap();
        assert_eq!(h.value_u64("opcode"), Some(4));
        assert_eq!(h.wire_size(), 4);
    }

    #[test]
    fn test_udp_dispatches_to_tftp() {
        let mut bytes = vec![
            0x30, 0x39, // src port 12345
            0x00, 0x45, // dst port 69
            0x00, 0x15, // length 21
            0x00, 0x00, // checksum
        ];
        bytes.extend_from_slice(RRQ_BYTES);
        let p = Packet::parse(&bytes, udp::KIND).unwrap();
        assert!(p.is(KIND));
        assert!(p.is(RRQ_KIND));
        assert_eq!(
            p.header(KIND, 0).unwrap().get("filename").unwrap().as_str(),
            Some("file")
        );
    }
}
