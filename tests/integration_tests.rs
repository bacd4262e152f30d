//! End-to-end scenarios: packet build/parse round-trips, binding
//! disambiguation, and PCAP-NG file handling.

use std::fs::File as StdFile;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use packetgen::error::{Error, PacketError};
use packetgen::field::{Endian, FieldType};
use packetgen::header::{FieldDef, Registry, Schema};
use packetgen::packet::{Binding, Packet};
use packetgen::pcapng::{File, PacketEntry, SynthesisOptions};
use packetgen::protocol::default_registry;

const TFTP_RRQ: &[u8] = b"\x00\x01file\x00octet\x00";

#[test]
fn test_tftp_rrq_round_trip() {
    let packet = Packet::parse(TFTP_RRQ, "TFTP").unwrap();
    let rrq = packet.header("TFTP", 0).unwrap();
    assert_eq!(rrq.name(), "TFTP::RRQ");
    assert_eq!(rrq.value_u64("opcode"), Some(1));
    assert_eq!(rrq.get("filename").unwrap().as_str(), Some("file"));
    assert_eq!(rrq.get("mode").unwrap().as_str(), Some("octet"));
    assert_eq!(rrq.to_bytes(), TFTP_RRQ);
}

#[test]
fn test_build_ip_udp_tftp_ack() {
    let mut packet = Packet::gen("IP").unwrap();
    {
        let ip = packet.header_mut("IP", 0).unwrap();
        ip.set("src_ip", "10.0.0.1").unwrap();
        ip.set("dst_ip", "10.0.0.2").unwrap();
    }
    packet.add("UDP").unwrap().set("src_port", 50000u16).unwrap();
    packet.add("TFTP::ACK").unwrap().set("block_num", 3u16).unwrap();

    let bytes = packet.to_bytes().unwrap();

    assert_eq!(packet.header("IP", 0).unwrap().value_u64("protocol"), Some(17));
    assert_eq!(packet.header("UDP", 0).unwrap().value_u64("dst_port"), Some(69));
    assert_eq!(packet.header("TFTP", 0).unwrap().value_u64("opcode"), Some(4));
    assert!(bytes.ends_with(&[0x00, 0x04, 0x00, 0x03]));
    // 20 IP + 8 UDP + 4 ACK
    assert_eq!(bytes.len(), 32);
    assert_eq!(packet.header("IP", 0).unwrap().value_u64("length"), Some(32));
    assert_eq!(packet.header("UDP", 0).unwrap().value_u64("length"), Some(12));
}

#[test]
fn test_build_parse_duality() {
    let mut packet = Packet::gen("IP").unwrap();
    packet
        .header_mut("IP", 0)
        .unwrap()
        .set("dst_ip", "192.0.2.9")
        .unwrap();
    packet.add("UDP").unwrap().set("dst_port", 4000u16).unwrap();
    packet.set_payload(b"payload".to_vec());
    let bytes = packet.to_bytes().unwrap();

    let reparsed = Packet::parse(&bytes, "IP").unwrap();
    assert_eq!(reparsed, packet);
}

#[test]
fn test_calc_idempotence() {
    let mut packet = Packet::gen("IP").unwrap();
    packet.add("UDP").unwrap();
    packet.set_payload(vec![0x55; 17]);
    packet.recalc().unwrap();
    let a = packet.to_bytes().unwrap();
    packet.recalc().unwrap();
    let b = packet.to_bytes().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_pcapng_synthesize() {
    let file = File::from_packet_array(
        vec![PacketEntry::from((1_600_000_000.0, vec![0xaa, 0xbb]))],
        &SynthesisOptions::default(),
    )
    .unwrap();
    let bytes = file.to_bytes().unwrap();
    // one SHB (28) + one IDB (20) + one EPB (36)
    assert_eq!(bytes.len(), 84);

    let mut parsed = File::new();
    parsed.read(&bytes).unwrap();
    assert_eq!(parsed.sections.len(), 1);
    let section = &parsed.sections[0];
    assert_eq!(section.interfaces.len(), 1);
    assert_eq!(section.unknown_blocks.len(), 0);
    let iface = &section.interfaces[0];
    assert_eq!(iface.packets.len(), 1);

    let epb = iface.packets[0].header();
    assert_eq!(epb.value_u64("cap_len"), Some(2));
    assert_eq!(epb.value_u64("orig_len"), Some(2));
    // 1.6e9 s at microsecond resolution
    assert_eq!(epb.value_u64("tsh"), Some(0x0005_af31));
    assert_eq!(epb.value_u64("tsl"), Some(0x07a4_0000));
    assert_eq!(
        iface.packets[0].timestamp_units(),
        Some(1_600_000_000_000_000)
    );
    // two bytes of data, two of pad
    assert_eq!(&bytes[76..80], &[0xaa, 0xbb, 0x00, 0x00]);
}

#[test]
fn test_unknown_linktype_falls_back_to_guessing() {
    // an IPv4 datagram whose would-be ethertype bytes (src_ip) rule out
    // Ethernet II
    let ip_packet = [
        0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x40, 0xfd, 0x00, 0x00, 0x01, 0x02, 0x03,
        0x04, 0x05, 0x06, 0x07, 0x08,
    ];
    let temp = NamedTempFile::new().unwrap();
    File::array_to_file(
        temp.path(),
        vec![ip_packet.to_vec()],
        &SynthesisOptions {
            link_type: 147, // user-reserved
            ..SynthesisOptions::default()
        },
        false,
    )
    .unwrap();

    let packets = File::read_packets(temp.path()).unwrap();
    assert_eq!(packets.len(), 1);
    assert!(packets[0].is("IP"));
    assert_eq!(
        packets[0].header("IP", 0).unwrap().human("src_ip").as_deref(),
        Some("1.2.3.4")
    );
}

#[test]
fn test_unknown_linktype_with_no_candidate_is_unparseable() {
    let temp = NamedTempFile::new().unwrap();
    File::array_to_file(
        temp.path(),
        vec![vec![0u8; 10]],
        &SynthesisOptions {
            link_type: 147,
            ..SynthesisOptions::default()
        },
        false,
    )
    .unwrap();

    let err = File::read_packets(temp.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Packet(PacketError::Unparseable { link_type: 147 })
    ));
}

#[test]
fn test_mld_mlq_disambiguation() {
    // ICMPv6 type 130, 20-byte body: MLDv1
    let mut mld = vec![130, 0, 0, 0, 0x00, 0x0a, 0x00, 0x00];
    mld.extend_from_slice(&[0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    let packet = Packet::parse(&mld, "ICMPv6").unwrap();
    assert!(packet.is("ICMPv6::MLD"));
    assert!(!packet.is("ICMPv6::MLQ"));

    // four more bytes: the MLDv2 query binding (body > 23) wins
    let mut mlq = mld.clone();
    mlq.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    let packet = Packet::parse(&mlq, "ICMPv6").unwrap();
    assert!(packet.is("ICMPv6::MLQ"));
}

#[test]
fn test_equal_specificity_bindings_are_ambiguous() {
    let mut reg = Registry::new();
    let mut udp = Schema::new("UDP", "UDP");
    udp.define_field(FieldDef::new("src_port", FieldType::u16()))
        .define_field(FieldDef::new("dst_port", FieldType::u16()))
        .define_field(FieldDef::new("length", FieldType::u16()))
        .define_field(FieldDef::new("checksum", FieldType::u16()));
    reg.register(udp);
    let mut x = Schema::new("X", "X");
    x.define_field(FieldDef::new("tag", FieldType::u8()));
    reg.register(x);
    let mut y = Schema::new("Y", "Y");
    y.define_field(FieldDef::new("tag", FieldType::u8()));
    reg.register(y);
    reg.bind(Binding::new("UDP", "X").eq("dst_port", 69u16));
    reg.bind(Binding::new("UDP", "Y").eq("dst_port", 69u16));

    let bytes = [0x30, 0x39, 0x00, 0x45, 0x00, 0x09, 0x00, 0x00, 0xff];
    let err = Packet::parse_with(&reg, &bytes, "UDP").unwrap_err();
    assert!(matches!(
        err,
        Error::Packet(PacketError::AmbiguousBinding { .. })
    ));
}

#[test]
fn test_file_round_trip_preserves_endian() {
    for endian in [Endian::Little, Endian::Big] {
        let file = File::from_packet_array(
            vec![vec![1u8, 2, 3, 4, 5]],
            &SynthesisOptions {
                endian,
                ..SynthesisOptions::default()
            },
        )
        .unwrap();
        let bytes = file.to_bytes().unwrap();

        let mut parsed = File::new();
        parsed.read(&bytes).unwrap();
        assert_eq!(parsed.sections[0].endian(), endian);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }
}

#[test]
fn test_both_endians_yield_equal_packets() {
    let payload = vec![0xde, 0xad, 0xbe, 0xef];
    let mut views = Vec::new();
    for endian in [Endian::Little, Endian::Big] {
        let file = File::from_packet_array(
            vec![payload.clone()],
            &SynthesisOptions {
                endian,
                ..SynthesisOptions::default()
            },
        )
        .unwrap();
        let mut parsed = File::new();
        parsed.read(&file.to_bytes().unwrap()).unwrap();
        let (iface, block) = parsed.iter_packets().next().map(|(i, b)| (i.link_type(), b.data().to_vec())).unwrap();
        views.push((iface, block));
    }
    assert_eq!(views[0], views[1]);
}

#[test]
fn test_unknown_blocks_preserved_byte_exactly() {
    let mut bytes = Vec::new();
    // SHB, little endian, unspecified section length
    bytes.extend_from_slice(&[
        0x0a, 0x0d, 0x0d, 0x0a, 0x1c, 0x00, 0x00, 0x00, 0x4d, 0x3c, 0x2b, 0x1a, 0x01, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x1c, 0x00, 0x00, 0x00,
    ]);
    // a block type the engine does not model (Name Resolution Block)
    bytes.extend_from_slice(&[
        0x04, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0xca, 0xfe, 0xba, 0xbe, 0x10, 0x00, 0x00,
        0x00,
    ]);

    let mut file = File::new();
    file.read(&bytes).unwrap();
    assert_eq!(file.sections[0].unknown_blocks.len(), 1);
    assert_eq!(
        file.sections[0].unknown_blocks[0].value_u64("type"),
        Some(4)
    );
    assert_eq!(file.to_bytes().unwrap(), bytes);
}

#[test]
fn test_read_packet_bytes_returns_payloads() {
    let temp = NamedTempFile::new().unwrap();
    File::array_to_file(
        temp.path(),
        vec![vec![1u8, 2], vec![3u8, 4, 5]],
        &SynthesisOptions::default(),
        false,
    )
    .unwrap();
    let payloads = File::read_packet_bytes(temp.path()).unwrap();
    assert_eq!(payloads, vec![vec![1, 2], vec![3, 4, 5]]);
}

#[test]
fn test_each_packet_reports_timestamps() {
    let temp = NamedTempFile::new().unwrap();
    File::array_to_file(
        temp.path(),
        vec![
            PacketEntry::from((1.5, vec![0u8; 10])),
            PacketEntry::from(vec![0u8; 10]),
        ],
        &SynthesisOptions::default(),
        false,
    )
    .unwrap();

    let mut seen = Vec::new();
    File::each_packet(temp.path(), |result, seconds| {
        seen.push((result.is_ok(), seconds));
    })
    .unwrap();
    // per-packet tolerance: the all-zero packets fail to parse but the walk
    // continues
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].0);
    assert_eq!(seen[0].1, 1.5);
    assert_eq!(seen[1].1, 2.5);
}

#[test]
fn test_append_grows_the_file() {
    let temp = NamedTempFile::new().unwrap();
    let file =
        File::from_packet_array(vec![vec![9u8; 4]], &SynthesisOptions::default()).unwrap();
    file.write(temp.path()).unwrap();
    file.append(temp.path()).unwrap();

    let mut reread = File::new();
    reread.read_file(temp.path()).unwrap();
    assert_eq!(reread.sections.len(), 2);
}

#[test]
fn test_read_gzipped_capture() {
    let inner = File::from_packet_array(vec![vec![0x11u8, 0x22]], &SynthesisOptions::default())
        .unwrap()
        .to_bytes()
        .unwrap();

    let temp = NamedTempFile::with_suffix(".pcapng.gz").unwrap();
    {
        let out = StdFile::create(temp.path()).unwrap();
        let mut encoder = GzEncoder::new(out, Compression::default());
        encoder.write_all(&inner).unwrap();
        encoder.finish().unwrap();
    }

    let mut file = File::new();
    file.read_file(temp.path()).unwrap();
    assert_eq!(file.sections.len(), 1);
    assert_eq!(
        file.iter_packets().next().unwrap().1.data(),
        &[0x11, 0x22]
    );
}

#[test]
fn test_registry_injection_does_not_disturb_default() {
    // the process-wide registry still resolves the catalog after custom
    // registries with conflicting bindings have been used
    let reg = default_registry();
    assert!(reg.get("UDP").is_some());
    let packet = Packet::parse(TFTP_RRQ, "TFTP").unwrap();
    assert!(packet.is("TFTP"));
}
