//! # packetgen
//!
//! Network packet construction and dissection, plus a PCAP-NG
//! reader/writer.
//!
//! The crate is built around a declarative header framework: a protocol is
//! an ordered list of typed fields ([`header::Schema`]), instances of it
//! parse and serialize field-by-field ([`header::Header`]), and a binding
//! table dispatches from one layer to the next in both directions — parsing
//! captured bytes into a stack, and pre-filling discriminator fields as
//! headers are pushed onto one.
//!
//! ## Building a packet
//!
//! ```rust
//! use packetgen::prelude::*;
//!
//! let mut packet = Packet::gen("IP").unwrap();
//! packet.header_mut("IP", 0).unwrap().set("dst_ip", "10.0.0.1").unwrap();
//! packet.add("UDP").unwrap().set("dst_port", 53u16).unwrap();
//! packet.set_payload(b"hello".to_vec());
//!
//! // lengths and checksums are reconciled on serialization
//! let bytes = packet.to_bytes().unwrap();
//! assert_eq!(bytes[9], 17); // the IP header advertises UDP
//! ```
//!
//! ## Dissecting bytes
//!
//! ```rust
//! use packetgen::prelude::*;
//!
//! let bytes = b"\x00\x01file\x00octet\x00";
//! let packet = Packet::parse(bytes, "TFTP").unwrap();
//! assert!(packet.is("TFTP::RRQ"));
//! ```
//!
//! ## Capture files
//!
//! [`pcapng::File`] reads and writes PCAP-NG streams in either endian,
//! preserves unknown blocks verbatim, and synthesizes captures from raw
//! byte arrays. Live capture is delegated to a [`capture`] backend.

pub mod capture;
pub mod error;
pub mod field;
pub mod header;
pub mod linktype;
pub mod packet;
pub mod pcapng;
pub mod prelude;
pub mod protocol;

pub use error::{Error, Result};
pub use packet::Packet;
pub use protocol::default_registry;
