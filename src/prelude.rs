//! Convenient re-exports for common usage.
//!
//! ```rust,no_run
//! use packetgen::prelude::*;
//!
//! let packets = File::read_packets("capture.pcapng").unwrap();
//! for packet in &packets {
//!     if packet.is("UDP") {
//!         println!("{packet}");
//!     }
//! }
//! ```

// Field framework
pub use crate::field::{Endian, FieldType, MacAddr, Value};

// Header framework
pub use crate::header::{Builder, Calc, FieldDef, Header, Registry, Schema};

// Packet composition
pub use crate::packet::{Binding, Packet};

// Protocol catalog
pub use crate::protocol::default_registry;

// PCAP-NG
pub use crate::pcapng::{File, PacketEntry, Section, SynthesisOptions};

// Link types
pub use crate::linktype::Linktype;

// Errors
pub use crate::error::{Error, Result};
