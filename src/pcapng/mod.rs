//! PCAP-NG capture-file format.
//!
//! Everything in a PCAP-NG stream is a block: 4-byte type, 4-byte total
//! length, body, and the total length again. Blocks here are header kinds
//! of the schema framework, so they get the same field-driven read/write as
//! protocol headers — with the instance endian supplied by the enclosing
//! section's byte-order magic.
//!
//! A [`File`] is an ordered list of [`Section`]s; each section owns its
//! interfaces, their packet blocks, and any unrecognised blocks (preserved
//! verbatim, never an error).

mod blocks;
mod file;
mod options;
mod section;

pub use blocks::{EPB_KIND, IDB_KIND, SHB_KIND, SPB_KIND, UNKNOWN_KIND};
pub use file::{File, PacketEntry, SynthesisOptions};
pub use options::{OptionsIter, IF_NAME, IF_TSRESOL, OPT_ENDOFOPT};
pub use section::{Interface, PacketBlock, Section};

pub(crate) use blocks::register;

/// Section Header Block type (endian-symmetric by design).
pub const SHB_TYPE: u32 = 0x0A0D_0D0A;
/// Interface Description Block type.
pub const IDB_TYPE: u32 = 0x0000_0001;
/// Simple Packet Block type.
pub const SPB_TYPE: u32 = 0x0000_0003;
/// Enhanced Packet Block type.
pub const EPB_TYPE: u32 = 0x0000_0006;

/// Byte-order magic as seen in the section's own endian.
pub const BOM_MAGIC: u32 = 0x1A2B_3C4D;
/// Byte-order magic read with the wrong endian: the section is swapped.
pub const BOM_MAGIC_SWAPPED: u32 = 0x4D3C_2B1A;

/// `section_len` value meaning "not specified, parse to EOF or next SHB".
pub const SECTION_LEN_UNDEFINED: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Round up to the 32-bit boundary blocks are padded to.
pub(crate) fn align32(n: usize) -> usize {
    (n + 3) & !3
}
