//! Section / interface / packet-block hierarchy.

use bytes::BytesMut;
use tracing::debug;

use crate::error::{Error, PcapNgError};
use crate::field::{Endian, Value};
use crate::header::Header;

use super::blocks::{self, read_block};
use super::options::{OptionsIter, IF_TSRESOL};
use super::{BOM_MAGIC, BOM_MAGIC_SWAPPED, EPB_TYPE, IDB_TYPE, SECTION_LEN_UNDEFINED, SHB_TYPE, SPB_TYPE};

/// A captured packet record.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBlock {
    /// Enhanced Packet Block.
    Enhanced(Header),
    /// Simple Packet Block (always interface 0).
    Simple(Header),
}

impl PacketBlock {
    pub fn header(&self) -> &Header {
        match self {
            PacketBlock::Enhanced(h) | PacketBlock::Simple(h) => h,
        }
    }

    /// Captured bytes, without padding. SPB data is bounded by `orig_len`
    /// (the block cannot record a capture length of its own).
    pub fn data(&self) -> &[u8] {
        match self {
            PacketBlock::Enhanced(h) => h
                .get("data")
                .and_then(Value::as_bytes)
                .unwrap_or(&[]),
            PacketBlock::Simple(h) => {
                let data = h.get("data").and_then(Value::as_bytes).unwrap_or(&[]);
                let orig = h.value_u64("orig_len").unwrap_or(0) as usize;
                &data[..orig.min(data.len())]
            }
        }
    }

    pub fn orig_len(&self) -> u32 {
        self.header().value_u64("orig_len").unwrap_or(0) as u32
    }

    /// 64-bit timestamp in interface resolution units (EPB only).
    pub fn timestamp_units(&self) -> Option<u64> {
        match self {
            PacketBlock::Enhanced(h) => {
                Some((h.value_u64("tsh")? << 32) | h.value_u64("tsl")?)
            }
            PacketBlock::Simple(_) => None,
        }
    }

    pub fn interface_id(&self) -> u32 {
        match self {
            PacketBlock::Enhanced(h) => h.value_u64("interface_id").unwrap_or(0) as u32,
            PacketBlock::Simple(_) => 0,
        }
    }
}

/// One capture interface: its IDB plus the packet blocks recorded on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub idb: Header,
    pub packets: Vec<PacketBlock>,
}

impl Interface {
    pub(crate) fn new(idb: Header) -> Self {
        Self {
            idb,
            packets: Vec::new(),
        }
    }

    pub fn link_type(&self) -> u32 {
        self.idb.value_u64("link_type").unwrap_or(0) as u32
    }

    pub fn snaplen(&self) -> u32 {
        self.idb.value_u64("snaplen").unwrap_or(0) as u32
    }

    /// Timestamp resolution in seconds per unit, from the `if_tsresol`
    /// option. Defaults to 10⁻⁶; the MSB selects a power of two.
    pub fn ts_resol(&self) -> f64 {
        let options = self.idb.get("options").and_then(Value::as_bytes).unwrap_or(&[]);
        for (code, value) in OptionsIter::new(options, self.idb.endian()) {
            if code == IF_TSRESOL && !value.is_empty() {
                let v = value[0];
                return if v & 0x80 != 0 {
                    2f64.powi(-i32::from(v & 0x7f))
                } else {
                    10f64.powi(-i32::from(v))
                };
            }
        }
        1e-6
    }
}

/// One PCAP-NG section: SHB, interfaces, and unrecognised blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub shb: Header,
    pub interfaces: Vec<Interface>,
    pub unknown_blocks: Vec<Header>,
}

impl Section {
    /// Fresh section in the given endian (version 1.0, unspecified length).
    pub fn new(endian: Endian) -> Self {
        let mut shb = Header::new(blocks::shb_schema());
        shb.set_endian(endian);
        Self {
            shb,
            interfaces: Vec::new(),
            unknown_blocks: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.shb.endian()
    }

    /// Append an interface with an empty option area.
    pub fn add_interface(&mut self, link_type: u32, snaplen: u32) -> Result<&mut Interface, Error> {
        let mut idb = Header::new(blocks::idb_schema());
        idb.set_endian(self.endian());
        idb.set("link_type", u64::from(link_type))?;
        idb.set("snaplen", snaplen)?;
        blocks::sync_block_len(&mut idb)?;
        self.interfaces.push(Interface::new(idb));
        let idx = self.interfaces.len() - 1;
        Ok(&mut self.interfaces[idx])
    }

    /// Parse one section from the front of `input`: the SHB (whose
    /// byte-order magic fixes the endian of every child block), then blocks
    /// until the declared section length, EOF, or the next SHB.
    pub(crate) fn parse(input: &[u8]) -> Result<(Section, usize), Error> {
        if input.len() < 12 {
            return Err(PcapNgError::InvalidFile {
                reason: "input too short for a Section Header Block".to_string(),
            }
            .into());
        }
        let block_type = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
        if block_type != SHB_TYPE {
            return Err(PcapNgError::InvalidFile {
                reason: "stream does not begin with a Section Header Block".to_string(),
            }
            .into());
        }
        let bom = u32::from_le_bytes([input[8], input[9], input[10], input[11]]);
        let endian = match bom {
            BOM_MAGIC => Endian::Little,
            BOM_MAGIC_SWAPPED => Endian::Big,
            other => {
                return Err(PcapNgError::MalformedBlock {
                    reason: format!("unknown byte-order magic {other:#010x}"),
                }
                .into())
            }
        };
        let (shb, shb_len) = read_block(&blocks::shb_schema(), endian, input)?;
        let mut section = Section {
            shb,
            interfaces: Vec::new(),
            unknown_blocks: Vec::new(),
        };

        let section_len = section
            .shb
            .value_u64("section_len")
            .unwrap_or(SECTION_LEN_UNDEFINED);
        let end = if section_len == SECTION_LEN_UNDEFINED {
            None
        } else {
            let end = shb_len + section_len as usize;
            if end > input.len() {
                return Err(PcapNgError::MalformedBlock {
                    reason: format!("section length {section_len} runs past end of input"),
                }
                .into());
            }
            Some(end)
        };

        let mut offset = shb_len;
        loop {
            let limit = end.unwrap_or(input.len());
            if offset >= limit {
                break;
            }
            let rest = &input[offset..limit];
            if rest.len() < 8 {
                return Err(PcapNgError::MalformedBlock {
                    reason: "truncated block header".to_string(),
                }
                .into());
            }
            let block_type = match endian {
                Endian::Little => u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]),
                Endian::Big => u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]),
            };
            if block_type == SHB_TYPE {
                if end.is_some() {
                    return Err(PcapNgError::MalformedBlock {
                        reason: "unexpected Section Header Block inside a section body"
                            .to_string(),
                    }
                    .into());
                }
                break;
            }
            offset += match block_type {
                IDB_TYPE => {
                    let (idb, n) = read_block(&blocks::idb_schema(), endian, rest)?;
                    section.interfaces.push(Interface::new(idb));
                    n
                }
                EPB_TYPE => {
                    let (epb, n) = read_block(&blocks::epb_schema(), endian, rest)?;
                    let if_id = epb.value_u64("interface_id").unwrap_or(0) as usize;
                    let iface = section.interfaces.get_mut(if_id).ok_or_else(|| {
                        PcapNgError::MalformedBlock {
                            reason: format!("EPB references unknown interface {if_id}"),
                        }
                    })?;
                    iface.packets.push(PacketBlock::Enhanced(epb));
                    n
                }
                SPB_TYPE => {
                    let (spb, n) = read_block(&blocks::spb_schema(), endian, rest)?;
                    let iface = section.interfaces.first_mut().ok_or_else(|| {
                        PcapNgError::MalformedBlock {
                            reason: "SPB with no interface in section".to_string(),
                        }
                    })?;
                    iface.packets.push(PacketBlock::Simple(spb));
                    n
                }
                other => {
                    let (block, n) = read_block(&blocks::unknown_schema(), endian, rest)?;
                    debug!(block_type = other, "preserving unknown block");
                    section.unknown_blocks.push(block);
                    n
                }
            };
        }

        Ok((section, offset))
    }

    /// Serialize: SHB, then IDBs, then each interface's packet blocks in
    /// insertion order, then unknown blocks. A defined `section_len` is
    /// refreshed to the body it frames.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut body = BytesMut::new();
        for iface in &self.interfaces {
            iface.idb.write(&mut body);
        }
        for iface in &self.interfaces {
            for packet in &iface.packets {
                packet.header().write(&mut body);
            }
        }
        for block in &self.unknown_blocks {
            block.write(&mut body);
        }

        let mut shb = self.shb.clone();
        blocks::sync_block_len(&mut shb)?;
        if shb.value_u64("section_len") != Some(SECTION_LEN_UNDEFINED) {
            shb.set("section_len", body.len() as u64)?;
        }

        let mut out = BytesMut::new();
        shb.write(&mut out);
        out.extend_from_slice(&body);
        Ok(out.to_vec())
    }
}
