//! PCAP-NG file reader/writer.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use bytes::BytesMut;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Error, PacketError};
use crate::field::Endian;
use crate::header::Header;
use crate::linktype::{Linktype, GUESS_ORDER};
use crate::packet::Packet;
use crate::protocol::default_registry;

use super::blocks;
use super::section::{Interface, PacketBlock, Section};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One packet handed to [`File::from_packet_array`]: captured bytes with an
/// optional explicit timestamp (seconds).
#[derive(Debug, Clone)]
pub struct PacketEntry {
    pub timestamp: Option<f64>,
    pub data: Vec<u8>,
}

impl From<Vec<u8>> for PacketEntry {
    fn from(data: Vec<u8>) -> Self {
        Self {
            timestamp: None,
            data,
        }
    }
}

impl From<&[u8]> for PacketEntry {
    fn from(data: &[u8]) -> Self {
        Self {
            timestamp: None,
            data: data.to_vec(),
        }
    }
}

impl From<(f64, Vec<u8>)> for PacketEntry {
    fn from((timestamp, data): (f64, Vec<u8>)) -> Self {
        Self {
            timestamp: Some(timestamp),
            data,
        }
    }
}

/// Parameters for synthesising a capture from raw packet bytes.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Link type written to the single IDB.
    pub link_type: u32,
    /// Seed timestamp (seconds) for entries without their own.
    pub timestamp: f64,
    /// Per-packet timestamp increment (seconds).
    pub ts_inc: f64,
    /// Endian of the produced section.
    pub endian: Endian,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            link_type: Linktype::ETHERNET.0,
            timestamp: 0.0,
            ts_inc: 1.0,
            endian: Endian::Little,
        }
    }
}

/// An in-memory PCAP-NG file: an ordered list of sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub sections: Vec<Section>,
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the sections parsed from `input` (does not clear).
    pub fn read(&mut self, mut input: &[u8]) -> Result<(), Error> {
        debug!(bytes = input.len(), "reading pcapng stream");
        while !input.is_empty() {
            let (section, consumed) = Section::parse(input)?;
            input = &input[consumed..];
            self.sections.push(section);
        }
        Ok(())
    }

    /// Clear, then [`File::read`].
    pub fn read_new(&mut self, input: &[u8]) -> Result<(), Error> {
        self.clear();
        self.read(input)
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Read a capture file, transparently gunzipping when the gzip magic is
    /// present.
    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let raw = fs::read(path)?;
        if raw.starts_with(&GZIP_MAGIC) {
            let mut bytes = Vec::new();
            GzDecoder::new(raw.as_slice()).read_to_end(&mut bytes)?;
            self.read(&bytes)
        } else {
            self.read(&raw)
        }
    }

    /// Serialize every section in order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = BytesMut::new();
        for section in &self.sections {
            out.extend_from_slice(&section.to_bytes()?);
        }
        Ok(out.to_vec())
    }

    /// Write the serialized file to `path`, truncating it.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Append the serialized sections to `path` (created when absent).
    pub fn append<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
        f.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Every packet block of every section, with its interface, in per-
    /// interface insertion order.
    pub fn iter_packets(&self) -> impl Iterator<Item = (&Interface, &PacketBlock)> {
        self.sections.iter().flat_map(|section| {
            section
                .interfaces
                .iter()
                .flat_map(|iface| iface.packets.iter().map(move |p| (iface, p)))
        })
    }

    /// Raw packet payloads of a capture file, in file order.
    pub fn read_packet_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u8>>, Error> {
        let mut file = File::new();
        file.read_file(path)?;
        Ok(file
            .iter_packets()
            .map(|(_, block)| block.data().to_vec())
            .collect())
    }

    /// Parsed packets of a capture file; each interface's link type selects
    /// the outermost header kind. The first failing packet surfaces its
    /// error — use [`File::each_packet`] for per-packet tolerance.
    pub fn read_packets<P: AsRef<Path>>(path: P) -> Result<Vec<Packet<'static>>, Error> {
        let mut out = Vec::new();
        let mut file = File::new();
        file.read_file(path)?;
        for (iface, block) in file.iter_packets() {
            out.push(parse_packet_block(iface, block)?);
        }
        Ok(out)
    }

    /// Walk a capture file, handing each packet's parse result and its
    /// timestamp (seconds, interface resolution applied) to `cb`.
    pub fn each_packet<P, F>(path: P, mut cb: F) -> Result<(), Error>
    where
        P: AsRef<Path>,
        F: FnMut(Result<Packet<'static>, Error>, f64),
    {
        let mut file = File::new();
        file.read_file(path)?;
        for (iface, block) in file.iter_packets() {
            let seconds = block.timestamp_units().unwrap_or(0) as f64 * iface.ts_resol();
            cb(parse_packet_block(iface, block), seconds);
        }
        Ok(())
    }

    /// Synthesize a file: one section, one IDB, one EPB per entry.
    /// Timestamps scale by the section's microsecond resolution; entries
    /// without an explicit timestamp continue `ts_inc` past the previous
    /// packet.
    pub fn from_packet_array<E>(
        entries: impl IntoIterator<Item = E>,
        opts: &SynthesisOptions,
    ) -> Result<File, Error>
    where
        E: Into<PacketEntry>,
    {
        let mut section = Section::new(opts.endian);
        section.add_interface(opts.link_type, 0)?;
        let mut next_ts = opts.timestamp;
        for entry in entries {
            let entry: PacketEntry = entry.into();
            let seconds = entry.timestamp.unwrap_or(next_ts);
            next_ts = seconds + opts.ts_inc;
            let units = seconds_to_units(seconds, 1_000_000);
            let epb = blocks::build_epb(opts.endian, 0, units, &entry.data)?;
            section.interfaces[0].packets.push(PacketBlock::Enhanced(epb));
        }
        Ok(File {
            sections: vec![section],
        })
    }

    /// Synthesize and write in one step. `append` is a strict boolean.
    pub fn array_to_file<P, E>(
        path: P,
        entries: impl IntoIterator<Item = E>,
        opts: &SynthesisOptions,
        append: bool,
    ) -> Result<(), Error>
    where
        P: AsRef<Path>,
        E: Into<PacketEntry>,
    {
        let file = File::from_packet_array(entries, opts)?;
        if append {
            file.append(path)
        } else {
            file.write(path)
        }
    }
}

fn parse_packet_block(iface: &Interface, block: &PacketBlock) -> Result<Packet<'static>, Error> {
    let registry = default_registry();
    let kind = Linktype(iface.link_type())
        .header_kind()
        .filter(|k| registry.get(k).is_some());
    match kind {
        Some(kind) => Packet::parse(block.data(), kind),
        None => guess_packet(iface.link_type(), block.data()),
    }
}

// Unknown link type: try the common link layers in declared order.
fn guess_packet(link_type: u32, data: &[u8]) -> Result<Packet<'static>, Error> {
    for kind in GUESS_ORDER {
        if let Ok(packet) = Packet::parse(data, kind) {
            if packet.outermost().is_some_and(Header::is_valid) {
                debug!(kind = *kind, link_type, "guessed link layer");
                return Ok(packet);
            }
        }
    }
    Err(PacketError::Unparseable { link_type }.into())
}

/// Scale seconds to timestamp units. The integral part is scaled in wide
/// integer arithmetic (exact), the fraction is rounded; the result wraps at
/// 64 bits like the on-wire field does.
fn seconds_to_units(seconds: f64, ticks_per_sec: u64) -> u64 {
    let whole = seconds.trunc() as u128 * u128::from(ticks_per_sec);
    let frac = (seconds.fract() * ticks_per_sec as f64).round() as u128;
    ((whole + frac) & u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_units() {
        assert_eq!(seconds_to_units(0.0, 1_000_000), 0);
        assert_eq!(seconds_to_units(1.5, 1_000_000), 1_500_000);
        assert_eq!(
            seconds_to_units(1_600_000_000.0, 1_000_000),
            1_600_000_000_000_000
        );
    }

    #[test]
    fn test_from_packet_array_shape() {
        let file = File::from_packet_array(
            vec![PacketEntry::from(vec![0xaa, 0xbb])],
            &SynthesisOptions::default(),
        )
        .unwrap();
        assert_eq!(file.sections.len(), 1);
        let section = &file.sections[0];
        assert_eq!(section.interfaces.len(), 1);
        assert_eq!(section.interfaces[0].packets.len(), 1);
        let block = &section.interfaces[0].packets[0];
        assert_eq!(block.data(), &[0xaa, 0xbb]);
        assert_eq!(block.orig_len(), 2);
    }

    #[test]
    fn test_timestamps_advance_by_increment() {
        let opts = SynthesisOptions {
            timestamp: 10.0,
            ts_inc: 2.0,
            ..SynthesisOptions::default()
        };
        let file = File::from_packet_array(
            vec![vec![1u8], vec![2u8], vec![3u8]],
            &opts,
        )
        .unwrap();
        let units: Vec<_> = file
            .iter_packets()
            .map(|(_, b)| b.timestamp_units().unwrap())
            .collect();
        assert_eq!(units, vec![10_000_000, 12_000_000, 14_000_000]);
    }

    #[test]
    fn test_explicit_timestamp_reseeds_the_clock() {
        let file = File::from_packet_array(
            vec![
                PacketEntry::from((100.0, vec![1u8])),
                PacketEntry::from(vec![2u8]),
            ],
            &SynthesisOptions::default(),
        )
        .unwrap();
        let units: Vec<_> = file
            .iter_packets()
            .map(|(_, b)| b.timestamp_units().unwrap())
            .collect();
        assert_eq!(units, vec![100_000_000, 101_000_000]);
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let file = File::from_packet_array(
            vec![vec![0xde, 0xad, 0xbe, 0xef]],
            &SynthesisOptions::default(),
        )
        .unwrap();
        let bytes = file.to_bytes().unwrap();
        let mut parsed = File::new();
        parsed.read(&bytes).unwrap();
        assert_eq!(parsed, file);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_read_appends_and_read_new_clears() {
        let bytes = File::from_packet_array(vec![vec![1u8]], &SynthesisOptions::default())
            .unwrap()
            .to_bytes()
            .unwrap();
        let mut file = File::new();
        file.read(&bytes).unwrap();
        file.read(&bytes).unwrap();
        assert_eq!(file.sections.len(), 2);
        file.read_new(&bytes).unwrap();
        assert_eq!(file.sections.len(), 1);
    }
}
