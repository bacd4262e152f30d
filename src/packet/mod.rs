//! Packet composition engine.
//!
//! A [`Packet`] is an ordered, non-empty stack of headers plus a trailing
//! opaque payload. Headers are pushed with [`Packet::add`] (the binding
//! table pre-fills the lower header's discriminator fields) or produced by
//! [`Packet::parse`], which walks the binding table to identify each next
//! layer. Serialization reconciles calculable fields (lengths, counters,
//! checksums) from the innermost header outwards before concatenating.

pub mod binding;

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::trace;

use crate::error::{Error, PacketError};
use crate::field::Value;
use crate::header::{Calc, Header, Registry};
use crate::protocol::default_registry;

pub use binding::{Binding, BindingTable, FieldCheck, MatchOp, Pred, PredFn};

/// An ordered stack of header instances plus a payload buffer.
///
/// The registry is borrowed so tests and embedders can inject their own;
/// the zero-argument constructors use the process-wide default.
#[derive(Debug, Clone)]
pub struct Packet<'r> {
    registry: &'r Registry,
    headers: Vec<Header>,
    payload: Vec<u8>,
}

impl PartialEq for Packet<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.headers == other.headers && self.payload == other.payload
    }
}

impl Packet<'static> {
    /// Start a packet with an outermost header of `kind` (no binding is
    /// consulted for the first header).
    pub fn gen(kind: &str) -> Result<Self, Error> {
        Self::gen_with(default_registry(), kind)
    }

    /// Parse `bytes` starting from `first` as the outermost header kind.
    pub fn parse(bytes: &[u8], first: &str) -> Result<Self, Error> {
        Self::parse_with(default_registry(), bytes, first)
    }
}

impl<'r> Packet<'r> {
    /// Empty packet bound to an injected registry.
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry,
            headers: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// As [`Packet::gen`], against an injected registry.
    pub fn gen_with(registry: &'r Registry, kind: &str) -> Result<Self, Error> {
        let mut packet = Self::with_registry(registry);
        packet.headers.push(registry.header(kind)?);
        Ok(packet)
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Push a header of `kind` onto the stack.
    ///
    /// The binding from the current top to `kind` supplies the field
    /// assignments that make the lower header advertise the new layer
    /// (`IP.protocol = 17` when UDP is added). Adding a subkind
    /// (`"TFTP::ACK"`) falls back to the parent kind's binding. Fails with
    /// `UnboundStack` when no binding links the top to `kind`.
    pub fn add(&mut self, kind: &str) -> Result<&mut Header, Error> {
        let schema = match self.registry.get(kind) {
            Some(s) => Arc::clone(s),
            None => {
                return Err(PacketError::UnknownHeader {
                    name: kind.to_string(),
                }
                .into())
            }
        };
        if let Some(top_idx) = self.headers.len().checked_sub(1) {
            let lower_kind = self.headers[top_idx].name();
            let table = self.registry.bindings();
            let binding = table
                .defaults_for(lower_kind, kind)
                .or_else(|| base_kind(kind).and_then(|base| table.defaults_for(lower_kind, base)))
                .ok_or_else(|| PacketError::UnboundStack {
                    lower: lower_kind.to_string(),
                    upper: kind.to_string(),
                })?;
            for (field, value) in binding.setters() {
                self.headers[top_idx].set(field, value)?;
            }
        }
        self.headers.push(Header::new(schema));
        let idx = self.headers.len() - 1;
        Ok(&mut self.headers[idx])
    }

    /// True when the stack contains a header of `kind` (subkinds count as
    /// their parent: a `TFTP::ACK` answers to `"TFTP"` too).
    pub fn is(&self, kind: &str) -> bool {
        self.headers.iter().any(|h| kind_matches(h.name(), kind))
    }

    /// The `index`-th header of `kind` (same kind matching as [`Packet::is`]).
    pub fn header(&self, kind: &str, index: usize) -> Option<&Header> {
        self.headers
            .iter()
            .filter(|h| kind_matches(h.name(), kind))
            .nth(index)
    }

    pub fn header_mut(&mut self, kind: &str, index: usize) -> Option<&mut Header> {
        self.headers
            .iter_mut()
            .filter(|h| kind_matches(h.name(), kind))
            .nth(index)
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn outermost(&self) -> Option<&Header> {
        self.headers.first()
    }

    pub fn innermost(&self) -> Option<&Header> {
        self.headers.last()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    /// Reconcile calculable fields: counters and length fields first, then
    /// checksums, each from the innermost header outwards. Idempotent.
    pub fn recalc(&mut self) -> Result<(), Error> {
        for idx in (0..self.headers.len()).rev() {
            let schema = Arc::clone(self.headers[idx].schema());
            for def in schema.fields() {
                let Some(calc) = def.calc else { continue };
                let value = match calc {
                    Calc::CountOf(field) => self.headers[idx]
                        .get(field)
                        .and_then(Value::list_len)
                        .unwrap_or(0) as u64,
                    Calc::LengthOf(field) => {
                        let header = &self.headers[idx];
                        header
                            .schema()
                            .field(field)
                            .zip(header.get(field))
                            .map_or(0, |(d, v)| d.ty.wire_size(v)) as u64
                    }
                    Calc::PayloadLength { include_header } => {
                        let mut len = self.inner_len(idx);
                        if include_header {
                            len += self.headers[idx].wire_size();
                        }
                        len as u64
                    }
                };
                self.headers[idx].set(def.name, value)?;
            }
        }
        for idx in (0..self.headers.len()).rev() {
            let Some(spec) = self.headers[idx].schema().checksum else {
                continue;
            };
            self.headers[idx].set(spec.field, 0u64)?;
            let own = self.headers[idx].to_bytes();
            let inner = self.inner_bytes(idx);
            let sum = (spec.compute)(&self.headers, idx, &own, &inner);
            self.headers[idx].set(spec.field, sum)?;
        }
        Ok(())
    }

    /// Reconcile calculable fields, then concatenate every header's wire
    /// image followed by the payload.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.recalc()?;
        let mut out = BytesMut::new();
        for header in &self.headers {
            header.write(&mut out);
        }
        out.extend_from_slice(&self.payload);
        Ok(out.to_vec())
    }

    /// As [`Packet::parse`], against an injected registry.
    ///
    /// Layers are identified by the binding table: after each header is
    /// read, the matching binding (most specific first, then registration
    /// order; `AmbiguousBinding` on equal-specificity conflicts) names the
    /// next kind. Remaining bytes become the payload.
    pub fn parse_with(
        registry: &'r Registry,
        bytes: &[u8],
        first: &str,
    ) -> Result<Packet<'r>, Error> {
        let mut packet = Self::with_registry(registry);
        let mut rest = bytes;
        let mut schema = match registry.get(first) {
            Some(s) => Arc::clone(s),
            None => {
                return Err(PacketError::UnknownHeader {
                    name: first.to_string(),
                }
                .into())
            }
        };
        loop {
            let mut header = Header::new(schema);
            let consumed = header.read(rest)?;
            rest = &rest[consumed..];
            let next = registry.bindings().resolve(&header, rest)?;
            trace!(header = header.name(), consumed, "parsed layer");
            packet.headers.push(header);
            match next {
                Some(upper) if !rest.is_empty() => match registry.get(upper) {
                    Some(s) => schema = Arc::clone(s),
                    None => break,
                },
                _ => break,
            }
        }
        packet.payload = rest.to_vec();
        Ok(packet)
    }

    // Wire length of everything stacked after header `idx`, payload included.
    fn inner_len(&self, idx: usize) -> usize {
        self.headers[idx + 1..]
            .iter()
            .map(Header::wire_size)
            .sum::<usize>()
            + self.payload.len()
    }

    fn inner_bytes(&self, idx: usize) -> Vec<u8> {
        let mut out = BytesMut::new();
        for header in &self.headers[idx + 1..] {
            header.write(&mut out);
        }
        out.extend_from_slice(&self.payload);
        out.to_vec()
    }
}

fn base_kind(kind: &str) -> Option<&str> {
    kind.split_once("::").map(|(base, _)| base)
}

fn kind_matches(header_name: &str, kind: &str) -> bool {
    header_name == kind || base_kind(header_name) == Some(kind)
}

impl fmt::Display for Packet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            writeln!(f, "{header}")?;
        }
        if !self.payload.is_empty() {
            writeln!(f, "payload: [{} bytes]", self.payload.len())?;
        }
        Ok(())
    }
}
