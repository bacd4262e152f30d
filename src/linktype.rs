//! Link-layer type registry.

use std::fmt;

/// Data link type as carried in capture files (IDB `link_type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Linktype(pub u32);

impl Linktype {
    pub const NULL: Linktype = Linktype(0);
    pub const ETHERNET: Linktype = Linktype(1);
    pub const RAW: Linktype = Linktype(101);
    pub const IEEE802_11: Linktype = Linktype(105);
    pub const RADIOTAP: Linktype = Linktype(127);
    pub const PPI: Linktype = Linktype(192);
    pub const IPV4: Linktype = Linktype(228);
    pub const IPV6: Linktype = Linktype(229);

    /// Header kind framing capture bytes of this link type. Kinds the
    /// catalog does not implement (802.11 and its wrappers) still map here
    /// and fall back to guessing when absent from the registry.
    pub fn header_kind(self) -> Option<&'static str> {
        match self {
            Linktype::ETHERNET => Some("Eth"),
            Linktype::IEEE802_11 => Some("Dot11"),
            Linktype::RADIOTAP => Some("RadioTap"),
            Linktype::PPI => Some("PPI"),
            Linktype::IPV4 => Some("IP"),
            Linktype::IPV6 => Some("IPv6"),
            _ => None,
        }
    }
}

/// Kinds tried, in order, when a link type is unknown or unregistered: the
/// first whose read succeeds and whose validate hook accepts wins.
pub(crate) const GUESS_ORDER: &[&str] = &["Eth", "IP", "IPv6"];

impl fmt::Display for Linktype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.header_kind() {
            Some(kind) => write!(f, "{kind}"),
            None => write!(f, "LINKTYPE_{}", self.0),
        }
    }
}
