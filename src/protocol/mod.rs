//! Protocol catalog.
//!
//! Each protocol here is an instance of the header framework: a schema
//! declared at load time, plus the bindings that let [`crate::packet::Packet`]
//! dispatch into it. The catalog is intentionally small — enough to cover
//! the common stacking paths (Ethernet / IP / IPv6 / UDP / TCP / ICMPv6 /
//! TFTP); new protocols register the same way these do.

pub mod checksum;

mod ethernet;
mod icmpv6;
mod ipv4;
mod ipv6;
mod tcp;
mod tftp;
mod udp;

use std::sync::LazyLock;

use crate::header::Registry;

pub use ethernet::{ETHERTYPES, KIND as ETH_KIND};
pub use icmpv6::{KIND as ICMPV6_KIND, MLD_KIND, MLQ_KIND, TYPES as ICMPV6_TYPES};
pub use ipv4::{KIND as IPV4_KIND, PROTOCOLS as IP_PROTOCOLS};
pub use ipv6::KIND as IPV6_KIND;
pub use tcp::{IP_PROTO_TCP, KIND as TCP_KIND};
pub use tftp::{
    ACK_KIND as TFTP_ACK_KIND, DATA_KIND as TFTP_DATA_KIND, ERROR_KIND as TFTP_ERROR_KIND,
    KIND as TFTP_KIND, RRQ_KIND as TFTP_RRQ_KIND, TFTP_PORT, WRQ_KIND as TFTP_WRQ_KIND,
};
pub use udp::{IP_PROTO_UDP, KIND as UDP_KIND};

static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let mut reg = Registry::new();

    // Layer 2
    ethernet::register(&mut reg);

    // Layer 3
    ipv4::register(&mut reg);
    ipv6::register(&mut reg);

    // Layer 4
    udp::register(&mut reg);
    tcp::register(&mut reg);
    icmpv6::register(&mut reg);

    // Application layer
    tftp::register(&mut reg);

    // PCAP-NG block kinds live in the same table so blocks get the same
    // field-driven read as protocol headers
    crate::pcapng::register(&mut reg);

    reg
});

/// The process-wide registry with all built-in header kinds and bindings.
///
/// Built once on first use and immutable afterwards; safe to read from any
/// thread. Tests and embedders wanting different bindings build their own
/// [`Registry`] and use the `*_with` packet constructors.
pub fn default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}
