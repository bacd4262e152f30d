//! Internet checksum (RFC 1071) and transport pseudo-headers.

use crate::field::Value;
use crate::header::Header;

/// Ones-complement sum over the concatenation of `chunks`, folded to 16
/// bits. Odd-length input is padded with a zero byte.
pub fn rfc1071(chunks: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut bytes = chunks.iter().flat_map(|c| c.iter().copied());
    loop {
        match (bytes.next(), bytes.next()) {
            (Some(hi), Some(lo)) => sum += u32::from(u16::from_be_bytes([hi, lo])),
            (Some(hi), None) => {
                sum += u32::from(hi) << 8;
                break;
            }
            (None, _) => break,
        }
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Transport checksum over the enclosing IP pseudo-header, the header's own
/// bytes (checksum field zeroed) and everything after it.
///
/// `stack[..idx]` is searched backwards for the nearest IP or IPv6 header;
/// with none present the pseudo-header is omitted.
pub(crate) fn transport(
    stack: &[Header],
    idx: usize,
    own: &[u8],
    inner: &[u8],
    proto: u8,
) -> u16 {
    let len = own.len() + inner.len();
    let Some(ip) = stack[..idx]
        .iter()
        .rev()
        .find(|h| matches!(h.name(), "IP" | "IPv6"))
    else {
        return rfc1071(&[own, inner]);
    };

    let mut pseudo = Vec::with_capacity(40);
    if ip.name() == "IP" {
        let src = ip
            .get("src_ip")
            .and_then(Value::as_ipv4)
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
        let dst = ip
            .get("dst_ip")
            .and_then(Value::as_ipv4)
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.push(0);
        pseudo.push(proto);
        pseudo.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        let src = ip
            .get("src_ip")
            .and_then(Value::as_ipv6)
            .unwrap_or(std::net::Ipv6Addr::UNSPECIFIED);
        let dst = ip
            .get("dst_ip")
            .and_then(Value::as_ipv6)
            .unwrap_or(std::net::Ipv6Addr::UNSPECIFIED);
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.extend_from_slice(&(len as u32).to_be_bytes());
        pseudo.extend_from_slice(&[0, 0, 0, proto]);
    }
    rfc1071(&[&pseudo, own, inner])
}
