//! Field types: wire encoding and value coercion.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use compact_str::CompactString;

use crate::error::FieldError;

use super::{Endian, MacAddr, Value};

/// Width of a fixed-size integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W24,
    W32,
    W64,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W24 => 3,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// Bidirectional name <-> value map for enumerated integer fields.
pub type NameMap = &'static [(&'static str, u64)];

/// Look up the name for a value in an enum map.
pub fn enum_name(map: NameMap, value: u64) -> Option<&'static str> {
    map.iter().find(|(_, v)| *v == value).map(|(n, _)| *n)
}

/// Look up the value for a name in an enum map.
pub fn enum_value(map: NameMap, name: &str) -> Option<u64> {
    map.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// Wire type of a header field.
///
/// Each type knows how to read itself from a buffer, write itself back,
/// report its wire size, and produce a default value. Variable-length types
/// receive their read length (or element count) as a parameter, resolved by
/// the enclosing header from the field's builder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Fixed-width integer. `endian: None` inherits the header instance
    /// endian; `Some` wins over it.
    Int {
        width: IntWidth,
        signed: bool,
        endian: Option<Endian>,
    },
    /// Fixed-size byte string.
    Bytes(usize),
    /// Null-terminated string; read consumes through the first zero byte,
    /// write appends it.
    CStr,
    /// String whose read length comes from the field builder.
    VarStr,
    /// Byte run whose read length comes from the field builder; with no
    /// builder it consumes the remaining buffer (opaque body).
    VarBytes,
    /// IPv4 address (4 bytes).
    Ipv4,
    /// IPv6 address (16 bytes).
    Ipv6,
    /// MAC address (6 bytes).
    Mac,
    /// `N` elements of the inner type; `N` comes from the field builder.
    Array(Box<FieldType>),
}

impl FieldType {
    pub const fn u8() -> Self {
        FieldType::Int {
            width: IntWidth::W8,
            signed: false,
            endian: None,
        }
    }

    pub const fn u16() -> Self {
        FieldType::Int {
            width: IntWidth::W16,
            signed: false,
            endian: None,
        }
    }

    pub const fn u24() -> Self {
        FieldType::Int {
            width: IntWidth::W24,
            signed: false,
            endian: None,
        }
    }

    pub const fn u32() -> Self {
        FieldType::Int {
            width: IntWidth::W32,
            signed: false,
            endian: None,
        }
    }

    pub const fn u64() -> Self {
        FieldType::Int {
            width: IntWidth::W64,
            signed: false,
            endian: None,
        }
    }

    pub const fn i8() -> Self {
        FieldType::Int {
            width: IntWidth::W8,
            signed: true,
            endian: None,
        }
    }

    pub const fn i16() -> Self {
        FieldType::Int {
            width: IntWidth::W16,
            signed: true,
            endian: None,
        }
    }

    pub const fn i32() -> Self {
        FieldType::Int {
            width: IntWidth::W32,
            signed: true,
            endian: None,
        }
    }

    pub const fn i64() -> Self {
        FieldType::Int {
            width: IntWidth::W64,
            signed: true,
            endian: None,
        }
    }

    pub fn array(elem: FieldType) -> Self {
        FieldType::Array(Box::new(elem))
    }

    /// Pin an integer field to an explicit endian, overriding the header's.
    pub fn with_endian(mut self, e: Endian) -> Self {
        if let FieldType::Int { endian, .. } = &mut self {
            *endian = Some(e);
        }
        self
    }

    /// Read a value from the front of `buf`.
    ///
    /// `param` is the builder-resolved length (bytes) or element count for
    /// variable-length types. Returns the value and the number of bytes
    /// consumed.
    pub fn read(
        &self,
        name: &'static str,
        buf: &[u8],
        endian: Endian,
        param: Option<usize>,
    ) -> Result<(Value, usize), FieldError> {
        match self {
            FieldType::Int {
                width,
                signed,
                endian: explicit,
            } => {
                let n = width.bytes();
                ensure(name, buf, n)?;
                let raw = read_uint(&buf[..n], explicit.unwrap_or(endian));
                let value = if *signed {
                    Value::I64(sign_extend(raw, width.bits()))
                } else {
                    unsigned_value(*width, raw)
                };
                Ok((value, n))
            }
            FieldType::Bytes(n) => {
                ensure(name, buf, *n)?;
                Ok((Value::Bytes(buf[..*n].to_vec()), *n))
            }
            FieldType::CStr => match buf.iter().position(|&b| b == 0) {
                Some(idx) => {
                    let s = std::str::from_utf8(&buf[..idx])
                        .map_err(|_| invalid(name, "string is not valid UTF-8"))?;
                    Ok((Value::Str(CompactString::new(s)), idx + 1))
                }
                None => Err(FieldError::Truncated {
                    field: name,
                    needed: buf.len() + 1,
                    have: buf.len(),
                }),
            },
            FieldType::VarStr => {
                let n = param.unwrap_or(buf.len());
                ensure(name, buf, n)?;
                let s = std::str::from_utf8(&buf[..n])
                    .map_err(|_| invalid(name, "string is not valid UTF-8"))?;
                Ok((Value::Str(CompactString::new(s)), n))
            }
            FieldType::VarBytes => {
                let n = param.unwrap_or(buf.len());
                ensure(name, buf, n)?;
                Ok((Value::Bytes(buf[..n].to_vec()), n))
            }
            FieldType::Ipv4 => {
                ensure(name, buf, 4)?;
                let octets: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
                Ok((Value::Ipv4(Ipv4Addr::from(octets)), 4))
            }
            FieldType::Ipv6 => {
                ensure(name, buf, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[..16]);
                Ok((Value::Ipv6(Ipv6Addr::from(octets)), 16))
            }
            FieldType::Mac => {
                ensure(name, buf, 6)?;
                let mut octets = [0u8; 6];
                octets.copy_from_slice(&buf[..6]);
                Ok((Value::Mac(MacAddr(octets)), 6))
            }
            FieldType::Array(elem) => {
                let count = param
                    .ok_or_else(|| invalid(name, "array field requires a builder for its count"))?;
                let mut items = Vec::with_capacity(count.min(64));
                let mut cursor = 0;
                for _ in 0..count {
                    let (v, n) = elem.read(name, &buf[cursor..], endian, None)?;
                    items.push(v);
                    cursor += n;
                }
                Ok((Value::List(items), cursor))
            }
        }
    }

    /// Append the wire image of `value` to `out`.
    ///
    /// Values are validated on assignment, so writing is infallible; a value
    /// of the wrong shape serializes as its type's zero image.
    pub fn write(&self, value: &Value, endian: Endian, out: &mut BytesMut) {
        match self {
            FieldType::Int {
                width,
                signed,
                endian: explicit,
            } => {
                let raw = if *signed {
                    value.as_i64().unwrap_or(0) as u64
                } else {
                    value.as_u64().unwrap_or(0)
                };
                put_uint(out, raw, width.bytes(), explicit.unwrap_or(endian));
            }
            FieldType::Bytes(n) => {
                let b = value.as_bytes().unwrap_or(&[]);
                let take = b.len().min(*n);
                out.put_slice(&b[..take]);
                out.put_bytes(0, n - take);
            }
            FieldType::CStr => {
                out.put_slice(value.as_str().unwrap_or("").as_bytes());
                out.put_u8(0);
            }
            FieldType::VarStr => {
                out.put_slice(value.as_str().unwrap_or("").as_bytes());
            }
            FieldType::VarBytes => {
                out.put_slice(value.as_bytes().unwrap_or(&[]));
            }
            FieldType::Ipv4 => {
                let a = value.as_ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED);
                out.put_slice(&a.octets());
            }
            FieldType::Ipv6 => {
                let a = value.as_ipv6().unwrap_or(Ipv6Addr::UNSPECIFIED);
                out.put_slice(&a.octets());
            }
            FieldType::Mac => {
                let m = value.as_mac().unwrap_or_default();
                out.put_slice(&m.octets());
            }
            FieldType::Array(elem) => {
                for item in value.as_list().unwrap_or(&[]) {
                    elem.write(item, endian, out);
                }
            }
        }
    }

    /// Wire length of `value` under this type.
    pub fn wire_size(&self, value: &Value) -> usize {
        match self {
            FieldType::Int { width, .. } => width.bytes(),
            FieldType::Bytes(n) => *n,
            FieldType::CStr => value.as_str().map_or(0, str::len) + 1,
            FieldType::VarStr => value.as_str().map_or(0, str::len),
            FieldType::VarBytes => value.as_bytes().map_or(0, <[u8]>::len),
            FieldType::Ipv4 => 4,
            FieldType::Ipv6 => 16,
            FieldType::Mac => 6,
            FieldType::Array(elem) => value
                .as_list()
                .map_or(0, |items| items.iter().map(|v| elem.wire_size(v)).sum()),
        }
    }

    /// Zero value of this type.
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::Int { signed: true, .. } => Value::I64(0),
            FieldType::Int { width, .. } => unsigned_value(*width, 0),
            FieldType::Bytes(n) => Value::Bytes(vec![0; *n]),
            FieldType::CStr | FieldType::VarStr => Value::Str(CompactString::default()),
            FieldType::VarBytes => Value::Bytes(Vec::new()),
            FieldType::Ipv4 => Value::Ipv4(Ipv4Addr::UNSPECIFIED),
            FieldType::Ipv6 => Value::Ipv6(Ipv6Addr::UNSPECIFIED),
            FieldType::Mac => Value::Mac(MacAddr::default()),
            FieldType::Array(_) => Value::List(Vec::new()),
        }
    }

    /// Validate and canonicalise an assigned value.
    ///
    /// Accepts the small union of user-friendly input forms: integers (range
    /// checked), enum names on enumerated fields, address strings on address
    /// fields, raw bytes of the right length. Everything else is
    /// `InvalidValue`.
    pub fn coerce(
        &self,
        name: &str,
        value: Value,
        names: Option<NameMap>,
    ) -> Result<Value, FieldError> {
        match self {
            FieldType::Int {
                width,
                signed: true,
                ..
            } => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| invalid(name, "expected an integer"))?;
                let bits = width.bits();
                if bits < 64 {
                    let min = -(1i64 << (bits - 1));
                    let max = (1i64 << (bits - 1)) - 1;
                    if v < min || v > max {
                        return Err(invalid(
                            name,
                            format!("{v} out of range for a {bits}-bit signed field"),
                        ));
                    }
                }
                Ok(Value::I64(v))
            }
            FieldType::Int { width, .. } => {
                let raw = match &value {
                    Value::Str(s) => {
                        let map =
                            names.ok_or_else(|| invalid(name, "not an enumerated field"))?;
                        enum_value(map, s.as_str())
                            .ok_or_else(|| invalid(name, format!("unknown enum name {s:?}")))?
                    }
                    _ => value
                        .as_u64()
                        .ok_or_else(|| invalid(name, "expected an integer or enum name"))?,
                };
                let bits = width.bits();
                if bits < 64 && raw > (1u64 << bits) - 1 {
                    return Err(invalid(
                        name,
                        format!("{raw} out of range for a {bits}-bit field"),
                    ));
                }
                Ok(unsigned_value(*width, raw))
            }
            FieldType::Bytes(n) => match value {
                Value::Bytes(b) if b.len() == *n => Ok(Value::Bytes(b)),
                Value::Bytes(b) => Err(invalid(
                    name,
                    format!("expected exactly {n} bytes, got {}", b.len()),
                )),
                _ => Err(invalid(name, "expected bytes")),
            },
            FieldType::CStr => match value {
                Value::Str(s) if s.contains('\0') => {
                    Err(invalid(name, "string contains an embedded NUL"))
                }
                Value::Str(s) => Ok(Value::Str(s)),
                _ => Err(invalid(name, "expected a string")),
            },
            FieldType::VarStr => match value {
                Value::Str(s) => Ok(Value::Str(s)),
                _ => Err(invalid(name, "expected a string")),
            },
            FieldType::VarBytes => match value {
                Value::Bytes(b) => Ok(Value::Bytes(b)),
                _ => Err(invalid(name, "expected bytes")),
            },
            FieldType::Ipv4 => match value {
                Value::Ipv4(a) => Ok(Value::Ipv4(a)),
                Value::Str(s) => s
                    .parse::<Ipv4Addr>()
                    .map(Value::Ipv4)
                    .map_err(|_| invalid(name, format!("bad IPv4 address {s:?}"))),
                Value::Bytes(b) if b.len() == 4 => {
                    Ok(Value::Ipv4(Ipv4Addr::new(b[0], b[1], b[2], b[3])))
                }
                _ => Err(invalid(name, "expected an IPv4 address")),
            },
            FieldType::Ipv6 => match value {
                Value::Ipv6(a) => Ok(Value::Ipv6(a)),
                Value::Str(s) => s
                    .parse::<Ipv6Addr>()
                    .map(Value::Ipv6)
                    .map_err(|_| invalid(name, format!("bad IPv6 address {s:?}"))),
                Value::Bytes(b) if b.len() == 16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(&b);
                    Ok(Value::Ipv6(Ipv6Addr::from(octets)))
                }
                _ => Err(invalid(name, "expected an IPv6 address")),
            },
            FieldType::Mac => match value {
                Value::Mac(m) => Ok(Value::Mac(m)),
                Value::Str(s) => s.parse::<MacAddr>().map(Value::Mac).map_err(|_| {
                    invalid(name, format!("bad MAC address {s:?}"))
                }),
                Value::Bytes(b) if b.len() == 6 => {
                    let mut octets = [0u8; 6];
                    octets.copy_from_slice(&b);
                    Ok(Value::Mac(MacAddr(octets)))
                }
                _ => Err(invalid(name, "expected a MAC address")),
            },
            FieldType::Array(elem) => match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(elem.coerce(name, item, None)?);
                    }
                    Ok(Value::List(out))
                }
                _ => Err(invalid(name, "expected a list")),
            },
        }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> FieldError {
    FieldError::InvalidValue {
        field: name.to_string(),
        reason: reason.into(),
    }
}

fn ensure(name: &'static str, buf: &[u8], needed: usize) -> Result<(), FieldError> {
    if buf.len() < needed {
        Err(FieldError::Truncated {
            field: name,
            needed,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn read_uint(bytes: &[u8], endian: Endian) -> u64 {
    match endian {
        Endian::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
    }
}

fn put_uint(out: &mut BytesMut, raw: u64, n: usize, endian: Endian) {
    match endian {
        Endian::Big => {
            for i in (0..n).rev() {
                out.put_u8((raw >> (i * 8)) as u8);
            }
        }
        Endian::Little => {
            for i in 0..n {
                out.put_u8((raw >> (i * 8)) as u8);
            }
        }
    }
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn unsigned_value(width: IntWidth, raw: u64) -> Value {
    match width {
        IntWidth::W8 => Value::U8(raw as u8),
        IntWidth::W16 => Value::U16(raw as u16),
        IntWidth::W24 | IntWidth::W32 => Value::U32(raw as u32),
        IntWidth::W64 => Value::U64(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_both_endians() {
        let buf = [0x12, 0x34];
        let (v, n) = FieldType::u16().read("f", &buf, Endian::Big, None).unwrap();
        assert_eq!(v, Value::U16(0x1234));
        assert_eq!(n, 2);

        let (v, _) = FieldType::u16()
            .read("f", &buf, Endian::Little, None)
            .unwrap();
        assert_eq!(v, Value::U16(0x3412));
    }

    #[test]
    fn test_explicit_endian_overrides_header() {
        let ty = FieldType::u32().with_endian(Endian::Little);
        let buf = [0x01, 0x00, 0x00, 0x00];
        let (v, _) = ty.read("f", &buf, Endian::Big, None).unwrap();
        assert_eq!(v, Value::U32(1));
    }

    #[test]
    fn test_read_u24() {
        let buf = [0x01, 0x02, 0x03];
        let (v, n) = FieldType::u24().read("f", &buf, Endian::Big, None).unwrap();
        assert_eq!(v, Value::U32(0x010203));
        assert_eq!(n, 3);
    }

    #[test]
    fn test_signed_read_sign_extends() {
        let buf = [0xff, 0xfe];
        let (v, _) = FieldType::i16().read("f", &buf, Endian::Big, None).unwrap();
        assert_eq!(v, Value::I64(-2));
    }

    #[test]
    fn test_truncated_read() {
        let err = FieldType::u32().read("f", &[0x01], Endian::Big, None);
        assert!(matches!(
            err,
            Err(FieldError::Truncated {
                needed: 4,
                have: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_write_round_trip_u64_le() {
        let ty = FieldType::u64().with_endian(Endian::Little);
        let mut out = BytesMut::new();
        ty.write(&Value::U64(0x0102030405060708), Endian::Big, &mut out);
        let (v, _) = ty.read("f", &out, Endian::Big, None).unwrap();
        assert_eq!(v, Value::U64(0x0102030405060708));
    }

    #[test]
    fn test_cstr_read_consumes_nul() {
        let buf = b"file\0rest";
        let (v, n) = FieldType::CStr.read("f", buf, Endian::Big, None).unwrap();
        assert_eq!(v.as_str(), Some("file"));
        assert_eq!(n, 5);
    }

    #[test]
    fn test_cstr_without_nul_is_truncated() {
        let err = FieldType::CStr.read("f", b"file", Endian::Big, None);
        assert!(matches!(err, Err(FieldError::Truncated { .. })));
    }

    #[test]
    fn test_cstr_write_appends_nul() {
        let mut out = BytesMut::new();
        FieldType::CStr.write(&Value::Str("abc".into()), Endian::Big, &mut out);
        assert_eq!(&out[..], b"abc\0");
    }

    #[test]
    fn test_cstr_rejects_embedded_nul() {
        let err = FieldType::CStr.coerce("f", Value::Str("a\0b".into()), None);
        assert!(matches!(err, Err(FieldError::InvalidValue { .. })));
    }

    #[test]
    fn test_var_bytes_consumes_remaining_without_param() {
        let buf = [1, 2, 3, 4];
        let (v, n) = FieldType::VarBytes
            .read("f", &buf, Endian::Big, None)
            .unwrap();
        assert_eq!(v.as_bytes(), Some(&buf[..]));
        assert_eq!(n, 4);
    }

    #[test]
    fn test_var_bytes_bounded_by_param() {
        let buf = [1, 2, 3, 4];
        let (v, n) = FieldType::VarBytes
            .read("f", &buf, Endian::Big, Some(2))
            .unwrap();
        assert_eq!(v.as_bytes(), Some(&buf[..2]));
        assert_eq!(n, 2);
    }

    #[test]
    fn test_array_reads_count_elements() {
        let buf = [0x00, 0x01, 0x00, 0x02, 0xff];
        let ty = FieldType::array(FieldType::u16());
        let (v, n) = ty.read("f", &buf, Endian::Big, Some(2)).unwrap();
        assert_eq!(
            v.as_list(),
            Some(&[Value::U16(1), Value::U16(2)][..])
        );
        assert_eq!(n, 4);
    }

    #[test]
    fn test_array_requires_count() {
        let err = FieldType::array(FieldType::u16()).read("f", &[], Endian::Big, None);
        assert!(matches!(err, Err(FieldError::InvalidValue { .. })));
    }

    #[test]
    fn test_coerce_range_check() {
        assert!(FieldType::u8().coerce("f", Value::U16(256), None).is_err());
        assert!(FieldType::u8().coerce("f", Value::U16(255), None).is_ok());
        assert!(FieldType::i8().coerce("f", Value::I64(-129), None).is_err());
        assert!(FieldType::i8().coerce("f", Value::I64(-128), None).is_ok());
    }

    #[test]
    fn test_coerce_enum_name() {
        const MAP: NameMap = &[("IPv4", 0x0800), ("ARP", 0x0806)];
        let v = FieldType::u16()
            .coerce("ethertype", Value::Str("IPv4".into()), Some(MAP))
            .unwrap();
        assert_eq!(v, Value::U16(0x0800));

        let err = FieldType::u16().coerce("ethertype", Value::Str("nope".into()), Some(MAP));
        assert!(matches!(err, Err(FieldError::InvalidValue { .. })));
    }

    #[test]
    fn test_coerce_address_strings() {
        let v = FieldType::Ipv4
            .coerce("src_ip", Value::Str("10.0.0.1".into()), None)
            .unwrap();
        assert_eq!(v.as_ipv4(), Some("10.0.0.1".parse().unwrap()));

        let v = FieldType::Ipv6
            .coerce("src_ip", Value::Str("2001:db8::1".into()), None)
            .unwrap();
        assert_eq!(v.as_ipv6(), Some("2001:db8::1".parse().unwrap()));

        let v = FieldType::Mac
            .coerce("src_mac", Value::Str("00:11:22:33:44:55".into()), None)
            .unwrap();
        assert_eq!(v.as_mac().map(|m| m.octets()), Some([0, 0x11, 0x22, 0x33, 0x44, 0x55]));

        let err = FieldType::Ipv4.coerce("src_ip", Value::Str("not-an-ip".into()), None);
        assert!(matches!(err, Err(FieldError::InvalidValue { .. })));
    }

    #[test]
    fn test_wire_size_tracks_value() {
        assert_eq!(FieldType::u24().wire_size(&Value::U32(0)), 3);
        assert_eq!(
            FieldType::CStr.wire_size(&Value::Str("octet".into())),
            6
        );
        let list = Value::List(vec![Value::U16(1), Value::U16(2)]);
        assert_eq!(FieldType::array(FieldType::u16()).wire_size(&list), 4);
    }
}
