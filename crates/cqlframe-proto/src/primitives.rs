//! Read/write/size functions for the protocol's primitive wire types.
//!
//! Every function is generic over the [`Buf`] / [`BufMut`] capability traits;
//! codec bodies never name a concrete buffer type. The buffer handle carries
//! its own cursor and bounds, so these functions work identically against a
//! network buffer, a scratch `BytesMut`, or a plain byte slice.
//!
//! # Invariants
//!
//! - Every `write_x` has a paired `size_of_x` and the two agree for every
//!   input: `size_of_x(v)` is exactly the number of bytes `write_x(v)` puts.
//! - Reads validate availability before touching the buffer; a short read
//!   fails with [`ProtocolViolation::Truncated`] and never panics.
//! - `[bytes]` distinguishes null (length −1) from empty (length 0).
//!
//! All multi-byte integers are big-endian per the native protocol.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::{
    collections::OrderedMap,
    errors::{CodecError, ProtocolViolation, Result},
};

/// Null sentinel in the `[bytes]` length prefix.
pub const BYTES_NULL: i32 = -1;
/// Unset sentinel in the `[value]` length prefix (v4 and later).
pub const BYTES_UNSET: i32 = -2;

fn ensure<B: Buf + ?Sized>(buf: &B, needed: usize) -> Result<()> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(ProtocolViolation::Truncated { needed, remaining }.into());
    }
    Ok(())
}

fn short_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| CodecError::invalid(format!("{what} length {len} exceeds unsigned short")))
}

fn int_len(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| CodecError::invalid(format!("{what} length {len} exceeds int")))
}

/// Read a single `[byte]`.
pub fn read_byte<B: Buf + ?Sized>(buf: &mut B) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

/// Write a single `[byte]`.
pub fn write_byte<B: BufMut + ?Sized>(buf: &mut B, value: u8) {
    buf.put_u8(value);
}

/// Read an unsigned 16-bit `[short]`.
pub fn read_short<B: Buf + ?Sized>(buf: &mut B) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

/// Write an unsigned 16-bit `[short]`.
pub fn write_short<B: BufMut + ?Sized>(buf: &mut B, value: u16) {
    buf.put_u16(value);
}

/// Read a signed 32-bit `[int]`.
pub fn read_int<B: Buf + ?Sized>(buf: &mut B) -> Result<i32> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

/// Write a signed 32-bit `[int]`.
pub fn write_int<B: BufMut + ?Sized>(buf: &mut B, value: i32) {
    buf.put_i32(value);
}

/// Read a signed 64-bit `[long]`.
pub fn read_long<B: Buf + ?Sized>(buf: &mut B) -> Result<i64> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

/// Write a signed 64-bit `[long]`.
pub fn write_long<B: BufMut + ?Sized>(buf: &mut B, value: i64) {
    buf.put_i64(value);
}

fn read_utf8<B: Buf + ?Sized>(buf: &mut B, len: usize) -> Result<String> {
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.into()).map_err(|_| ProtocolViolation::InvalidUtf8.into())
}

/// Read a `[string]` (short length + UTF-8 bytes).
pub fn read_string<B: Buf + ?Sized>(buf: &mut B) -> Result<String> {
    let len = read_short(buf)? as usize;
    read_utf8(buf, len)
}

/// Write a `[string]`.
pub fn write_string<B: BufMut + ?Sized>(buf: &mut B, value: &str) -> Result<()> {
    write_short(buf, short_len(value.len(), "string")?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Exact encoded size of a `[string]`.
#[must_use]
pub fn size_of_string(value: &str) -> usize {
    2 + value.len()
}

/// Read a `[long string]` (int length + UTF-8 bytes).
pub fn read_long_string<B: Buf + ?Sized>(buf: &mut B) -> Result<String> {
    let len = read_int(buf)?;
    if len < 0 {
        return Err(ProtocolViolation::NegativeLength(len).into());
    }
    read_utf8(buf, len as usize)
}

/// Write a `[long string]`.
pub fn write_long_string<B: BufMut + ?Sized>(buf: &mut B, value: &str) -> Result<()> {
    write_int(buf, int_len(value.len(), "long string")?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Exact encoded size of a `[long string]`.
#[must_use]
pub fn size_of_long_string(value: &str) -> usize {
    4 + value.len()
}

/// Read a `[bytes]` value; length −1 decodes to `None`.
pub fn read_bytes<B: Buf + ?Sized>(buf: &mut B) -> Result<Option<Bytes>> {
    let len = read_int(buf)?;
    if len == BYTES_NULL {
        return Ok(None);
    }
    if len < 0 {
        return Err(ProtocolViolation::NegativeLength(len).into());
    }
    let len = len as usize;
    ensure(buf, len)?;
    Ok(Some(buf.copy_to_bytes(len)))
}

/// Write a `[bytes]` value; `None` encodes as length −1 with no body.
pub fn write_bytes<B: BufMut + ?Sized>(buf: &mut B, value: Option<&[u8]>) -> Result<()> {
    match value {
        None => write_int(buf, BYTES_NULL),
        Some(bytes) => {
            write_int(buf, int_len(bytes.len(), "bytes")?);
            buf.put_slice(bytes);
        }
    }
    Ok(())
}

/// Exact encoded size of a `[bytes]` value.
#[must_use]
pub fn size_of_bytes(value: Option<&[u8]>) -> usize {
    4 + value.map_or(0, <[u8]>::len)
}

/// Read a `[short bytes]` value.
pub fn read_short_bytes<B: Buf + ?Sized>(buf: &mut B) -> Result<Bytes> {
    let len = read_short(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

/// Write a `[short bytes]` value.
pub fn write_short_bytes<B: BufMut + ?Sized>(buf: &mut B, value: &[u8]) -> Result<()> {
    write_short(buf, short_len(value.len(), "short bytes")?);
    buf.put_slice(value);
    Ok(())
}

/// Exact encoded size of a `[short bytes]` value.
#[must_use]
pub fn size_of_short_bytes(value: &[u8]) -> usize {
    2 + value.len()
}

/// Encoded size of a `[uuid]`.
pub const SIZE_OF_UUID: usize = 16;

/// Read a `[uuid]` (16 raw bytes).
pub fn read_uuid<B: Buf + ?Sized>(buf: &mut B) -> Result<Uuid> {
    ensure(buf, SIZE_OF_UUID)?;
    let mut raw = [0u8; SIZE_OF_UUID];
    buf.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes(raw))
}

/// Write a `[uuid]`.
pub fn write_uuid<B: BufMut + ?Sized>(buf: &mut B, value: &Uuid) {
    buf.put_slice(value.as_bytes());
}

/// Read an `[inetaddr]`: one length byte (4 or 16) plus the address octets,
/// without a port.
pub fn read_inetaddr<B: Buf + ?Sized>(buf: &mut B) -> Result<IpAddr> {
    let len = read_byte(buf)?;
    match len {
        4 => {
            ensure(buf, 4)?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            ensure(buf, 16)?;
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(ProtocolViolation::InvalidInetLength(other).into()),
    }
}

/// Write an `[inetaddr]`.
pub fn write_inetaddr<B: BufMut + ?Sized>(buf: &mut B, addr: &IpAddr) {
    match addr {
        IpAddr::V4(v4) => {
            buf.put_u8(4);
            buf.put_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            buf.put_u8(16);
            buf.put_slice(&v6.octets());
        }
    }
}

/// Exact encoded size of an `[inetaddr]`.
#[must_use]
pub fn size_of_inetaddr(addr: &IpAddr) -> usize {
    match addr {
        IpAddr::V4(_) => 1 + 4,
        IpAddr::V6(_) => 1 + 16,
    }
}

/// Read an `[inet]`: address plus an int port.
pub fn read_inet<B: Buf + ?Sized>(buf: &mut B) -> Result<SocketAddr> {
    let addr = read_inetaddr(buf)?;
    let port = read_int(buf)?;
    let port =
        u16::try_from(port).map_err(|_| ProtocolViolation::InvalidPort(port))?;
    Ok(SocketAddr::new(addr, port))
}

/// Write an `[inet]`.
pub fn write_inet<B: BufMut + ?Sized>(buf: &mut B, addr: &SocketAddr) {
    write_inetaddr(buf, &addr.ip());
    write_int(buf, i32::from(addr.port()));
}

/// Exact encoded size of an `[inet]`.
#[must_use]
pub fn size_of_inet(addr: &SocketAddr) -> usize {
    size_of_inetaddr(&addr.ip()) + 4
}

/// Read a `[string list]`: short count, then that many `[string]`s.
pub fn read_string_list<B: Buf + ?Sized>(buf: &mut B) -> Result<Vec<String>> {
    let count = read_short(buf)? as usize;
    let mut list = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        list.push(read_string(buf)?);
    }
    Ok(list)
}

/// Write a `[string list]`.
pub fn write_string_list<B: BufMut + ?Sized>(buf: &mut B, list: &[String]) -> Result<()> {
    write_short(buf, short_len(list.len(), "string list")?);
    for item in list {
        write_string(buf, item)?;
    }
    Ok(())
}

/// Exact encoded size of a `[string list]`.
#[must_use]
pub fn size_of_string_list(list: &[String]) -> usize {
    2 + list.iter().map(|s| size_of_string(s)).sum::<usize>()
}

/// Read a `[string map]`; duplicate keys decode last-wins in wire order.
pub fn read_string_map<B: Buf + ?Sized>(buf: &mut B) -> Result<OrderedMap<String, String>> {
    let count = read_short(buf)? as usize;
    let mut map = OrderedMap::with_capacity(count.min(1024));
    for _ in 0..count {
        let key = read_string(buf)?;
        let value = read_string(buf)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Write a `[string map]` in the map's insertion order.
pub fn write_string_map<B: BufMut + ?Sized>(
    buf: &mut B,
    map: &OrderedMap<String, String>,
) -> Result<()> {
    write_short(buf, short_len(map.len(), "string map")?);
    for (key, value) in map {
        write_string(buf, key)?;
        write_string(buf, value)?;
    }
    Ok(())
}

/// Exact encoded size of a `[string map]`.
#[must_use]
pub fn size_of_string_map(map: &OrderedMap<String, String>) -> usize {
    2 + map.iter().map(|(k, v)| size_of_string(k) + size_of_string(v)).sum::<usize>()
}

/// Read a `[string multimap]`.
pub fn read_string_multimap<B: Buf + ?Sized>(
    buf: &mut B,
) -> Result<OrderedMap<String, Vec<String>>> {
    let count = read_short(buf)? as usize;
    let mut map = OrderedMap::with_capacity(count.min(1024));
    for _ in 0..count {
        let key = read_string(buf)?;
        let values = read_string_list(buf)?;
        map.insert(key, values);
    }
    Ok(map)
}

/// Write a `[string multimap]` in the map's insertion order.
pub fn write_string_multimap<B: BufMut + ?Sized>(
    buf: &mut B,
    map: &OrderedMap<String, Vec<String>>,
) -> Result<()> {
    write_short(buf, short_len(map.len(), "string multimap")?);
    for (key, values) in map {
        write_string(buf, key)?;
        write_string_list(buf, values)?;
    }
    Ok(())
}

/// Exact encoded size of a `[string multimap]`.
#[must_use]
pub fn size_of_string_multimap(map: &OrderedMap<String, Vec<String>>) -> usize {
    2 + map.iter().map(|(k, v)| size_of_string(k) + size_of_string_list(v)).sum::<usize>()
}

/// Read a `[bytes map]` with nullable values (custom payload envelope).
pub fn read_bytes_map<B: Buf + ?Sized>(
    buf: &mut B,
) -> Result<OrderedMap<String, Option<Bytes>>> {
    let count = read_short(buf)? as usize;
    let mut map = OrderedMap::with_capacity(count.min(1024));
    for _ in 0..count {
        let key = read_string(buf)?;
        let value = read_bytes(buf)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Write a `[bytes map]` in the map's insertion order.
pub fn write_bytes_map<B: BufMut + ?Sized>(
    buf: &mut B,
    map: &OrderedMap<String, Option<Bytes>>,
) -> Result<()> {
    write_short(buf, short_len(map.len(), "bytes map")?);
    for (key, value) in map {
        write_string(buf, key)?;
        write_bytes(buf, value.as_deref())?;
    }
    Ok(())
}

/// Exact encoded size of a `[bytes map]`.
#[must_use]
pub fn size_of_bytes_map(map: &OrderedMap<String, Option<Bytes>>) -> usize {
    2 + map
        .iter()
        .map(|(k, v)| size_of_string(k) + size_of_bytes(v.as_deref()))
        .sum::<usize>()
}

/// Read a v5 reason map: int count, then `(inetaddr, short)` entries.
pub fn read_reason_map<B: Buf + ?Sized>(buf: &mut B) -> Result<OrderedMap<IpAddr, u16>> {
    let count = read_int(buf)?;
    if count < 0 {
        return Err(ProtocolViolation::NegativeLength(count).into());
    }
    let count = count as usize;
    let mut map = OrderedMap::with_capacity(count.min(1024));
    for _ in 0..count {
        let addr = read_inetaddr(buf)?;
        let code = read_short(buf)?;
        map.insert(addr, code);
    }
    Ok(map)
}

/// Write a v5 reason map in the map's insertion order.
pub fn write_reason_map<B: BufMut + ?Sized>(
    buf: &mut B,
    map: &OrderedMap<IpAddr, u16>,
) -> Result<()> {
    write_int(buf, int_len(map.len(), "reason map")?);
    for (addr, code) in map {
        write_inetaddr(buf, addr);
        write_short(buf, *code);
    }
    Ok(())
}

/// Exact encoded size of a v5 reason map.
#[must_use]
pub fn size_of_reason_map(map: &OrderedMap<IpAddr, u16>) -> usize {
    4 + map.iter().map(|(addr, _)| size_of_inetaddr(addr) + 2).sum::<usize>()
}

/// Hand off the remainder of the buffer without copying.
pub fn read_retained<B: Buf + ?Sized>(buf: &mut B) -> Bytes {
    let len = buf.remaining();
    buf.copy_to_bytes(len)
}

/// Append an already-encoded payload without re-encoding.
pub fn write_retained<B: BufMut + ?Sized>(buf: &mut B, payload: &Bytes) {
    buf.put_slice(payload);
}
