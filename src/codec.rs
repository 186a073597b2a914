//! The MessagePack byte codec: mapping between [`Tag`]s and their wire
//! encoding.
//!
//! Every MessagePack value starts with a single type byte, optionally followed
//! by up to 8 bytes of header payload (lengths, counts, scalar values) in
//! network byte order. Decoding dispatches on the first byte; encoding picks
//! the shortest form that can represent the value.
//!
//! [`Tag`]: ../tag/enum.Tag.html

use error::{Error, ErrorKind, Result};
use tag::Tag;
use time::{Timestamp, MAX_NANOSECONDS, TIMESTAMP_TYPE};

use byteorder::{ByteOrder, NetworkEndian};
use num_traits::FromPrimitive;

/// The size of the largest encoded tag header (uint64/int64/double and the
/// 32-bit compound headers need 9 bytes).
pub const MAX_TAG_SIZE: usize = 9;

/// The size of the largest encoded timestamp, header included
/// (`c7 0c ff` + 12 payload bytes).
pub(crate) const MAX_TIMESTAMP_SIZE: usize = 15;

/// The smallest usable buffer for a reader or writer that is attached to a
/// stream callback.
///
/// Must be able to hold any tag header and the content of the largest fixstr,
/// so that in-place reads of short strings never fail.
pub const MIN_BUFFER_SIZE: usize = 32;

/// The MessagePack specification generation to target when encoding.
///
/// Decoding always accepts every type code; the version only restricts what a
/// writer may emit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    /// The pre-2013 format without `str8`, `bin`, `ext` and timestamps.
    ///
    /// Binary blobs are written using `str` type codes; ext values and
    /// timestamps cannot be written at all.
    V4,
    /// The current format. This is the default.
    V5,
}

impl Default for Version {
    fn default() -> Self {
        Version::V5
    }
}

/// The non-fix type codes `0xc0 ..= 0xdf`.
///
/// The remaining byte values are the fix ranges (positive fixint, fixmap,
/// fixarray, fixstr, negative fixint) and carry their payload inside the type
/// byte itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
enum Code {
    Nil = 0xc0,
    Reserved = 0xc1,
    False = 0xc2,
    True = 0xc3,
    Bin8 = 0xc4,
    Bin16 = 0xc5,
    Bin32 = 0xc6,
    Ext8 = 0xc7,
    Ext16 = 0xc8,
    Ext32 = 0xc9,
    Float32 = 0xca,
    Float64 = 0xcb,
    Uint8 = 0xcc,
    Uint16 = 0xcd,
    Uint32 = 0xce,
    Uint64 = 0xcf,
    Int8 = 0xd0,
    Int16 = 0xd1,
    Int32 = 0xd2,
    Int64 = 0xd3,
    FixExt1 = 0xd4,
    FixExt2 = 0xd5,
    FixExt4 = 0xd6,
    FixExt8 = 0xd7,
    FixExt16 = 0xd8,
    Str8 = 0xd9,
    Str16 = 0xda,
    Str32 = 0xdb,
    Array16 = 0xdc,
    Array32 = 0xdd,
    Map16 = 0xde,
    Map32 = 0xdf,
}

/// Returns the total header size (type byte included) implied by the first
/// byte of an encoded value.
///
/// This is what a reader must buffer before calling [`decode_tag`]. Invalid
/// and unsupported codes report a size of 1; the error surfaces when the tag
/// is actually decoded.
///
/// [`decode_tag`]: fn.decode_tag.html
pub fn header_size(first: u8) -> usize {
    match first {
        // All fix types fit in the type byte.
        0x00..=0x7f | 0x80..=0x8f | 0x90..=0x9f | 0xa0..=0xbf | 0xe0..=0xff => 1,
        _ => match Code::from_u8(first).expect("0xc0..=0xdf is covered by Code") {
            Code::Nil | Code::Reserved | Code::False | Code::True => 1,
            Code::Bin8 | Code::Str8 | Code::Uint8 | Code::Int8 => 2,
            Code::Bin16 | Code::Str16 | Code::Uint16 | Code::Int16 => 3,
            Code::Array16 | Code::Map16 => 3,
            Code::Bin32 | Code::Str32 | Code::Uint32 | Code::Int32 => 5,
            Code::Array32 | Code::Map32 | Code::Float32 => 5,
            Code::Uint64 | Code::Int64 | Code::Float64 => 9,
            // length bytes plus the exttype byte
            Code::Ext8 => 3,
            Code::Ext16 => 4,
            Code::Ext32 => 6,
            Code::FixExt1 | Code::FixExt2 | Code::FixExt4 | Code::FixExt8 | Code::FixExt16 => 2,
        },
    }
}

/// Decodes one tag from the start of `buf`, returning it along with the
/// number of header bytes consumed.
///
/// `buf` must contain the complete header as reported by [`header_size`] for
/// its first byte; the streaming layers guarantee this via their ensure
/// protocols.
///
/// Non-shortest encodings (e.g. `cd 00 05` for the integer 5) are accepted.
/// The reserved byte `0xc1` fails with [`ErrorKind::Invalid`]; ext codes fail
/// with [`ErrorKind::Unsupported`] when the `extensions` feature is disabled.
///
/// [`header_size`]: fn.header_size.html
/// [`ErrorKind::Invalid`]: ../error/enum.ErrorKind.html
/// [`ErrorKind::Unsupported`]: ../error/enum.ErrorKind.html
pub fn decode_tag(buf: &[u8]) -> Result<(Tag, usize)> {
    let first = buf[0];
    debug_assert!(buf.len() >= header_size(first), "incomplete tag header");

    match first {
        0x00..=0x7f => return Ok((Tag::Uint(u64::from(first)), 1)),
        0x80..=0x8f => return Ok((Tag::Map(u32::from(first & 0x0f)), 1)),
        0x90..=0x9f => return Ok((Tag::Array(u32::from(first & 0x0f)), 1)),
        0xa0..=0xbf => return Ok((Tag::Str(u32::from(first & 0x1f)), 1)),
        0xe0..=0xff => return Ok((Tag::Int(i64::from(first as i8)), 1)),
        _ => {}
    }

    let code = Code::from_u8(first).expect("0xc0..=0xdf is covered by Code");
    let tag = match code {
        Code::Nil => (Tag::Nil, 1),
        Code::Reserved => {
            return Err(Error::new(
                ErrorKind::Invalid,
                "reserved type byte 0xc1 in input",
            ));
        }
        Code::False => (Tag::Bool(false), 1),
        Code::True => (Tag::Bool(true), 1),

        Code::Bin8 => (Tag::Bin(u32::from(buf[1])), 2),
        Code::Bin16 => (Tag::Bin(u32::from(NetworkEndian::read_u16(&buf[1..]))), 3),
        Code::Bin32 => (Tag::Bin(NetworkEndian::read_u32(&buf[1..])), 5),

        Code::Str8 => (Tag::Str(u32::from(buf[1])), 2),
        Code::Str16 => (Tag::Str(u32::from(NetworkEndian::read_u16(&buf[1..]))), 3),
        Code::Str32 => (Tag::Str(NetworkEndian::read_u32(&buf[1..])), 5),

        Code::Array16 => (
            Tag::Array(u32::from(NetworkEndian::read_u16(&buf[1..]))),
            3,
        ),
        Code::Array32 => (Tag::Array(NetworkEndian::read_u32(&buf[1..])), 5),
        Code::Map16 => (Tag::Map(u32::from(NetworkEndian::read_u16(&buf[1..]))), 3),
        Code::Map32 => (Tag::Map(NetworkEndian::read_u32(&buf[1..])), 5),

        // Floats are loaded as integers and bit-cast; the byte order of the
        // wire format is defined on the integer representation.
        Code::Float32 => (
            Tag::Float(f32::from_bits(NetworkEndian::read_u32(&buf[1..]))),
            5,
        ),
        Code::Float64 => (
            Tag::Double(f64::from_bits(NetworkEndian::read_u64(&buf[1..]))),
            9,
        ),

        Code::Uint8 => (Tag::Uint(u64::from(buf[1])), 2),
        Code::Uint16 => (Tag::Uint(u64::from(NetworkEndian::read_u16(&buf[1..]))), 3),
        Code::Uint32 => (Tag::Uint(u64::from(NetworkEndian::read_u32(&buf[1..]))), 5),
        Code::Uint64 => (Tag::Uint(NetworkEndian::read_u64(&buf[1..])), 9),

        Code::Int8 => (Tag::Int(i64::from(buf[1] as i8)), 2),
        Code::Int16 => (Tag::Int(i64::from(NetworkEndian::read_i16(&buf[1..]))), 3),
        Code::Int32 => (Tag::Int(i64::from(NetworkEndian::read_i32(&buf[1..]))), 5),
        Code::Int64 => (Tag::Int(NetworkEndian::read_i64(&buf[1..])), 9),

        Code::Ext8 => ext_tag(u32::from(buf[1]), buf[2] as i8, 3)?,
        Code::Ext16 => ext_tag(
            u32::from(NetworkEndian::read_u16(&buf[1..])),
            buf[3] as i8,
            4,
        )?,
        Code::Ext32 => ext_tag(NetworkEndian::read_u32(&buf[1..]), buf[5] as i8, 6)?,
        Code::FixExt1 => ext_tag(1, buf[1] as i8, 2)?,
        Code::FixExt2 => ext_tag(2, buf[1] as i8, 2)?,
        Code::FixExt4 => ext_tag(4, buf[1] as i8, 2)?,
        Code::FixExt8 => ext_tag(8, buf[1] as i8, 2)?,
        Code::FixExt16 => ext_tag(16, buf[1] as i8, 2)?,
    };
    Ok(tag)
}

fn ext_tag(len: u32, exttype: i8, size: usize) -> Result<(Tag, usize)> {
    if cfg!(feature = "extensions") {
        Ok((Tag::Ext(exttype, len), size))
    } else {
        Err(Error::new(
            ErrorKind::Unsupported,
            "ext types are disabled by the build configuration",
        ))
    }
}

/// Encodes `tag` into `out` using the shortest form allowed by `version`,
/// returning the number of bytes written.
///
/// Fails with [`ErrorKind::Bug`] for [`Tag::Missing`] and for ext tags in
/// [`Version::V4`].
///
/// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
/// [`Tag::Missing`]: ../tag/enum.Tag.html
/// [`Version::V4`]: enum.Version.html
pub fn encode_tag(tag: Tag, version: Version, out: &mut [u8; MAX_TAG_SIZE]) -> Result<usize> {
    match tag {
        Tag::Missing => Err(Error::new(
            ErrorKind::Bug,
            "the missing tag cannot be written",
        )),
        Tag::Nil => {
            out[0] = Code::Nil as u8;
            Ok(1)
        }
        Tag::Bool(false) => {
            out[0] = Code::False as u8;
            Ok(1)
        }
        Tag::Bool(true) => {
            out[0] = Code::True as u8;
            Ok(1)
        }
        // Non-negative signed values use the unsigned forms; that is what
        // makes the encoding canonical regardless of the source signedness.
        Tag::Int(v) if v >= 0 => Ok(encode_uint(v as u64, out)),
        Tag::Int(v) => Ok(encode_int(v, out)),
        Tag::Uint(v) => Ok(encode_uint(v, out)),
        Tag::Float(v) => {
            out[0] = Code::Float32 as u8;
            NetworkEndian::write_u32(&mut out[1..5], v.to_bits());
            Ok(5)
        }
        Tag::Double(v) => {
            out[0] = Code::Float64 as u8;
            NetworkEndian::write_u64(&mut out[1..9], v.to_bits());
            Ok(9)
        }
        Tag::Str(len) => Ok(encode_str(len, version, out)),
        // v4 predates the bin types; bin data is written as a str.
        Tag::Bin(len) => match version {
            Version::V4 => Ok(encode_str(len, version, out)),
            Version::V5 => Ok(encode_bin(len, out)),
        },
        Tag::Ext(exttype, len) => {
            if !cfg!(feature = "extensions") {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "ext types are disabled by the build configuration",
                ));
            }
            if version == Version::V4 {
                return Err(Error::new(
                    ErrorKind::Bug,
                    "ext types cannot be written in v4 compatibility mode",
                ));
            }
            Ok(encode_ext(exttype, len, out))
        }
        Tag::Array(n) => {
            if n <= 15 {
                out[0] = 0x90 | n as u8;
                Ok(1)
            } else if n <= 0xffff {
                out[0] = Code::Array16 as u8;
                NetworkEndian::write_u16(&mut out[1..3], n as u16);
                Ok(3)
            } else {
                out[0] = Code::Array32 as u8;
                NetworkEndian::write_u32(&mut out[1..5], n);
                Ok(5)
            }
        }
        Tag::Map(n) => {
            if n <= 15 {
                out[0] = 0x80 | n as u8;
                Ok(1)
            } else if n <= 0xffff {
                out[0] = Code::Map16 as u8;
                NetworkEndian::write_u16(&mut out[1..3], n as u16);
                Ok(3)
            } else {
                out[0] = Code::Map32 as u8;
                NetworkEndian::write_u32(&mut out[1..5], n);
                Ok(5)
            }
        }
    }
}

fn encode_uint(v: u64, out: &mut [u8; MAX_TAG_SIZE]) -> usize {
    if v <= 0x7f {
        out[0] = v as u8;
        1
    } else if v <= 0xff {
        out[0] = Code::Uint8 as u8;
        out[1] = v as u8;
        2
    } else if v <= 0xffff {
        out[0] = Code::Uint16 as u8;
        NetworkEndian::write_u16(&mut out[1..3], v as u16);
        3
    } else if v <= 0xffff_ffff {
        out[0] = Code::Uint32 as u8;
        NetworkEndian::write_u32(&mut out[1..5], v as u32);
        5
    } else {
        out[0] = Code::Uint64 as u8;
        NetworkEndian::write_u64(&mut out[1..9], v);
        9
    }
}

// Only called for negative values; non-negative ones take the unsigned path.
fn encode_int(v: i64, out: &mut [u8; MAX_TAG_SIZE]) -> usize {
    debug_assert!(v < 0);
    if v >= -32 {
        out[0] = v as u8;
        1
    } else if v >= i64::from(i8::min_value()) {
        out[0] = Code::Int8 as u8;
        out[1] = v as u8;
        2
    } else if v >= i64::from(i16::min_value()) {
        out[0] = Code::Int16 as u8;
        NetworkEndian::write_i16(&mut out[1..3], v as i16);
        3
    } else if v >= i64::from(i32::min_value()) {
        out[0] = Code::Int32 as u8;
        NetworkEndian::write_i32(&mut out[1..5], v as i32);
        5
    } else {
        out[0] = Code::Int64 as u8;
        NetworkEndian::write_i64(&mut out[1..9], v);
        9
    }
}

fn encode_str(len: u32, version: Version, out: &mut [u8; MAX_TAG_SIZE]) -> usize {
    if len <= 31 {
        out[0] = 0xa0 | len as u8;
        1
    } else if len <= 0xff && version == Version::V5 {
        // str8 does not exist in v4; fall through to str16 there.
        out[0] = Code::Str8 as u8;
        out[1] = len as u8;
        2
    } else if len <= 0xffff {
        out[0] = Code::Str16 as u8;
        NetworkEndian::write_u16(&mut out[1..3], len as u16);
        3
    } else {
        out[0] = Code::Str32 as u8;
        NetworkEndian::write_u32(&mut out[1..5], len);
        5
    }
}

fn encode_bin(len: u32, out: &mut [u8; MAX_TAG_SIZE]) -> usize {
    if len <= 0xff {
        out[0] = Code::Bin8 as u8;
        out[1] = len as u8;
        2
    } else if len <= 0xffff {
        out[0] = Code::Bin16 as u8;
        NetworkEndian::write_u16(&mut out[1..3], len as u16);
        3
    } else {
        out[0] = Code::Bin32 as u8;
        NetworkEndian::write_u32(&mut out[1..5], len);
        5
    }
}

fn encode_ext(exttype: i8, len: u32, out: &mut [u8; MAX_TAG_SIZE]) -> usize {
    match len {
        1 | 2 | 4 | 8 | 16 => {
            out[0] = match len {
                1 => Code::FixExt1 as u8,
                2 => Code::FixExt2 as u8,
                4 => Code::FixExt4 as u8,
                8 => Code::FixExt8 as u8,
                _ => Code::FixExt16 as u8,
            };
            out[1] = exttype as u8;
            2
        }
        _ => {
            if len <= 0xff {
                out[0] = Code::Ext8 as u8;
                out[1] = len as u8;
                out[2] = exttype as u8;
                3
            } else if len <= 0xffff {
                out[0] = Code::Ext16 as u8;
                NetworkEndian::write_u16(&mut out[1..3], len as u16);
                out[3] = exttype as u8;
                4
            } else {
                out[0] = Code::Ext32 as u8;
                NetworkEndian::write_u32(&mut out[1..5], len);
                out[5] = exttype as u8;
                6
            }
        }
    }
}

/// Encodes a timestamp, ext header included, choosing the shortest of the
/// three timestamp layouts. The nanosecond range must have been validated by
/// the caller.
pub(crate) fn encode_timestamp(ts: Timestamp, out: &mut [u8; MAX_TIMESTAMP_SIZE]) -> usize {
    debug_assert!(ts.nanoseconds <= MAX_NANOSECONDS);

    if ts.nanoseconds == 0 && ts.seconds >= 0 && ts.seconds <= i64::from(u32::max_value()) {
        // timestamp 32: fixext4
        out[0] = Code::FixExt4 as u8;
        out[1] = TIMESTAMP_TYPE as u8;
        NetworkEndian::write_u32(&mut out[2..6], ts.seconds as u32);
        6
    } else if ts.seconds >= 0 && ts.seconds < (1 << 34) {
        // timestamp 64: fixext8, 30 bits of nanoseconds over 34 bits of
        // seconds
        let packed = (u64::from(ts.nanoseconds) << 34) | ts.seconds as u64;
        out[0] = Code::FixExt8 as u8;
        out[1] = TIMESTAMP_TYPE as u8;
        NetworkEndian::write_u64(&mut out[2..10], packed);
        10
    } else {
        // timestamp 96: ext8 of length 12
        out[0] = Code::Ext8 as u8;
        out[1] = 12;
        out[2] = TIMESTAMP_TYPE as u8;
        NetworkEndian::write_u32(&mut out[3..7], ts.nanoseconds);
        NetworkEndian::write_i64(&mut out[7..15], ts.seconds);
        15
    }
}

/// Decodes a timestamp from an ext payload (exttype byte excluded).
///
/// Fails with [`ErrorKind::Invalid`] for payload lengths other than 4, 8 or
/// 12 bytes and for out-of-range nanoseconds.
///
/// [`ErrorKind::Invalid`]: ../error/enum.ErrorKind.html
pub(crate) fn decode_timestamp(payload: &[u8]) -> Result<Timestamp> {
    let ts = match payload.len() {
        4 => Timestamp {
            seconds: i64::from(NetworkEndian::read_u32(payload)),
            nanoseconds: 0,
        },
        8 => {
            let packed = NetworkEndian::read_u64(payload);
            Timestamp {
                seconds: (packed & ((1 << 34) - 1)) as i64,
                nanoseconds: (packed >> 34) as u32,
            }
        }
        12 => Timestamp {
            seconds: NetworkEndian::read_i64(&payload[4..]),
            nanoseconds: NetworkEndian::read_u32(&payload[..4]),
        },
        _ => {
            return Err(Error::new(
                ErrorKind::Invalid,
                "timestamp ext payload must be 4, 8 or 12 bytes",
            ));
        }
    };

    if ts.nanoseconds > MAX_NANOSECONDS {
        return Err(Error::new(
            ErrorKind::Invalid,
            "timestamp nanoseconds out of range",
        ));
    }
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(tag: Tag) -> Vec<u8> {
        let mut buf = [0; MAX_TAG_SIZE];
        let size = encode_tag(tag, Version::V5, &mut buf).unwrap();
        buf[..size].to_vec()
    }

    fn decode(bytes: &[u8]) -> Tag {
        let (tag, size) = decode_tag(bytes).unwrap();
        assert_eq!(size, bytes.len());
        tag
    }

    #[test]
    fn integers_use_shortest_form() {
        assert_eq!(encode(Tag::Int(5)), [0x05]);
        assert_eq!(encode(Tag::Int(-1)), [0xff]);
        assert_eq!(encode(Tag::Int(128)), [0xcc, 0x80]);
        assert_eq!(
            encode(Tag::Int(0x1_0000_0000)),
            [0xcf, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode(Tag::Int(i64::min_value())),
            [0xd3, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(encode(Tag::Uint(0xffff)), [0xcd, 0xff, 0xff]);
        assert_eq!(encode(Tag::Int(-33)), [0xd0, 0xdf]);
        assert_eq!(encode(Tag::Int(-0x8000)), [0xd1, 0x80, 0x00]);
    }

    #[test]
    fn non_shortest_forms_are_accepted() {
        assert_eq!(decode(&[0xcd, 0x00, 0x05]), Tag::Uint(5));
        assert_eq!(decode(&[0xd2, 0xff, 0xff, 0xff, 0xff]), Tag::Int(-1));
        // ...but re-encoding yields the shortest form.
        assert_eq!(encode(decode(&[0xcd, 0x00, 0x05])), [0x05]);
    }

    #[test]
    fn reserved_byte_is_invalid() {
        assert_eq!(decode_tag(&[0xc1]).unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn fix_ranges() {
        assert_eq!(decode(&[0x00]), Tag::Uint(0));
        assert_eq!(decode(&[0x7f]), Tag::Uint(127));
        assert_eq!(decode(&[0xe0]), Tag::Int(-32));
        assert_eq!(decode(&[0xff]), Tag::Int(-1));
        assert_eq!(decode(&[0x82]), Tag::Map(2));
        assert_eq!(decode(&[0x93]), Tag::Array(3));
        assert_eq!(decode(&[0xa7]), Tag::Str(7));
    }

    #[test]
    fn floats_are_bit_exact() {
        use std::f32;

        let bytes = encode(Tag::Float(f32::NAN));
        assert_eq!(bytes[0], 0xca);
        assert_eq!(decode(&bytes), Tag::Float(f32::NAN));

        assert_eq!(
            encode(Tag::Double(1.0)),
            [0xcb, 0x3f, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn roundtrip_all_header_sizes() {
        let tags = [
            Tag::Nil,
            Tag::Bool(true),
            Tag::Uint(0),
            Tag::Uint(200),
            Tag::Uint(70_000),
            Tag::Uint(u64::max_value()),
            Tag::Int(-5),
            Tag::Int(-200),
            Tag::Int(-70_000),
            Tag::Int(i64::min_value()),
            Tag::Float(1.5),
            Tag::Double(-2.5),
            Tag::Str(0),
            Tag::Str(31),
            Tag::Str(32),
            Tag::Str(0x1_0000),
            Tag::Bin(3),
            Tag::Bin(0x100),
            Tag::Array(15),
            Tag::Array(16),
            Tag::Map(15),
            Tag::Map(0x1_0000),
            Tag::Ext(7, 3),
            Tag::Ext(-128, 16),
            Tag::Ext(5, 0x100),
        ];
        for &tag in &tags {
            let bytes = encode(tag);
            assert_eq!(header_size(bytes[0]), bytes.len(), "{:?}", tag);
            assert_eq!(decode(&bytes), tag, "{:?}", tag);
        }
    }

    #[test]
    fn v4_has_no_str8_and_no_bin() {
        let mut buf = [0; MAX_TAG_SIZE];

        let size = encode_tag(Tag::Str(100), Version::V4, &mut buf).unwrap();
        assert_eq!(&buf[..size], &[0xda, 0x00, 0x64]);

        // bin data degrades to str type codes
        let size = encode_tag(Tag::Bin(3), Version::V4, &mut buf).unwrap();
        assert_eq!(&buf[..size], &[0xa3]);

        let err = encode_tag(Tag::Ext(1, 4), Version::V4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bug);
    }

    #[test]
    fn timestamp_form_selection() {
        let mut buf = [0; MAX_TIMESTAMP_SIZE];

        let size = encode_timestamp(
            Timestamp {
                seconds: 0,
                nanoseconds: 0,
            },
            &mut buf,
        );
        assert_eq!(&buf[..size], &[0xd6, 0xff, 0x00, 0x00, 0x00, 0x00]);

        let size = encode_timestamp(
            Timestamp {
                seconds: 1 << 32,
                nanoseconds: 0,
            },
            &mut buf,
        );
        assert_eq!(size, 10);
        assert_eq!(buf[0], 0xd7);

        let size = encode_timestamp(
            Timestamp {
                seconds: -1,
                nanoseconds: 0,
            },
            &mut buf,
        );
        assert_eq!(size, 15);
        assert_eq!(&buf[..3], &[0xc7, 12, 0xff]);
    }

    #[test]
    fn timestamp_roundtrip() {
        let stamps = [
            (0, 0),
            (1, 500),
            (u32::max_value() as i64, 0),
            ((1 << 34) - 1, MAX_NANOSECONDS),
            (1 << 34, 1),
            (-62_167_219_200, 0),
        ];
        for &(seconds, nanoseconds) in &stamps {
            let ts = Timestamp {
                seconds,
                nanoseconds,
            };
            let mut buf = [0; MAX_TIMESTAMP_SIZE];
            let size = encode_timestamp(ts, &mut buf);
            // strip the ext header before decoding the payload
            let (tag, header) = decode_tag(&buf[..size]).unwrap();
            assert_eq!(tag.ext_type(), TIMESTAMP_TYPE);
            assert_eq!(decode_timestamp(&buf[header..size]).unwrap(), ts);
        }
    }

    #[test]
    fn timestamp_payload_validation() {
        assert_eq!(
            decode_timestamp(&[0; 5]).unwrap_err().kind(),
            ErrorKind::Invalid
        );
        // 8-byte form with nanoseconds > 999 999 999
        let packed = (1_000_000_000u64 << 34) | 1;
        let mut payload = [0; 8];
        NetworkEndian::write_u64(&mut payload, packed);
        assert_eq!(
            decode_timestamp(&payload).unwrap_err().kind(),
            ErrorKind::Invalid
        );
    }
}
