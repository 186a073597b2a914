//! Typed read operations for the [`Reader`]: the "expect" layer.
//!
//! These helpers read the next value and check it against the type (and
//! range) the caller expects, failing with [`ErrorKind::Type`] on a mismatch.
//! Integers accept either wire signedness as long as the value fits the
//! requested target type, mirroring the tag comparison rules.
//!
//! [`Reader`]: ../reader/struct.Reader.html
//! [`ErrorKind::Type`]: ../error/enum.ErrorKind.html

use codec;
use error::{Error, ErrorKind, Result};
use reader::Reader;
use string::UnicodeCString;
use tag::{Tag, TagKind};
use time::{Timestamp, TIMESTAMP_TYPE};

use std::ffi::CString;
use std::str;

macro_rules! expect_unsigned {
    ($(#[$attr:meta])* $method:ident -> $t:ty) => {
        $(#[$attr])*
        pub fn $method(&mut self) -> Result<$t> {
            match self.read_tag()? {
                Tag::Uint(v) if v <= <$t>::max_value() as u64 => Ok(v as $t),
                Tag::Int(v) if v >= 0 && v as u64 <= <$t>::max_value() as u64 => Ok(v as $t),
                tag => Err(self.expect_failed(stringify!($t), tag)),
            }
        }
    };
}

macro_rules! expect_signed {
    ($(#[$attr:meta])* $method:ident -> $t:ty) => {
        $(#[$attr])*
        pub fn $method(&mut self) -> Result<$t> {
            match self.read_tag()? {
                Tag::Int(v)
                    if v >= i64::from(<$t>::min_value()) && v <= i64::from(<$t>::max_value()) =>
                {
                    Ok(v as $t)
                }
                Tag::Uint(v) if v <= <$t>::max_value() as u64 => Ok(v as $t),
                tag => Err(self.expect_failed(stringify!($t), tag)),
            }
        }
    };
}

impl<'a> Reader<'a> {
    fn expect_failed(&mut self, what: &str, tag: Tag) -> Error {
        self.fail(
            ErrorKind::Type,
            format!("expected {}, got a {} tag", what, tag.kind()),
        )
    }

    /// Reads a nil.
    pub fn expect_nil(&mut self) -> Result<()> {
        match self.read_tag()? {
            Tag::Nil => Ok(()),
            tag => Err(self.expect_failed("nil", tag)),
        }
    }

    /// Reads a bool.
    pub fn expect_bool(&mut self) -> Result<bool> {
        match self.read_tag()? {
            Tag::Bool(b) => Ok(b),
            tag => Err(self.expect_failed("bool", tag)),
        }
    }

    /// Reads a bool that must be `true`.
    pub fn expect_true(&mut self) -> Result<()> {
        match self.expect_bool()? {
            true => Ok(()),
            false => Err(self.fail(ErrorKind::Type, "expected true, got false")),
        }
    }

    /// Reads a bool that must be `false`.
    pub fn expect_false(&mut self) -> Result<()> {
        match self.expect_bool()? {
            false => Ok(()),
            true => Err(self.fail(ErrorKind::Type, "expected false, got true")),
        }
    }

    expect_unsigned!(
        /// Reads an integer that fits a `u8`.
        expect_u8 -> u8
    );
    expect_unsigned!(
        /// Reads an integer that fits a `u16`.
        expect_u16 -> u16
    );
    expect_unsigned!(
        /// Reads an integer that fits a `u32`.
        expect_u32 -> u32
    );
    expect_unsigned!(
        /// Reads a non-negative integer.
        expect_u64 -> u64
    );
    expect_signed!(
        /// Reads an integer that fits an `i8`.
        expect_i8 -> i8
    );
    expect_signed!(
        /// Reads an integer that fits an `i16`.
        expect_i16 -> i16
    );
    expect_signed!(
        /// Reads an integer that fits an `i32`.
        expect_i32 -> i32
    );
    expect_signed!(
        /// Reads an integer that fits an `i64`.
        expect_i64 -> i64
    );

    /// Reads a non-negative integer. Alias of [`expect_u64`].
    ///
    /// [`expect_u64`]: #method.expect_u64
    pub fn expect_uint(&mut self) -> Result<u64> {
        self.expect_u64()
    }

    /// Reads an integer that fits an `i64`. Alias of [`expect_i64`].
    ///
    /// [`expect_i64`]: #method.expect_i64
    pub fn expect_int(&mut self) -> Result<i64> {
        self.expect_i64()
    }

    /// Reads any numeric value as an `f32`, converting if necessary.
    pub fn expect_float(&mut self) -> Result<f32> {
        match self.read_tag()? {
            Tag::Float(v) => Ok(v),
            Tag::Double(v) => Ok(v as f32),
            Tag::Uint(v) => Ok(v as f32),
            Tag::Int(v) => Ok(v as f32),
            tag => Err(self.expect_failed("a number", tag)),
        }
    }

    /// Reads any numeric value as an `f64`, converting if necessary.
    pub fn expect_double(&mut self) -> Result<f64> {
        match self.read_tag()? {
            Tag::Double(v) => Ok(v),
            Tag::Float(v) => Ok(f64::from(v)),
            Tag::Uint(v) => Ok(v as f64),
            Tag::Int(v) => Ok(v as f64),
            tag => Err(self.expect_failed("a number", tag)),
        }
    }

    /// Reads an `f32`, without conversion from other numeric types.
    pub fn expect_float_strict(&mut self) -> Result<f32> {
        match self.read_tag()? {
            Tag::Float(v) => Ok(v),
            tag => Err(self.expect_failed("float", tag)),
        }
    }

    /// Reads an `f64`, allowing lossless widening from `f32` but no integer
    /// conversion.
    pub fn expect_double_strict(&mut self) -> Result<f64> {
        match self.read_tag()? {
            Tag::Double(v) => Ok(v),
            Tag::Float(v) => Ok(f64::from(v)),
            tag => Err(self.expect_failed("double", tag)),
        }
    }

    /// Reads the header of a str and returns its length in bytes.
    ///
    /// The payload must then be consumed with the byte read operations,
    /// followed by [`done_str`].
    ///
    /// [`done_str`]: struct.Reader.html#method.done_str
    pub fn expect_str_start(&mut self) -> Result<u32> {
        match self.read_tag()? {
            Tag::Str(len) => Ok(len),
            tag => Err(self.expect_failed("str", tag)),
        }
    }

    /// Like [`expect_str_start`], but fails with [`ErrorKind::TooBig`] for
    /// strings longer than `max_len` bytes.
    ///
    /// [`expect_str_start`]: #method.expect_str_start
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn expect_str_max(&mut self, max_len: u32) -> Result<u32> {
        let len = self.expect_str_start()?;
        if len > max_len {
            return Err(self.fail(
                ErrorKind::TooBig,
                format!("str of {} bytes exceeds the limit of {}", len, max_len),
            ));
        }
        Ok(len)
    }

    /// Reads the header of a bin and returns its length in bytes.
    pub fn expect_bin_start(&mut self) -> Result<u32> {
        match self.read_tag()? {
            Tag::Bin(len) => Ok(len),
            tag => Err(self.expect_failed("bin", tag)),
        }
    }

    /// Like [`expect_bin_start`], but fails with [`ErrorKind::TooBig`] for
    /// blobs longer than `max_len` bytes.
    ///
    /// [`expect_bin_start`]: #method.expect_bin_start
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn expect_bin_max(&mut self, max_len: u32) -> Result<u32> {
        let len = self.expect_bin_start()?;
        if len > max_len {
            return Err(self.fail(
                ErrorKind::TooBig,
                format!("bin of {} bytes exceeds the limit of {}", len, max_len),
            ));
        }
        Ok(len)
    }

    /// Reads the header of an ext value and returns its type and length.
    pub fn expect_ext_start(&mut self) -> Result<(i8, u32)> {
        match self.read_tag()? {
            Tag::Ext(exttype, len) => Ok((exttype, len)),
            tag => Err(self.expect_failed("ext", tag)),
        }
    }

    /// Reads a complete str in place and returns it as a `&str` borrowed from
    /// the reader's buffer.
    ///
    /// The whole string must fit the buffer; longer strings fail with
    /// [`ErrorKind::TooBig`] and should be read with [`expect_utf8`] instead.
    ///
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    /// [`expect_utf8`]: #method.expect_utf8
    pub fn expect_str(&mut self) -> Result<&str> {
        let len = self.expect_str_start()? as usize;
        self.track_bytes(len as u64)?;
        self.track_pop(TagKind::Str)?;
        self.ensure(len)?;
        if str::from_utf8(&self.buffered()[..len]).is_err() {
            return Err(self.fail(ErrorKind::Type, "string is not valid UTF-8"));
        }
        let bytes = self.take_slice(len);
        Ok(str::from_utf8(bytes).expect("string was checked to be valid UTF-8"))
    }

    /// Reads a complete str as an owned `String`, streaming if necessary.
    pub fn expect_utf8(&mut self) -> Result<String> {
        let len = self.expect_str_start()? as usize;
        let string = self.read_utf8(len)?;
        self.done_str()?;
        Ok(string)
    }

    /// Reads a complete str as a `CString` (no embedded nul bytes, not
    /// necessarily UTF-8).
    pub fn expect_cstr(&mut self) -> Result<CString> {
        let len = self.expect_str_start()? as usize;
        let string = self.read_cstr(len)?;
        self.done_str()?;
        Ok(string)
    }

    /// Reads a complete str as a [`UnicodeCString`].
    ///
    /// [`UnicodeCString`]: ../string/struct.UnicodeCString.html
    pub fn expect_utf8_cstr(&mut self) -> Result<UnicodeCString> {
        let len = self.expect_str_start()? as usize;
        let string = self.read_utf8_cstr(len)?;
        self.done_str()?;
        Ok(string)
    }

    /// Reads a complete bin as an owned `Vec<u8>`, streaming if necessary.
    pub fn expect_bin(&mut self) -> Result<Vec<u8>> {
        let len = self.expect_bin_start()? as usize;
        let bytes = self.read_bytes(len)?;
        self.done_bin()?;
        Ok(bytes)
    }

    /// Reads the header of an array and returns its element count.
    ///
    /// The caller then reads that many values and calls [`done_array`].
    ///
    /// [`done_array`]: struct.Reader.html#method.done_array
    pub fn expect_array(&mut self) -> Result<u32> {
        match self.read_tag()? {
            Tag::Array(count) => Ok(count),
            tag => Err(self.expect_failed("array", tag)),
        }
    }

    /// Like [`expect_array`], but fails with [`ErrorKind::TooBig`] for arrays
    /// of more than `max_count` elements.
    ///
    /// [`expect_array`]: #method.expect_array
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn expect_array_max(&mut self, max_count: u32) -> Result<u32> {
        let count = self.expect_array()?;
        if count > max_count {
            return Err(self.fail(
                ErrorKind::TooBig,
                format!("array of {} elements exceeds the limit of {}", count, max_count),
            ));
        }
        Ok(count)
    }

    /// Reads an array header that must declare exactly `count` elements.
    pub fn expect_array_match(&mut self, count: u32) -> Result<()> {
        let actual = self.expect_array()?;
        if actual != count {
            return Err(self.fail(
                ErrorKind::Type,
                format!("expected an array of {} elements, got {}", count, actual),
            ));
        }
        Ok(())
    }

    /// Reads the header of a map and returns its key/value pair count.
    ///
    /// The caller then reads that many pairs and calls [`done_map`].
    ///
    /// [`done_map`]: struct.Reader.html#method.done_map
    pub fn expect_map(&mut self) -> Result<u32> {
        match self.read_tag()? {
            Tag::Map(count) => Ok(count),
            tag => Err(self.expect_failed("map", tag)),
        }
    }

    /// Like [`expect_map`], but fails with [`ErrorKind::TooBig`] for maps of
    /// more than `max_count` pairs.
    ///
    /// [`expect_map`]: #method.expect_map
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn expect_map_max(&mut self, max_count: u32) -> Result<u32> {
        let count = self.expect_map()?;
        if count > max_count {
            return Err(self.fail(
                ErrorKind::TooBig,
                format!("map of {} pairs exceeds the limit of {}", count, max_count),
            ));
        }
        Ok(count)
    }

    /// Reads a map header that must declare exactly `count` pairs.
    pub fn expect_map_match(&mut self, count: u32) -> Result<()> {
        let actual = self.expect_map()?;
        if actual != count {
            return Err(self.fail(
                ErrorKind::Type,
                format!("expected a map of {} pairs, got {}", count, actual),
            ));
        }
        Ok(())
    }

    /// Reads a timestamp from the reserved timestamp extension.
    pub fn expect_timestamp(&mut self) -> Result<Timestamp> {
        match self.read_tag()? {
            Tag::Ext(TIMESTAMP_TYPE, len) => {
                let decoded = {
                    let payload = self.read_bytes_inplace(len as usize)?;
                    codec::decode_timestamp(payload)
                };
                let ts = match decoded {
                    Ok(ts) => ts,
                    Err(e) => return Err(self.absorb(e)),
                };
                self.done_ext()?;
                Ok(ts)
            }
            tag => Err(self.expect_failed("timestamp", tag)),
        }
    }

    /// Reads a str and matches it against a list of allowed values, returning
    /// the index of the match.
    ///
    /// Fails with [`ErrorKind::Type`] when the string matches none of the
    /// `values`.
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn expect_enum(&mut self, values: &[&str]) -> Result<usize> {
        match self.expect_enum_optional(values)? {
            found if found < values.len() => Ok(found),
            _ => Err(self.fail(
                ErrorKind::Type,
                "string does not match any of the allowed values",
            )),
        }
    }

    /// Like [`expect_enum`], but returns `values.len()` instead of failing
    /// when nothing matches.
    ///
    /// [`expect_enum`]: #method.expect_enum
    pub fn expect_enum_optional(&mut self, values: &[&str]) -> Result<usize> {
        let found = {
            let string = self.expect_str()?;
            values.iter().position(|v| *v == string)
        };
        Ok(found.unwrap_or(values.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_range_checks() {
        let mut reader = Reader::new(&[0xcc, 0x80]); // uint 128
        assert_eq!(reader.expect_u8().unwrap(), 128);

        let mut reader = Reader::new(&[0xcc, 0x80]);
        assert_eq!(reader.expect_i8().unwrap_err().kind(), ErrorKind::Type);

        // int8 -1 can be read as i64 but not as any unsigned type
        let mut reader = Reader::new(&[0xd0, 0xff]);
        assert_eq!(reader.expect_i64().unwrap(), -1);
        let mut reader = Reader::new(&[0xd0, 0xff]);
        assert_eq!(reader.expect_u64().unwrap_err().kind(), ErrorKind::Type);

        // non-negative int encodings satisfy unsigned expectations
        let mut reader = Reader::new(&[0xd0, 0x05]);
        assert_eq!(reader.expect_u8().unwrap(), 5);
    }

    #[test]
    fn float_conversions() {
        let mut reader = Reader::new(&[0x2a]); // 42
        assert_eq!(reader.expect_double().unwrap(), 42.0);

        let mut reader = Reader::new(&[0x2a]);
        assert_eq!(
            reader.expect_float_strict().unwrap_err().kind(),
            ErrorKind::Type
        );

        // float widens losslessly into expect_double_strict
        let mut reader = Reader::new(&[0xca, 0x3f, 0xc0, 0x00, 0x00]); // 1.5f32
        assert_eq!(reader.expect_double_strict().unwrap(), 1.5);
    }

    #[test]
    fn str_inplace() {
        let data = [0xa3, b'f', b'o', b'o'];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.expect_str().unwrap(), "foo");
        reader.finish().unwrap();
    }

    #[test]
    fn str_max_limits() {
        let data = [0xa3, b'f', b'o', b'o'];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.expect_str_max(2).unwrap_err().kind(),
            ErrorKind::TooBig
        );
    }

    #[test]
    fn array_match() {
        let mut reader = Reader::new(&[0x92, 0x01, 0x02]);
        reader.expect_array_match(2).unwrap();
        assert_eq!(reader.expect_u8().unwrap(), 1);
        assert_eq!(reader.expect_u8().unwrap(), 2);
        reader.done_array().unwrap();
        reader.finish().unwrap();
    }

    #[test]
    fn wrong_kind_is_a_type_error() {
        let mut reader = Reader::new(&[0xc0]); // nil
        assert_eq!(reader.expect_map().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn timestamps() {
        let mut reader = Reader::new(&[0xd6, 0xff, 0x00, 0x00, 0x00, 0x2a]);
        assert_eq!(
            reader.expect_timestamp().unwrap(),
            Timestamp {
                seconds: 42,
                nanoseconds: 0
            }
        );
        reader.finish().unwrap();

        // a non-timestamp ext value is a type error
        let mut reader = Reader::new(&[0xd4, 0x07, 0x00]);
        assert_eq!(
            reader.expect_timestamp().unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn enums() {
        let data = [0xa4, b'c', b'o', b'l', b'd'];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.expect_enum(&["hot", "cold"]).unwrap(), 1);

        let mut reader = Reader::new(&data);
        assert_eq!(reader.expect_enum_optional(&["hot", "warm"]).unwrap(), 2);
        assert!(reader.error().is_none());

        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.expect_enum(&["hot", "warm"]).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn utf8_cstr() {
        let data = [0xa2, b'h', b'i'];
        let mut reader = Reader::new(&data);
        let s = reader.expect_utf8_cstr().unwrap();
        assert_eq!(s.as_str(), "hi");
        reader.finish().unwrap();
    }
}
