//! The streaming MessagePack writer.
//!
//! A [`Writer`] encodes values into one of three kinds of sink:
//!
//! * a growable `Vec<u8>` borrowed from the caller (the common case for
//!   building a message in memory),
//! * a fixed caller-supplied buffer that fails with [`ErrorKind::TooBig`]
//!   when it runs out of space,
//! * a bounded staging buffer drained through a [`Flush`] callback whenever
//!   it fills up.
//!
//! The byte sequence produced for a message is identical for all three sinks
//! and for any buffer size or flush schedule.
//!
//! [`Writer`]: struct.Writer.html
//! [`Flush`]: trait.Flush.html
//! [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html

use codec::{self, Version, MAX_TAG_SIZE, MIN_BUFFER_SIZE};
use error::{Error, ErrorKind, Result};
use string;
use tag::{Tag, TagKind};
use time::{Timestamp, MAX_NANOSECONDS};
use track::Track;

use std::cmp;
use std::ffi::CStr;
use std::fmt;

/// Receives the bytes produced by a [`Writer`] with a bounded buffer.
///
/// [`Writer`]: struct.Writer.html
pub trait Flush {
    /// Consumes a chunk of output. The chunks concatenate to the encoded
    /// message.
    fn flush(&mut self, data: &[u8]) -> Result<()>;
}

/// Any `FnMut` closure consuming byte slices can be used as a flush callback.
impl<F> Flush for F
where
    F: FnMut(&[u8]) -> Result<()>,
{
    fn flush(&mut self, data: &[u8]) -> Result<()> {
        self(data)
    }
}

enum Sink<'a> {
    /// Output accumulates in the caller's vector, growing as needed.
    Growable(&'a mut Vec<u8>),
    /// Output must fit the caller's buffer.
    Fixed { buf: &'a mut [u8], used: usize },
    /// Output is staged in an owned buffer of logical capacity `cap` and
    /// handed to `sink` whenever it would overflow.
    Stream {
        buf: Vec<u8>,
        cap: usize,
        sink: Box<dyn Flush + 'a>,
        flushed: usize,
    },
}

impl<'a> Sink<'a> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        match *self {
            Sink::Growable(ref mut vec) => {
                vec.extend_from_slice(data);
                Ok(())
            }
            Sink::Fixed {
                ref mut buf,
                ref mut used,
            } => {
                if data.len() > buf.len() - *used {
                    return Err(Error::new(
                        ErrorKind::TooBig,
                        "message does not fit the output buffer",
                    ));
                }
                buf[*used..*used + data.len()].copy_from_slice(data);
                *used += data.len();
                Ok(())
            }
            Sink::Stream {
                ref mut buf,
                cap,
                ref mut sink,
                ref mut flushed,
            } => {
                if buf.len() + data.len() <= cap {
                    buf.extend_from_slice(data);
                    return Ok(());
                }
                // Drain the staging buffer, then either stage the new bytes
                // or, if they alone would overflow again, hand them to the
                // sink directly.
                if !buf.is_empty() {
                    sink.flush(buf)?;
                    *flushed += buf.len();
                    buf.clear();
                }
                if data.len() >= cap {
                    sink.flush(data)?;
                    *flushed += data.len();
                } else {
                    buf.extend_from_slice(data);
                }
                Ok(())
            }
        }
    }

    /// Total bytes produced so far, flushed or still buffered.
    fn produced(&self) -> usize {
        match *self {
            Sink::Growable(ref vec) => vec.len(),
            Sink::Fixed { used, .. } => used,
            Sink::Stream {
                ref buf, flushed, ..
            } => flushed + buf.len(),
        }
    }

    fn finish(&mut self) -> Result<usize> {
        match *self {
            Sink::Growable(ref mut vec) => {
                // Trim pathological over-allocation from doubling growth.
                if vec.len() < vec.capacity() / 2 {
                    vec.shrink_to_fit();
                }
                Ok(vec.len())
            }
            Sink::Fixed { used, .. } => Ok(used),
            Sink::Stream {
                ref mut buf,
                ref mut sink,
                ref mut flushed,
                ..
            } => {
                if !buf.is_empty() {
                    sink.flush(buf)?;
                    *flushed += buf.len();
                    buf.clear();
                }
                Ok(*flushed)
            }
        }
    }
}

/// Streaming writer encoding MessagePack into a buffer or a flush callback.
///
/// Like the reader, the writer keeps its first error sticky: after a failure
/// every further call short-circuits with the stored [`ErrorKind`], so a long
/// sequence of writes only needs one check at the end (typically via
/// [`finish`]).
///
/// [`ErrorKind`]: ../error/enum.ErrorKind.html
/// [`finish`]: #method.finish
pub struct Writer<'a> {
    sink: Sink<'a>,
    version: Version,
    track: Track,
    err: Option<ErrorKind>,
}

macro_rules! write_int_fn {
    ($(#[$attr:meta])* $method:ident: $t:ty => $variant:ident($conv:ty)) => {
        $(#[$attr])*
        pub fn $method(&mut self, value: $t) -> Result<()> {
            self.write_tag(Tag::$variant(value as $conv))
        }
    };
}

impl<'a> Writer<'a> {
    /// Creates a writer that appends to `buf`, growing it as needed.
    ///
    /// The vector is cleared first; after [`finish`] it contains exactly the
    /// encoded message.
    ///
    /// [`finish`]: #method.finish
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self {
            sink: Sink::Growable(buf),
            version: Version::default(),
            track: Track::new(),
            err: None,
        }
    }

    /// Creates a writer into a fixed buffer.
    ///
    /// Writing more than `buf.len()` bytes fails with [`ErrorKind::TooBig`].
    /// The number of bytes actually used is returned by [`finish`].
    ///
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    /// [`finish`]: #method.finish
    pub fn fixed(buf: &'a mut [u8]) -> Self {
        Self {
            sink: Sink::Fixed { buf, used: 0 },
            version: Version::default(),
            track: Track::new(),
            err: None,
        }
    }

    /// Creates a writer that stages up to `capacity` bytes and drains them
    /// through `flush`.
    ///
    /// `capacity` is raised to [`MIN_BUFFER_SIZE`] if necessary. A single
    /// write larger than the buffer bypasses staging and is handed to the
    /// callback directly.
    ///
    /// [`MIN_BUFFER_SIZE`]: ../codec/constant.MIN_BUFFER_SIZE.html
    pub fn with_flush<F: Flush + 'a>(capacity: usize, flush: F) -> Self {
        let capacity = cmp::max(capacity, MIN_BUFFER_SIZE);
        Self {
            sink: Sink::Stream {
                buf: Vec::with_capacity(capacity),
                cap: capacity,
                sink: Box::new(flush),
                flushed: 0,
            },
            version: Version::default(),
            track: Track::new(),
            err: None,
        }
    }

    /// Selects the MessagePack specification generation to emit.
    ///
    /// In [`Version::V4`], `str8` is never used, bin data is written with str
    /// type codes, and ext/timestamp writes fail with [`ErrorKind::Bug`].
    ///
    /// [`Version::V4`]: ../codec/enum.Version.html
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// The version this writer emits.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the error state of this writer, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.err
    }

    /// Puts the writer into an error state, e.g. to abort in the middle of a
    /// document. All further operations become no-ops.
    pub fn flag_error(&mut self, kind: ErrorKind) {
        if self.err.is_none() {
            debug!("writer error flagged by caller: {:?}", kind);
            self.err = Some(kind);
        }
    }

    /// Total bytes produced so far (flushed plus still buffered).
    pub fn bytes_written(&self) -> usize {
        self.sink.produced()
    }

    /// Finishes the message: verifies that all compound types were closed,
    /// flushes any remaining buffered bytes and returns the total number of
    /// bytes produced.
    pub fn finish(mut self) -> Result<usize> {
        if let Some(kind) = self.err {
            return Err(Error::new(kind, "writer is in an error state"));
        }
        self.track.check_empty()?;
        let result = self.sink.finish();
        result.map_err(|e| self.absorb(e))
    }

    /// Writes a tag.
    ///
    /// Scalar tags write the complete value. Compound tags open the value:
    /// the declared content must follow ([`write_bytes`] for str/bin/ext,
    /// element writes for arrays/maps) and be closed with the matching
    /// `finish_*` call. [`Tag::Missing`] fails with [`ErrorKind::Bug`].
    ///
    /// [`write_bytes`]: #method.write_bytes
    /// [`Tag::Missing`]: ../tag/enum.Tag.html
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.check()?;
        self.track_element()?;
        let mut header = [0; MAX_TAG_SIZE];
        let size = match codec::encode_tag(tag, self.version, &mut header) {
            Ok(size) => size,
            Err(e) => return Err(self.absorb(e)),
        };
        self.write_raw(&header[..size])?;
        match tag {
            Tag::Str(n) | Tag::Bin(n) | Tag::Ext(_, n) | Tag::Array(n) | Tag::Map(n) => {
                self.track_push(tag.kind(), u64::from(n))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Writes a nil.
    pub fn write_nil(&mut self) -> Result<()> {
        self.write_tag(Tag::Nil)
    }

    /// Writes a bool.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_tag(Tag::Bool(value))
    }

    write_int_fn!(
        /// Writes an unsigned integer in the shortest possible encoding.
        write_u8: u8 => Uint(u64)
    );
    write_int_fn!(
        /// Writes an unsigned integer in the shortest possible encoding.
        write_u16: u16 => Uint(u64)
    );
    write_int_fn!(
        /// Writes an unsigned integer in the shortest possible encoding.
        write_u32: u32 => Uint(u64)
    );
    write_int_fn!(
        /// Writes an unsigned integer in the shortest possible encoding.
        write_u64: u64 => Uint(u64)
    );
    write_int_fn!(
        /// Writes a signed integer in the shortest possible encoding.
        ///
        /// Non-negative values use the same encodings as the unsigned
        /// writes.
        write_i8: i8 => Int(i64)
    );
    write_int_fn!(
        /// Writes a signed integer in the shortest possible encoding.
        write_i16: i16 => Int(i64)
    );
    write_int_fn!(
        /// Writes a signed integer in the shortest possible encoding.
        write_i32: i32 => Int(i64)
    );
    write_int_fn!(
        /// Writes a signed integer in the shortest possible encoding.
        write_i64: i64 => Int(i64)
    );

    /// Writes an unsigned integer. Alias of [`write_u64`].
    ///
    /// [`write_u64`]: #method.write_u64
    pub fn write_uint(&mut self, value: u64) -> Result<()> {
        self.write_u64(value)
    }

    /// Writes a signed integer. Alias of [`write_i64`].
    ///
    /// [`write_i64`]: #method.write_i64
    pub fn write_int(&mut self, value: i64) -> Result<()> {
        self.write_i64(value)
    }

    /// Writes a single-precision float.
    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_tag(Tag::Float(value))
    }

    /// Writes a double-precision float.
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_tag(Tag::Double(value))
    }

    /// Writes a complete str.
    ///
    /// `&str` is UTF-8 by construction, so no validation is needed.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let len = self.check_len(value.len())?;
        self.start_str(len)?;
        self.write_bytes(value.as_bytes())?;
        self.finish_str()
    }

    /// Writes a complete str from raw bytes, validating that they are
    /// well-formed UTF-8.
    ///
    /// Prefer [`write_str`] when the data already is a `&str`; this is for
    /// bytes of unproven provenance. Fails with [`ErrorKind::Type`] on
    /// malformed UTF-8.
    ///
    /// [`write_str`]: #method.write_str
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn write_utf8(&mut self, value: &[u8]) -> Result<()> {
        self.check()?;
        if let Err(e) = string::check_utf8(value) {
            return Err(self.absorb(e));
        }
        let len = self.check_len(value.len())?;
        self.start_str(len)?;
        self.write_bytes(value)?;
        self.finish_str()
    }

    /// Writes a complete str from a C string. The data is not required to be
    /// UTF-8.
    pub fn write_cstr(&mut self, value: &CStr) -> Result<()> {
        let bytes = value.to_bytes();
        let len = self.check_len(bytes.len())?;
        self.start_str(len)?;
        self.write_bytes(bytes)?;
        self.finish_str()
    }

    /// Writes a complete bin.
    pub fn write_bin(&mut self, value: &[u8]) -> Result<()> {
        let len = self.check_len(value.len())?;
        self.start_bin(len)?;
        self.write_bytes(value)?;
        self.finish_bin()
    }

    /// Writes a complete ext value.
    pub fn write_ext(&mut self, exttype: i8, value: &[u8]) -> Result<()> {
        let len = self.check_len(value.len())?;
        self.start_ext(exttype, len)?;
        self.write_bytes(value)?;
        self.finish_ext()
    }

    /// Writes a timestamp using the shortest of the three timestamp layouts.
    ///
    /// Fails with [`ErrorKind::Bug`] for out-of-range nanoseconds or in v4
    /// compatibility mode.
    ///
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn write_timestamp(&mut self, seconds: i64, nanoseconds: u32) -> Result<()> {
        self.check()?;
        if !cfg!(feature = "extensions") {
            return Err(self.fail(
                ErrorKind::Unsupported,
                "ext types are disabled by the build configuration",
            ));
        }
        if self.version == Version::V4 {
            return Err(self.fail(
                ErrorKind::Bug,
                "timestamps cannot be written in v4 compatibility mode",
            ));
        }
        if nanoseconds > MAX_NANOSECONDS {
            return Err(self.fail(ErrorKind::Bug, "timestamp nanoseconds out of range"));
        }
        self.track_element()?;
        let mut buf = [0; codec::MAX_TIMESTAMP_SIZE];
        let size = codec::encode_timestamp(
            Timestamp {
                seconds,
                nanoseconds,
            },
            &mut buf,
        );
        self.write_raw(&buf[..size])
    }

    /// Opens a str of `len` bytes; the payload follows via [`write_bytes`],
    /// then [`finish_str`].
    ///
    /// [`write_bytes`]: #method.write_bytes
    /// [`finish_str`]: #method.finish_str
    pub fn start_str(&mut self, len: u32) -> Result<()> {
        self.write_tag(Tag::Str(len))
    }

    /// Opens a bin of `len` bytes.
    pub fn start_bin(&mut self, len: u32) -> Result<()> {
        self.write_tag(Tag::Bin(len))
    }

    /// Opens an ext value of `len` bytes.
    pub fn start_ext(&mut self, exttype: i8, len: u32) -> Result<()> {
        self.write_tag(Tag::Ext(exttype, len))
    }

    /// Opens an array of `count` elements.
    pub fn start_array(&mut self, count: u32) -> Result<()> {
        self.write_tag(Tag::Array(count))
    }

    /// Opens a map of `count` key/value pairs.
    pub fn start_map(&mut self, count: u32) -> Result<()> {
        self.write_tag(Tag::Map(count))
    }

    /// Writes payload bytes into the open str/bin/ext.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.check()?;
        self.track_bytes(data.len() as u64)?;
        self.write_raw(data)
    }

    /// Closes a str opened with [`start_str`].
    ///
    /// Fails with [`ErrorKind::Bug`] unless exactly the declared number of
    /// payload bytes was written.
    ///
    /// [`start_str`]: #method.start_str
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn finish_str(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Str)
    }

    /// Closes a bin opened with [`start_bin`].
    ///
    /// [`start_bin`]: #method.start_bin
    pub fn finish_bin(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Bin)
    }

    /// Closes an ext value opened with [`start_ext`].
    ///
    /// [`start_ext`]: #method.start_ext
    pub fn finish_ext(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Ext)
    }

    /// Closes an array opened with [`start_array`].
    ///
    /// [`start_array`]: #method.start_array
    pub fn finish_array(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Array)
    }

    /// Closes a map opened with [`start_map`].
    ///
    /// [`start_map`]: #method.start_map
    pub fn finish_map(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Map)
    }

    fn check(&self) -> Result<()> {
        match self.err {
            Some(kind) => Err(Error::new(kind, "writer is in an error state")),
            None => Ok(()),
        }
    }

    fn fail<S: Into<String>>(&mut self, kind: ErrorKind, msg: S) -> Error {
        self.absorb(Error::new(kind, msg))
    }

    fn absorb(&mut self, e: Error) -> Error {
        if self.err.is_none() {
            debug!("writer error: {:?}: {}", e.kind(), e);
            self.err = Some(e.kind());
        }
        e
    }

    fn check_len(&mut self, len: usize) -> Result<u32> {
        if len > u32::max_value() as usize {
            Err(self.fail(ErrorKind::TooBig, "data does not fit a 32-bit length"))
        } else {
            Ok(len as u32)
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let result = self.sink.write(data);
        result.map_err(|e| self.absorb(e))
    }

    fn track_element(&mut self) -> Result<()> {
        let result = self.track.element(false);
        result.map_err(|e| self.absorb(e))
    }

    fn track_push(&mut self, kind: TagKind, count: u64) -> Result<()> {
        let result = self.track.push(kind, count);
        result.map_err(|e| self.absorb(e))
    }

    fn track_pop(&mut self, kind: TagKind) -> Result<()> {
        let result = self.track.pop(kind);
        result.map_err(|e| self.absorb(e))
    }

    fn track_bytes(&mut self, count: u64) -> Result<()> {
        let result = self.track.bytes(false, count);
        result.map_err(|e| self.absorb(e))
    }
}

impl<'a> fmt::Debug for Writer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Writer")
            .field("bytes_written", &self.sink.produced())
            .field("version", &self.version)
            .field("err", &self.err)
            .finish()
    }
}
