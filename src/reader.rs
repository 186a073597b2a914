//! The streaming MessagePack reader.
//!
//! A [`Reader`] pulls tags and payload bytes out of a bounded buffer. The
//! buffer either *is* the complete message (borrowed from the caller), or is
//! refilled on demand through a [`Fill`] callback, in which case reads that
//! straddle the end of the buffered data transparently move the unread rest
//! to the front of the buffer and top it up.
//!
//! The reader performs no I/O of its own and never allocates for the wire
//! data itself; in-place reads borrow directly from the buffer.
//!
//! [`Reader`]: struct.Reader.html
//! [`Fill`]: trait.Fill.html

use codec;
use error::{Error, ErrorKind, Result};
use string::UnicodeCString;
use tag::{Tag, TagKind};
use track::Track;

use std::cmp;
use std::ffi::CString;
use std::fmt;
use std::str;

/// Supplies bytes to a [`Reader`] or tree whose buffer has run dry.
///
/// [`Reader`]: struct.Reader.html
pub trait Fill {
    /// Fills `buf` with up to `buf.len()` bytes of input, returning the
    /// number of bytes written.
    ///
    /// Returning `0` means the stream has ended. A reader treats that as
    /// [`ErrorKind::Io`] when it happens in the middle of a message; a tree
    /// in non-blocking mode treats it as "no data available right now" and
    /// suspends.
    ///
    /// [`ErrorKind::Io`]: ../error/enum.ErrorKind.html
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Skips `count` bytes of input without producing them.
    ///
    /// Sources that can seek should implement this and return `Ok(true)`.
    /// The default returns `Ok(false)`, which makes the reader fall back to
    /// filling and discarding.
    fn skip(&mut self, count: usize) -> Result<bool> {
        let _ = count;
        Ok(false)
    }
}

/// Any `FnMut` closure producing bytes can be used as a fill callback.
impl<F> Fill for F
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        self(buf)
    }
}

enum Buffer<'a> {
    /// The caller's complete message; never refilled.
    Borrowed(&'a [u8]),
    /// An owned scratch buffer, kept at its full size at all times.
    Owned(Vec<u8>),
}

impl<'a> Buffer<'a> {
    fn as_slice(&self) -> &[u8] {
        match *self {
            Buffer::Borrowed(bytes) => bytes,
            Buffer::Owned(ref vec) => vec,
        }
    }
}

/// Streaming reader decoding MessagePack from a buffer with an optional fill
/// callback.
///
/// All operations return `Result`s, and the first error is additionally kept
/// on the reader: after a failure every further call short-circuits with the
/// stored [`ErrorKind`] without touching the input. This means long call
/// sequences only need to check the result once at the end.
///
/// [`ErrorKind`]: ../error/enum.ErrorKind.html
pub struct Reader<'a> {
    buf: Buffer<'a>,
    /// Read cursor into `buf`.
    pos: usize,
    /// End of the filled region of `buf`.
    end: usize,
    fill: Option<Box<dyn Fill + 'a>>,
    track: Track,
    err: Option<ErrorKind>,
}

impl<'a> Reader<'a> {
    /// Creates a reader over a complete message held in `data`.
    ///
    /// No fill callback is attached: running past the end of `data` means the
    /// message is truncated and fails with [`ErrorKind::Invalid`].
    ///
    /// [`ErrorKind::Invalid`]: ../error/enum.ErrorKind.html
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            pos: 0,
            end: data.len(),
            buf: Buffer::Borrowed(data),
            fill: None,
            track: Track::new(),
            err: None,
        }
    }

    /// Creates a reader that pulls its input through `fill`, buffering up to
    /// `capacity` bytes at a time.
    ///
    /// `capacity` is raised to [`MIN_BUFFER_SIZE`] if necessary, so that any
    /// single tag header (and any fixstr) always fits the buffer.
    ///
    /// [`MIN_BUFFER_SIZE`]: ../codec/constant.MIN_BUFFER_SIZE.html
    pub fn with_fill<F: Fill + 'a>(capacity: usize, fill: F) -> Self {
        let capacity = cmp::max(capacity, codec::MIN_BUFFER_SIZE);
        Self {
            pos: 0,
            end: 0,
            buf: Buffer::Owned(vec![0; capacity]),
            fill: Some(Box::new(fill)),
            track: Track::new(),
            err: None,
        }
    }

    /// Returns the error state of this reader, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.err
    }

    /// Puts the reader into an error state, e.g. to abort in the middle of a
    /// document. All further operations become no-ops.
    ///
    /// Flagging an error is idempotent; the first flagged error wins.
    pub fn flag_error(&mut self, kind: ErrorKind) {
        if self.err.is_none() {
            debug!("reader error flagged by caller: {:?}", kind);
            self.err = Some(kind);
        }
    }

    /// The bytes that are buffered but not yet consumed.
    ///
    /// After reading a complete message from a stream this is the prefix of
    /// the following message that was filled but not used.
    pub fn remaining(&self) -> &[u8] {
        self.buffered()
    }

    /// Finishes reading: verifies that no compound type is left open and
    /// returns the final error state.
    pub fn finish(self) -> Result<()> {
        if let Some(kind) = self.err {
            return Err(Error::new(kind, "reader is in an error state"));
        }
        self.track.check_empty()
    }

    /// Returns the next tag and advances past its header.
    ///
    /// For compound tags the caller must consume the content (elements for
    /// arrays/maps, payload bytes for str/bin/ext) and then call the matching
    /// `done_*` function.
    pub fn read_tag(&mut self) -> Result<Tag> {
        self.check()?;
        let (tag, size) = self.parse_tag()?;
        self.track_element()?;
        match tag {
            Tag::Str(n) | Tag::Bin(n) | Tag::Ext(_, n) | Tag::Array(n) | Tag::Map(n) => {
                self.track_push(tag.kind(), u64::from(n))?;
            }
            _ => {}
        }
        self.pos += size;
        Ok(tag)
    }

    /// Returns the next tag without consuming it.
    ///
    /// The tag is not opened: no tracking state changes, and the next
    /// [`read_tag`] will return the same tag again. Peeking where no element
    /// may follow (e.g. past the declared end of an open container) fails
    /// with [`ErrorKind::Bug`].
    ///
    /// [`read_tag`]: #method.read_tag
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn peek_tag(&mut self) -> Result<Tag> {
        self.check()?;
        self.track_peek_element()?;
        self.parse_tag().map(|(tag, _)| tag)
    }

    /// Reads and discards the next complete value, including any nested
    /// content.
    pub fn discard(&mut self) -> Result<()> {
        self.check()?;
        self.track_element()?;

        // Iterative skip: `left` counts the values that still have to be
        // consumed before the outermost one is complete.
        let mut left: u64 = 1;
        while left > 0 {
            left -= 1;
            let (tag, size) = self.parse_tag()?;
            self.pos += size;
            match tag {
                Tag::Str(n) | Tag::Bin(n) | Tag::Ext(_, n) => self.skip_raw(n as usize)?,
                Tag::Array(n) => {
                    left = match left.checked_add(u64::from(n)) {
                        Some(left) => left,
                        None => {
                            return Err(
                                self.fail(ErrorKind::Invalid, "nesting counter overflowed")
                            );
                        }
                    };
                }
                Tag::Map(n) => {
                    left = match left.checked_add(u64::from(n) * 2) {
                        Some(left) => left,
                        None => {
                            return Err(
                                self.fail(ErrorKind::Invalid, "nesting counter overflowed")
                            );
                        }
                    };
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Closes an array opened by [`read_tag`].
    ///
    /// Fails with [`ErrorKind::Bug`] if the innermost open compound type is
    /// not an array or has unread elements.
    ///
    /// [`read_tag`]: #method.read_tag
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    pub fn done_array(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Array)
    }

    /// Closes a map opened by [`read_tag`].
    ///
    /// [`read_tag`]: #method.read_tag
    pub fn done_map(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Map)
    }

    /// Closes a str opened by [`read_tag`].
    ///
    /// [`read_tag`]: #method.read_tag
    pub fn done_str(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Str)
    }

    /// Closes a bin opened by [`read_tag`].
    ///
    /// [`read_tag`]: #method.read_tag
    pub fn done_bin(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Bin)
    }

    /// Closes an ext opened by [`read_tag`].
    ///
    /// [`read_tag`]: #method.read_tag
    pub fn done_ext(&mut self) -> Result<()> {
        self.check()?;
        self.track_pop(TagKind::Ext)
    }

    /// Copies `dst.len()` payload bytes of the open str/bin/ext into `dst`.
    ///
    /// Reads larger than the buffer are streamed directly into `dst`, so this
    /// works for payloads of any size.
    pub fn read_bytes_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.check()?;
        self.track_bytes(dst.len() as u64)?;
        self.read_native(dst)
    }

    /// Reads `count` payload bytes of the open str/bin/ext into a fresh
    /// `Vec`.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.check()?;
        // Don't trust a declared length further than the input it claims to
        // describe: without a fill callback the bytes must already be here.
        if self.fill.is_none() && count > self.left() {
            return Err(self.fail(ErrorKind::Invalid, "message is truncated"));
        }
        let mut bytes = vec![0; count];
        self.read_bytes_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Returns `count` payload bytes as a slice borrowed from the reader's
    /// buffer, without copying.
    ///
    /// If the bytes straddle the end of the buffered data, the unread rest is
    /// moved to the start of the buffer and the buffer is refilled first.
    /// Fails with [`ErrorKind::TooBig`] if `count` exceeds the buffer size;
    /// use [`read_bytes_into`] to stream larger payloads.
    ///
    /// The returned slice is valid until the next operation on this reader.
    ///
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    /// [`read_bytes_into`]: #method.read_bytes_into
    pub fn read_bytes_inplace(&mut self, count: usize) -> Result<&[u8]> {
        self.check()?;
        self.track_bytes(count as u64)?;
        self.ensure(count)?;
        Ok(self.take_slice(count))
    }

    /// Like [`read_bytes_inplace`], but validates that the bytes are
    /// well-formed UTF-8 and returns them as a `&str`.
    ///
    /// Fails with [`ErrorKind::Type`] on malformed UTF-8.
    ///
    /// [`read_bytes_inplace`]: #method.read_bytes_inplace
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn read_utf8_inplace(&mut self, count: usize) -> Result<&str> {
        self.check()?;
        self.track_bytes(count as u64)?;
        self.ensure(count)?;
        if str::from_utf8(&self.buffered()[..count]).is_err() {
            return Err(self.fail(ErrorKind::Type, "string is not valid UTF-8"));
        }
        let bytes = self.take_slice(count);
        Ok(str::from_utf8(bytes).expect("string was checked to be valid UTF-8"))
    }

    /// Reads `count` payload bytes as an owned, UTF-8 validated `String`.
    pub fn read_utf8(&mut self, count: usize) -> Result<String> {
        let bytes = self.read_bytes(count)?;
        match String::from_utf8(bytes) {
            Ok(string) => Ok(string),
            Err(_) => Err(self.fail(ErrorKind::Type, "string is not valid UTF-8")),
        }
    }

    /// Reads `count` payload bytes as a `CString`.
    ///
    /// The data does not have to be UTF-8, but embedded nul bytes fail with
    /// [`ErrorKind::Type`].
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn read_cstr(&mut self, count: usize) -> Result<CString> {
        let bytes = self.read_bytes(count)?;
        match CString::new(bytes) {
            Ok(string) => Ok(string),
            Err(_) => Err(self.fail(ErrorKind::Type, "string contains an embedded nul byte")),
        }
    }

    /// Reads `count` payload bytes as a [`UnicodeCString`]: UTF-8 validated
    /// and free of embedded nul bytes.
    ///
    /// [`UnicodeCString`]: ../string/struct.UnicodeCString.html
    pub fn read_utf8_cstr(&mut self, count: usize) -> Result<UnicodeCString> {
        let bytes = self.read_bytes(count)?;
        match UnicodeCString::from_bytes(bytes) {
            Ok(string) => Ok(string),
            Err(e) => Err(self.absorb(e)),
        }
    }

    /// Skips `count` payload bytes of the open str/bin/ext.
    ///
    /// Large skips are delegated to [`Fill::skip`] when the source supports
    /// seeking; otherwise the bytes are filled and discarded.
    ///
    /// [`Fill::skip`]: trait.Fill.html#method.skip
    pub fn skip_bytes(&mut self, count: usize) -> Result<()> {
        self.check()?;
        self.track_bytes(count as u64)?;
        self.skip_raw(count)
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.err {
            Some(kind) => Err(Error::new(kind, "reader is in an error state")),
            None => Ok(()),
        }
    }

    /// Flags `kind` (first error wins) and returns an error to propagate.
    pub(crate) fn fail<S: Into<String>>(&mut self, kind: ErrorKind, msg: S) -> Error {
        self.absorb(Error::new(kind, msg))
    }

    /// Stores the kind of an error produced elsewhere (first error wins).
    pub(crate) fn absorb(&mut self, e: Error) -> Error {
        if self.err.is_none() {
            debug!("reader error: {:?}: {}", e.kind(), e);
            self.err = Some(e.kind());
        }
        e
    }

    fn left(&self) -> usize {
        self.end - self.pos
    }

    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buf.as_slice()[self.pos..self.end]
    }

    /// Consumes `count` already-ensured bytes and returns them.
    pub(crate) fn take_slice(&mut self, count: usize) -> &[u8] {
        debug_assert!(count <= self.left());
        let start = self.pos;
        self.pos += count;
        &self.buf.as_slice()[start..start + count]
    }

    fn track_element(&mut self) -> Result<()> {
        let result = self.track.element(true);
        result.map_err(|e| self.absorb(e))
    }

    fn track_peek_element(&mut self) -> Result<()> {
        let result = self.track.peek_element();
        result.map_err(|e| self.absorb(e))
    }

    fn track_push(&mut self, kind: TagKind, count: u64) -> Result<()> {
        let result = self.track.push(kind, count);
        result.map_err(|e| self.absorb(e))
    }

    pub(crate) fn track_pop(&mut self, kind: TagKind) -> Result<()> {
        let result = self.track.pop(kind);
        result.map_err(|e| self.absorb(e))
    }

    pub(crate) fn track_bytes(&mut self, count: u64) -> Result<()> {
        let result = self.track.bytes(true, count);
        result.map_err(|e| self.absorb(e))
    }

    /// Decodes the next tag without advancing or touching tracking state.
    fn parse_tag(&mut self) -> Result<(Tag, usize)> {
        self.ensure(1)?;
        let size = codec::header_size(self.buffered()[0]);
        self.ensure(size)?;
        match codec::decode_tag(self.buffered()) {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(self.absorb(e)),
        }
    }

    /// Makes sure at least `count` contiguous bytes are buffered, refilling
    /// if necessary.
    pub(crate) fn ensure(&mut self, count: usize) -> Result<()> {
        if count <= self.left() {
            return Ok(());
        }
        self.ensure_straddle(count)
    }

    fn ensure_straddle(&mut self, count: usize) -> Result<()> {
        debug_assert!(count > self.left());

        // Without a fill callback the buffer was promised to contain a
        // complete message, so running out means the data is truncated.
        if self.fill.is_none() {
            return Err(self.fail(ErrorKind::Invalid, "message is truncated"));
        }
        let capacity = self.buf.as_slice().len();
        if count > capacity {
            return Err(self.fail(
                ErrorKind::TooBig,
                format!("in-place span of {} bytes exceeds the {} byte buffer", count, capacity),
            ));
        }

        // Move the unread rest to the front to make room.
        if self.pos > 0 {
            let left = self.left();
            if let Buffer::Owned(ref mut vec) = self.buf {
                for i in 0..left {
                    vec[i] = vec[self.pos + i];
                }
            }
            self.pos = 0;
            self.end = left;
        }

        while self.left() < count {
            let filled = self.end;
            let result = match (&mut self.buf, &mut self.fill) {
                (&mut Buffer::Owned(ref mut vec), &mut Some(ref mut fill)) => {
                    fill.fill(&mut vec[filled..])
                }
                _ => unreachable!("fill callback without a writable buffer"),
            };
            let read = match result {
                Ok(read) => read,
                Err(e) => return Err(self.absorb(e)),
            };
            if read == 0 {
                return Err(self.fail(ErrorKind::Io, "stream ended in the middle of a message"));
            }
            self.end += read;
        }
        Ok(())
    }

    /// Copies `dst.len()` bytes out of the input, streaming past the buffer
    /// if needed.
    fn read_native(&mut self, dst: &mut [u8]) -> Result<()> {
        let count = dst.len();
        if count <= self.left() {
            let pos = self.pos;
            dst.copy_from_slice(&self.buf.as_slice()[pos..pos + count]);
            self.pos += count;
            return Ok(());
        }

        if self.fill.is_none() {
            return Err(self.fail(ErrorKind::Invalid, "message is truncated"));
        }
        let capacity = self.buf.as_slice().len();

        // A small straddling read refills the whole buffer and copies, to
        // amortize callback calls; a large one copies what is buffered and
        // fills the rest directly into the destination to avoid the double
        // copy.
        if count <= capacity / 32 {
            self.ensure_straddle(count)?;
            let pos = self.pos;
            dst.copy_from_slice(&self.buf.as_slice()[pos..pos + count]);
            self.pos += count;
            return Ok(());
        }

        let have = self.left();
        let pos = self.pos;
        dst[..have].copy_from_slice(&self.buf.as_slice()[pos..pos + have]);
        self.pos = 0;
        self.end = 0;

        let mut filled = have;
        while filled < count {
            let result = match self.fill {
                Some(ref mut fill) => fill.fill(&mut dst[filled..]),
                None => unreachable!(),
            };
            let read = match result {
                Ok(read) => read,
                Err(e) => return Err(self.absorb(e)),
            };
            if read == 0 {
                return Err(self.fail(ErrorKind::Io, "stream ended in the middle of a message"));
            }
            filled += read;
        }
        Ok(())
    }

    /// Advances past `count` input bytes without tracking.
    fn skip_raw(&mut self, count: usize) -> Result<()> {
        let have = cmp::min(count, self.left());
        self.pos += have;
        let count = count - have;
        if count == 0 {
            return Ok(());
        }

        if self.fill.is_none() {
            return Err(self.fail(ErrorKind::Invalid, "message is truncated"));
        }
        let capacity = self.buf.as_slice().len();

        // Seeking is worth a callback only when the skip is large relative to
        // the buffer; tiny skips just consume from fill.
        if count > capacity / 16 {
            let result = match self.fill {
                Some(ref mut fill) => fill.skip(count),
                None => unreachable!(),
            };
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => return Err(self.absorb(e)),
            }
        }
        self.skip_using_fill(count)
    }

    fn skip_using_fill(&mut self, mut count: usize) -> Result<()> {
        debug_assert_eq!(self.left(), 0);
        self.pos = 0;
        self.end = 0;

        while count > 0 {
            let result = match (&mut self.buf, &mut self.fill) {
                (&mut Buffer::Owned(ref mut vec), &mut Some(ref mut fill)) => fill.fill(vec),
                _ => unreachable!("fill callback without a writable buffer"),
            };
            let read = match result {
                Ok(read) => read,
                Err(e) => return Err(self.absorb(e)),
            };
            if read == 0 {
                return Err(self.fail(ErrorKind::Io, "stream ended in the middle of a message"));
            }
            // Whatever was filled beyond the skip stays buffered.
            let used = cmp::min(read, count);
            self.pos = used;
            self.end = read;
            count -= used;
        }
        Ok(())
    }
}

impl<'a> fmt::Debug for Reader<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("fill", &self.fill.as_ref().map(|_| "..."))
            .field("err", &self.err)
            .finish()
    }
}
