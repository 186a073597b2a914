//! Structural validation of reads and writes.
//!
//! Readers and writers keep a stack with one element per open compound type.
//! Every element read or written, and every payload byte of a str/bin/ext, is
//! counted against the innermost open element; mismatches between the
//! declared and the actual shape of the data are API misuse and flagged as
//! [`ErrorKind::Bug`].
//!
//! [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html

use error::{Error, ErrorKind, Result};
use tag::TagKind;

const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Copy, Clone)]
struct Element {
    kind: TagKind,
    /// Slots left to fill: elements for arrays, key/value slots for maps
    /// (twice the pair count), bytes for str/bin/ext.
    left: u64,
    /// Map only: a key has been processed but its value has not.
    key_needs_value: bool,
}

fn verb(is_read: bool) -> &'static str {
    if is_read {
        "read"
    } else {
        "written"
    }
}

/// Tracks the open compound types of one reader or writer.
#[derive(Debug)]
pub(crate) struct Track {
    elements: Vec<Element>,
}

impl Track {
    pub fn new() -> Self {
        Self {
            elements: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Opens a compound type. `count` is the declared element/pair/byte count
    /// from its tag.
    pub fn push(&mut self, kind: TagKind, count: u64) -> Result<()> {
        let left = match kind {
            TagKind::Array => count,
            // maps have one slot per key and one per value
            TagKind::Map => count.checked_mul(2).ok_or_else(|| {
                Error::new(ErrorKind::Invalid, "map pair count overflows the slot count")
            })?,
            TagKind::Str | TagKind::Bin | TagKind::Ext => count,
            _ => unreachable!("cannot track scalar kind {}", kind),
        };
        self.elements.push(Element {
            kind,
            left,
            key_needs_value: false,
        });
        Ok(())
    }

    /// Closes the innermost open compound type, which must be of the given
    /// kind and must have been fully processed.
    pub fn pop(&mut self, kind: TagKind) -> Result<()> {
        let top = match self.elements.last() {
            Some(top) => *top,
            None => {
                return Err(Error::new(
                    ErrorKind::Bug,
                    format!("attempted to close a {} that is not open", kind),
                ));
            }
        };
        if top.kind != kind {
            return Err(Error::new(
                ErrorKind::Bug,
                format!("attempted to close a {} but a {} is open", kind, top.kind),
            ));
        }
        if top.left > 0 || top.key_needs_value {
            return Err(Error::new(
                ErrorKind::Bug,
                format!("closing {} with {} slots left unprocessed", kind, top.left),
            ));
        }
        self.elements.pop();
        Ok(())
    }

    /// Counts one element against the innermost open array or map. Called for
    /// every value processed at the top level of a container; a no-op outside
    /// of any container.
    pub fn element(&mut self, is_read: bool) -> Result<()> {
        let top = match self.elements.last_mut() {
            Some(top) => top,
            None => return Ok(()),
        };
        match top.kind {
            TagKind::Array | TagKind::Map => {}
            kind => {
                return Err(Error::new(
                    ErrorKind::Bug,
                    format!("elements cannot be {} inside an open {}", verb(is_read), kind),
                ));
            }
        }
        if top.left == 0 {
            return Err(Error::new(
                ErrorKind::Bug,
                format!("too many elements {} for {}", verb(is_read), top.kind),
            ));
        }
        top.left -= 1;
        if top.kind == TagKind::Map {
            top.key_needs_value = !top.key_needs_value;
        }
        Ok(())
    }

    /// Checks that an element may be read at this point, without consuming a
    /// slot. Used when peeking: the same conditions as [`element`] apply, but
    /// the peeked value is not processed yet.
    ///
    /// [`element`]: #method.element
    pub fn peek_element(&self) -> Result<()> {
        let top = match self.elements.last() {
            Some(top) => top,
            None => return Ok(()),
        };
        match top.kind {
            TagKind::Array | TagKind::Map => {}
            kind => {
                return Err(Error::new(
                    ErrorKind::Bug,
                    format!("elements cannot be peeked inside an open {}", kind),
                ));
            }
        }
        if top.left == 0 {
            return Err(Error::new(
                ErrorKind::Bug,
                format!("peeked past the last element of {}", top.kind),
            ));
        }
        Ok(())
    }

    /// Counts `count` payload bytes against the innermost open str/bin/ext.
    pub fn bytes(&mut self, is_read: bool, count: u64) -> Result<()> {
        let top = match self.elements.last_mut() {
            Some(top) => top,
            None => {
                return Err(Error::new(
                    ErrorKind::Bug,
                    format!("bytes {} with no open str/bin/ext", verb(is_read)),
                ));
            }
        };
        match top.kind {
            TagKind::Str | TagKind::Bin | TagKind::Ext => {}
            kind => {
                return Err(Error::new(
                    ErrorKind::Bug,
                    format!("bytes cannot be {} inside an open {}", verb(is_read), kind),
                ));
            }
        }
        if count > top.left {
            return Err(Error::new(
                ErrorKind::Bug,
                format!("too many bytes {} for {}", verb(is_read), top.kind),
            ));
        }
        top.left -= count;
        Ok(())
    }

    /// Verifies that no compound type is left open. Called when a document is
    /// finished.
    pub fn check_empty(&self) -> Result<()> {
        match self.elements.last() {
            None => Ok(()),
            Some(top) => Err(Error::new(
                ErrorKind::Bug,
                format!(
                    "finished with {} open compound type(s), innermost is a {}",
                    self.elements.len(),
                    top.kind
                ),
            )),
        }
    }
}
