//! String validation helpers and the string types returned by checked reads.

use error::{Error, ErrorKind, Result};

use std::borrow::Borrow;
use std::ffi::CStr;
use std::str;
use std::{fmt, ops};

/// Checks that `bytes` is well-formed UTF-8 and returns it as a `&str`.
///
/// This accepts exactly pure UTF-8: ASCII and properly tagged 2/3/4-byte
/// sequences. Overlong encodings, surrogates, codepoints above U+10FFFF and
/// truncated sequences are all rejected, as are the Modified UTF-8 / CESU-8 /
/// WTF-8 dialects. Fails with [`ErrorKind::Type`].
///
/// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
pub fn check_utf8(bytes: &[u8]) -> Result<&str> {
    str::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::Type, "string is not valid UTF-8"))
}

/// Like [`check_utf8`], but additionally rejects embedded nul bytes.
///
/// Use this when the string will be handed to something expecting C string
/// semantics.
///
/// [`check_utf8`]: fn.check_utf8.html
pub fn check_utf8_no_nul(bytes: &[u8]) -> Result<&str> {
    check_no_nul(bytes)?;
    check_utf8(bytes)
}

/// Checks that `bytes` contains no nul bytes (it does not have to be UTF-8).
///
/// Fails with [`ErrorKind::Type`].
///
/// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
pub fn check_no_nul(bytes: &[u8]) -> Result<()> {
    if bytes.iter().any(|&b| b == 0) {
        Err(Error::new(
            ErrorKind::Type,
            "string contains an embedded nul byte",
        ))
    } else {
        Ok(())
    }
}

/// A nul-terminated UTF-8 encoded string without interior nul bytes.
///
/// This type can be freely converted to `&str` and `&CStr`. It can be seen as
/// the intersection of `String` and `CString` (everything valid as both a
/// `String` and a `CString` is valid as a `UnicodeCString`).
///
/// Returned by the `*_cstr` read operations, which guarantee both properties
/// on the wire data.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct UnicodeCString {
    // always ends in exactly one nul byte
    inner: String,
}

impl UnicodeCString {
    /// Creates a `UnicodeCString` from a byte vector.
    ///
    /// Fails with [`ErrorKind::Type`] when the bytes are not UTF-8 or contain
    /// a nul byte.
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        check_utf8_no_nul(&bytes)?;
        let mut inner =
            String::from_utf8(bytes).expect("string was checked to be valid UTF-8");
        inner.push('\0');
        Ok(Self { inner })
    }

    /// Creates a `UnicodeCString` from a `&str` slice.
    ///
    /// Fails with [`ErrorKind::Type`] when the string contains nul bytes.
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes().to_vec())
    }

    /// Get this string as a `&str` slice (without the nul terminator).
    pub fn as_str(&self) -> &str {
        &self.inner[..self.inner.len() - 1]
    }

    /// Get this string as a `&CStr`.
    ///
    /// This cannot fail, as a `UnicodeCString` never contains interior nul
    /// bytes (and contains a nul terminator).
    pub fn as_cstr(&self) -> &CStr {
        CStr::from_bytes_with_nul(self.inner.as_bytes())
            .expect("couldn't create CStr from UnicodeCString")
    }
}

impl fmt::Display for UnicodeCString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for UnicodeCString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl Borrow<str> for UnicodeCString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl ops::Deref for UnicodeCString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}
