//! Defines the error type shared by readers, writers and trees.

use std::result;

/// Specialized `Result` type used throughout the library.
pub type Result<T> = result::Result<T, Error>;

/// The category of a failure.
///
/// Errors are *sticky*: the first error flagged on a reader, writer or tree is
/// stored on the instance, and every later operation on it short-circuits with
/// the same kind without performing any I/O. There is no recovery; discard the
/// instance and create a new one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Fail)]
pub enum ErrorKind {
    /// A stream callback failed, or reported end-of-stream in the middle of a
    /// message.
    #[fail(display = "stream callback failed")]
    Io,
    /// The data is not valid MessagePack (reserved type byte, truncated
    /// message, out-of-range timestamp, and so on).
    #[fail(display = "data is not valid MessagePack")]
    Invalid,
    /// The data contains a type code that is disabled by the build
    /// configuration (ext types without the `extensions` feature).
    #[fail(display = "type code disabled by build configuration")]
    Unsupported,
    /// The value does not match the type or range expected by the caller.
    #[fail(display = "value does not match the expected type or range")]
    Type,
    /// A declared or requested size exceeds the buffer size or a configured
    /// limit.
    #[fail(display = "size exceeds buffer capacity or configured limit")]
    TooBig,
    /// The API was misused (mismatched `done_*`/`finish_*` calls, too many or
    /// too few elements written into a container, and so on).
    #[fail(display = "API misuse")]
    Bug,
    /// The data was semantically rejected by the caller (duplicate map key,
    /// array index out of range).
    #[fail(display = "data rejected by caller")]
    Data,
    /// A stream cleanly ended before the start of a new message.
    #[fail(display = "end of input")]
    Eof,
}

/// Generic error used by the library.
///
/// Carries an [`ErrorKind`] categorizing the failure plus a human-readable
/// description of what exactly went wrong.
///
/// [`ErrorKind`]: enum.ErrorKind.html
#[derive(Debug, Fail)]
#[fail(display = "{}", msg)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    /// Creates an error of the given kind.
    ///
    /// Mostly useful inside fill/flush/skip callbacks, e.g. to report
    /// [`ErrorKind::Io`] with a description of what the source did.
    ///
    /// [`ErrorKind::Io`]: enum.ErrorKind.html
    pub fn new<S: Into<String>>(kind: ErrorKind, msg: S) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_preserved() {
        let e = Error::new(ErrorKind::TooBig, "way too big");
        assert_eq!(e.kind(), ErrorKind::TooBig);
        assert_eq!(e.to_string(), "way too big");
    }
}
