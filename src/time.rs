//! The timestamp value carried by the reserved timestamp extension.

use error::{Error, ErrorKind, Result};

/// The reserved ext type of MessagePack timestamps.
pub const TIMESTAMP_TYPE: i8 = -1;

/// The largest valid nanosecond field of a [`Timestamp`].
///
/// [`Timestamp`]: struct.Timestamp.html
pub const MAX_NANOSECONDS: u32 = 999_999_999;

/// A point in time: whole seconds since the Unix epoch plus a sub-second
/// nanosecond offset.
///
/// Seconds may be negative (times before 1970); nanoseconds always add to the
/// second, so `-1.5s` is `{ seconds: -2, nanoseconds: 500_000_000 }`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since 1970-01-01 00:00:00 UTC.
    pub seconds: i64,
    /// Additional nanoseconds, `0 ..= 999_999_999`.
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Creates a timestamp, validating the nanosecond range.
    ///
    /// Fails with [`ErrorKind::Bug`] when `nanoseconds` exceeds
    /// [`MAX_NANOSECONDS`].
    ///
    /// [`ErrorKind::Bug`]: ../error/enum.ErrorKind.html
    /// [`MAX_NANOSECONDS`]: constant.MAX_NANOSECONDS.html
    pub fn new(seconds: i64, nanoseconds: u32) -> Result<Self> {
        if nanoseconds > MAX_NANOSECONDS {
            return Err(Error::new(
                ErrorKind::Bug,
                "timestamp nanoseconds out of range",
            ));
        }
        Ok(Self {
            seconds,
            nanoseconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanosecond_range() {
        assert!(Timestamp::new(0, MAX_NANOSECONDS).is_ok());
        assert_eq!(
            Timestamp::new(0, 1_000_000_000).unwrap_err().kind(),
            ErrorKind::Bug
        );
    }

    #[test]
    fn ordering_is_chronological() {
        let a = Timestamp::new(-2, 500_000_000).unwrap();
        let b = Timestamp::new(-1, 0).unwrap();
        let c = Timestamp::new(-1, 1).unwrap();
        assert!(a < b && b < c);
    }
}
