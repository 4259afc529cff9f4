//! Strongly-typed values for Skein entities.
//!
//! A log is named by a [`LogKey`] and its records are addressed by an
//! [`Offset`]. Both serialize transparently so they can appear directly in
//! wire payloads.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier naming one append-only log.
///
/// Keys are opaque strings. A log comes into existence on its first append;
/// there is no separate create step.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogKey(String);

impl LogKey {
    /// Creates a log key from any string-like value.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is the empty string.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log({:?})", self.0)
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LogKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for LogKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position of a record within a log.
///
/// Offsets are granted starting at 1. [`Offset::ZERO`] means "nothing granted
/// yet" and never addresses a record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Offset(u64);

impl Offset {
    /// The offset before the first record of every log.
    pub const ZERO: Self = Self(0);

    /// Creates a new offset from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next offset in sequence.
    ///
    /// # Panics
    /// Panics if the offset would overflow.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        assert!(self.0 < u64::MAX, "offset overflow");
        Self(self.0 + 1)
    }

    /// Returns true if this offset can address a record.
    #[inline]
    #[must_use]
    pub const fn is_record(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset({})", self.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Offset> for u64 {
    fn from(offset: Offset) -> Self {
        offset.get()
    }
}

impl TryFrom<i64> for Offset {
    type Error = crate::Error;

    fn try_from(value: i64) -> crate::Result<Self> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| crate::Error::InvalidArgument {
                name: "offset",
                reason: "must be non-negative",
            })
    }
}

impl TryFrom<Offset> for i64 {
    type Error = crate::Error;

    fn try_from(offset: Offset) -> crate::Result<Self> {
        Self::try_from(offset.0).map_err(|_| crate::Error::LimitExceeded {
            limit: "offset",
            max: Self::MAX.unsigned_abs(),
            actual: offset.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_display() {
        let offset = Offset::new(42);
        assert_eq!(format!("{offset}"), "42");
        assert_eq!(format!("{offset:?}"), "offset(42)");
    }

    #[test]
    fn test_offset_next() {
        assert_eq!(Offset::ZERO.next(), Offset::new(1));
        assert_eq!(Offset::ZERO.next().next().get(), 2);
        assert!(!Offset::ZERO.is_record());
        assert!(Offset::ZERO.next().is_record());
    }

    #[test]
    #[should_panic(expected = "offset overflow")]
    fn test_offset_overflow_panics() {
        let _ = Offset::new(u64::MAX).next();
    }

    #[test]
    fn test_offset_signed_conversions() {
        assert_eq!(Offset::try_from(7_i64).unwrap(), Offset::new(7));
        assert!(Offset::try_from(-1_i64).is_err());
        assert_eq!(i64::try_from(Offset::new(7)).unwrap(), 7);
        assert!(i64::try_from(Offset::new(u64::MAX)).is_err());
    }

    #[test]
    fn test_log_key_lookup_by_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(LogKey::from("k1"), Offset::new(1));
        assert_eq!(map.get("k1"), Some(&Offset::new(1)));
        assert_eq!(format!("{:?}", LogKey::from("k1")), "log(\"k1\")");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&(LogKey::from("k1"), Offset::new(3))).unwrap();
        assert_eq!(json, r#"["k1",3]"#);

        let back: (LogKey, Offset) = serde_json::from_str(&json).unwrap();
        assert_eq!(back, (LogKey::from("k1"), Offset::new(3)));
    }
}
