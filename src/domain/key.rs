//! Filter keys for log deduplication.
//!
//! A filter key is the identity of a log record: the level name and the fully
//! formatted message, joined as `LEVEL:message\n`. The engine treats it as an
//! opaque byte sequence. Two keys are equal only if their bytes are equal, so
//! the comparison is case-sensitive and length-sensitive.

use std::borrow::Borrow;
use std::fmt;

/// Separator between the level name and the message.
const LEVEL_SEPARATOR: u8 = b':';

/// Owned, immutable byte identity of a log record.
///
/// `FilterKey` borrows as `[u8]`, so stores can be queried with a plain byte
/// slice and only allocate a key when a new record is inserted.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterKey(Box<[u8]>);

impl FilterKey {
    /// Build a key from a level name and a formatted message.
    ///
    /// The result is `level + ":" + message`, with a trailing newline appended
    /// when the message does not already end with one.
    ///
    /// # Example
    /// ```
    /// use tracing_dedup::FilterKey;
    ///
    /// let key = FilterKey::compose("INFO", "hello");
    /// assert_eq!(key.as_bytes(), b"INFO:hello\n");
    ///
    /// // An existing newline is not doubled
    /// let key = FilterKey::compose("WARN", "disk full\n");
    /// assert_eq!(key.as_bytes(), b"WARN:disk full\n");
    /// ```
    pub fn compose(level: &str, message: &str) -> Self {
        let needs_newline = !message.ends_with('\n');
        let mut bytes = Vec::with_capacity(level.len() + message.len() + 2);
        bytes.extend_from_slice(level.as_bytes());
        bytes.push(LEVEL_SEPARATOR);
        bytes.extend_from_slice(message.as_bytes());
        if needs_newline {
            bytes.push(b'\n');
        }
        FilterKey(bytes.into_boxed_slice())
    }

    /// Get the raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the key has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for FilterKey {
    fn from(bytes: &[u8]) -> Self {
        FilterKey(bytes.into())
    }
}

impl From<Vec<u8>> for FilterKey {
    fn from(bytes: Vec<u8>) -> Self {
        FilterKey(bytes.into_boxed_slice())
    }
}

impl From<&str> for FilterKey {
    fn from(text: &str) -> Self {
        FilterKey::from(text.as_bytes())
    }
}

impl Borrow<[u8]> for FilterKey {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for FilterKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilterKey({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.0);
        f.write_str(text.trim_end_matches('\n'))
    }
}
