//! Query keys and their canonical serialization.
//!
//! A [`QueryKey`] is an ordered, finite sequence of [`KeySegment`]s that
//! identifies one cached resource, e.g. `["postVotes", 1]`. The cache
//! addresses entries and listener sets by the key's canonical
//! serialization: the JSON encoding of the segment sequence, which is
//! deterministic and order-preserving. Two keys are equivalent exactly
//! when their serializations are equal.
//!
//! # Example
//!
//! ```
//! use refetch::query_key;
//!
//! let key = query_key!["postVotes", 1];
//! assert_eq!(key.serialized(), r#"["postVotes",1]"#);
//! assert_eq!(key, query_key!["postVotes", 1]);
//! assert_ne!(key, query_key![1, "postVotes"]);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum KeySegment {
    /// A string segment, typically the resource name.
    Str(String),
    /// A signed integer segment.
    Int(i64),
    /// An unsigned integer segment.
    UInt(u64),
    /// A boolean segment.
    Bool(bool),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i32> for KeySegment {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for KeySegment {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<bool> for KeySegment {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An ordered sequence of segments identifying a cached resource.
///
/// The canonical serialization is computed once at construction; keys are
/// immutable afterwards. Equality and hashing follow the serialization.
///
/// Use [`query_key!`](crate::query_key) to build keys with mixed segment
/// types, or [`QueryKey::new`] when all segments share one type.
#[derive(Debug, Clone)]
pub struct QueryKey {
    segments: Vec<KeySegment>,
    serialized: String,
}

impl QueryKey {
    /// Creates a key from segments of a single convertible type.
    ///
    /// # Example
    ///
    /// ```
    /// use refetch::key::QueryKey;
    ///
    /// let key = QueryKey::new(["post", "1"]);
    /// assert_eq!(key.serialized(), r#"["post","1"]"#);
    /// ```
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<KeySegment>,
    {
        Self::from_segments(segments.into_iter().map(Into::into).collect())
    }

    /// Creates a key from already-built segments.
    #[must_use]
    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        let serialized =
            serde_json::to_string(&segments).expect("plain key segments always encode to JSON");
        Self {
            segments,
            serialized,
        }
    }

    /// The segments this key was built from, in order.
    #[must_use]
    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// The canonical serialization used for cache addressing.
    #[must_use]
    pub fn serialized(&self) -> &str {
        &self.serialized
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialized == other.serialized
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialized.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

/// Builds a [`QueryKey`] from mixed-type segments.
///
/// # Example
///
/// ```
/// use refetch::query_key;
///
/// let key = query_key!["postVotes", 1, true];
/// assert_eq!(key.serialized(), r#"["postVotes",1,true]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($segment:expr),+ $(,)?) => {
        $crate::key::QueryKey::from_segments(
            vec![$($crate::key::KeySegment::from($segment)),+],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_segments_same_order_are_equal() {
        let a = query_key!["postVotes", 1];
        let b = query_key!["postVotes", 1];
        assert_eq!(a, b);
        assert_eq!(a.serialized(), b.serialized());
    }

    #[test]
    fn test_order_matters() {
        let a = query_key!["postVotes", 1];
        let b = query_key![1, "postVotes"];
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_elements_never_collide() {
        assert_ne!(query_key!["post", 1], query_key!["post", 2]);
        assert_ne!(query_key!["post"], query_key!["posts"]);
        assert_ne!(query_key!["post", 1], query_key!["post", 1, 2]);
    }

    #[test]
    fn test_owned_and_borrowed_strings_are_equivalent() {
        let a = query_key!["user".to_string(), 7_u64];
        let b = query_key!["user", 7_u64];
        assert_eq!(a, b);
    }

    #[test]
    fn test_serialization_shape() {
        let key = query_key!["postVotes", 1, true];
        assert_eq!(key.serialized(), r#"["postVotes",1,true]"#);
        assert_eq!(key.to_string(), key.serialized());
    }

    #[test]
    fn test_string_and_number_segments_stay_distinct() {
        assert_ne!(query_key!["post", "1"], query_key!["post", 1]);
    }

    #[test]
    fn test_new_from_uniform_iterator() {
        let key = QueryKey::new(["a", "b"]);
        assert_eq!(key.segments().len(), 2);
        assert_eq!(key, query_key!["a", "b"]);
    }

    #[test]
    fn test_single_segment_key() {
        let key = query_key!["session"];
        assert_eq!(key.serialized(), r#"["session"]"#);
    }
}
