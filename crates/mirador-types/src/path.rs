//! Keys and paths addressing nodes of the state tree.
//!
//! A [`Path`] is the ordered sequence of [`Key`]s traversed from the tree
//! root to a node. Keys are either field names or integer indices. A field
//! name spelled as a canonical non-negative integer (`"3"`, never `"03"`)
//! is normalised to the index form, so `"3"` and `3` address the same
//! child no matter how the caller built the path.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One step of a [`Path`].
///
/// Serialized as a JSON number for indices and a JSON string for fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// A non-negative integer key (array index, scoreboard id, sequence).
    Index(u64),
    /// A named field.
    Field(String),
}

impl Key {
    /// Build a key from a field name, normalising integer spellings.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        match canonical_index(&name) {
            Some(index) => Self::Index(index),
            None => Self::Field(name),
        }
    }

    /// Return the index value if this is an index key.
    pub const fn as_index(&self) -> Option<u64> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Field(_) => None,
        }
    }

    /// Render the key the way it appears as a JSON object member name.
    pub fn to_member_name(&self) -> String {
        self.to_string()
    }
}

/// Parse `s` as a canonical decimal `u64` (no sign, no leading zeros).
fn canonical_index(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    let first = *bytes.first()?;
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if first == b'0' && bytes.len() > 1 {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Field(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::field(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Self::field(name.as_str())
    }
}

impl From<u64> for Key {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Self::Index(u64::from(index))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Index(index) => serializer.serialize_u64(*index),
            Self::Field(name) => serializer.serialize_str(name),
        }
    }
}

struct KeyVisitor;

impl Visitor<'_> for KeyVisitor {
    type Value = Key;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string field name or a non-negative integer index")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Key, E> {
        Ok(Key::Index(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Key, E> {
        u64::try_from(v)
            .map(Key::Index)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
        Ok(Key::field(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Key, E> {
        Ok(Key::field(v))
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Ordered sequence of keys from the tree root to a node.
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Key>);

impl Path {
    /// The empty path, addressing the root.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Return a new path with `key` appended.
    #[must_use]
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut keys = Vec::with_capacity(self.0.len().saturating_add(1));
        keys.extend(self.0.iter().cloned());
        keys.push(key.into());
        Self(keys)
    }

    /// Return a new path with every key of `suffix` appended.
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        let mut keys = self.0.clone();
        keys.extend(suffix.0.iter().cloned());
        Self(keys)
    }

    /// Append `key` in place.
    pub fn push(&mut self, key: impl Into<Key>) {
        self.0.push(key.into());
    }

    /// Number of keys in the path.
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The keys in traversal order.
    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    /// Split into the parent keys and the final key.
    pub fn split_last(&self) -> Option<(&Key, &[Key])> {
        self.0.split_last()
    }

    /// The final key, if any.
    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl From<Vec<Key>> for Path {
    fn from(keys: Vec<Key>) -> Self {
        Self(keys)
    }
}

impl From<&[Key]> for Path {
    fn from(keys: &[Key]) -> Self {
        Self(keys.to_vec())
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Key;
    type IntoIter = core::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Path`] from a list of key expressions.
///
/// ```
/// use mirador_types::{path, Key};
///
/// let p = path!["server", "game", "players", 7_u64];
/// assert_eq!(p.len(), 4);
/// assert_eq!(p.last(), Some(&Key::Index(7)));
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($key:expr),+ $(,)?) => {
        $crate::Path::from(vec![$($crate::Key::from($key)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_field_names_normalise_to_index() {
        assert_eq!(Key::from("3"), Key::Index(3));
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("03"), Key::Field(String::from("03")));
        assert_eq!(Key::from("-1"), Key::Field(String::from("-1")));
        assert_eq!(Key::from(""), Key::Field(String::new()));
        assert_eq!(Key::from("18446744073709551616"), Key::Field(String::from("18446744073709551616")));
    }

    #[test]
    fn key_serializes_as_string_or_number() {
        let json = serde_json::to_string(&path!["a", 2_u64, "b"]).unwrap();
        assert_eq!(json, r#"["a",2,"b"]"#);
    }

    #[test]
    fn key_deserializes_numeric_strings_as_indices() {
        let p: Path = serde_json::from_str(r#"["scores","12",12]"#).unwrap();
        assert_eq!(p.keys().get(1), Some(&Key::Index(12)));
        assert_eq!(p.keys().get(1), p.keys().get(2));
    }

    #[test]
    fn negative_index_is_rejected() {
        let result: Result<Path, _> = serde_json::from_str("[-4]");
        assert!(result.is_err());
    }

    #[test]
    fn child_and_join_accumulate_in_order() {
        let base = path!["server", "game"];
        let deep = base.child("players").child("abc");
        assert_eq!(deep, path!["server", "game", "players", "abc"]);
        assert_eq!(base.join(&path!["tps"]), path!["server", "game", "tps"]);
        assert!(deep.starts_with(&base));
        assert!(!base.starts_with(&deep));
    }

    #[test]
    fn display_is_dotted() {
        assert_eq!(path!["a", 1_u64, "b"].to_string(), "a.1.b");
        assert_eq!(Path::root().to_string(), "<root>");
    }
}
