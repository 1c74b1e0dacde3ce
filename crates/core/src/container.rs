//! Ordered key/value container with selectable key comparison.
//!
//! [`CaseFoldingMap`] keeps entries in first-insertion order. In
//! case-insensitive mode keys compare ignoring case, but iteration and
//! serialization still yield the spelling used when the key was first
//! inserted.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How a [`CaseFoldingMap`] compares keys. Fixed for the map's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyComparison {
    /// Keys must match exactly.
    #[default]
    CaseSensitive,
    /// Keys match ignoring case.
    CaseInsensitive,
}

impl KeyComparison {
    /// Canonical form of `key` under this mode. Two keys are equal exactly
    /// when their folded forms are.
    pub fn fold(self, key: &str) -> Cow<'_, str> {
        match self {
            Self::CaseSensitive => Cow::Borrowed(key),
            Self::CaseInsensitive => Cow::Owned(key.to_lowercase()),
        }
    }

    /// Compare two keys under this mode.
    pub fn keys_equal(self, a: &str, b: &str) -> bool {
        self.fold(a) == self.fold(b)
    }
}

/// Insertion-ordered map whose key comparison is case-sensitive or
/// case-insensitive, chosen at construction.
#[derive(Clone)]
pub struct CaseFoldingMap<V> {
    comparison: KeyComparison,
    /// Folded key -> (first spelling, value).
    entries: IndexMap<String, (String, V)>,
}

impl<V> CaseFoldingMap<V> {
    /// Create an empty map with the given comparison mode.
    pub fn new(comparison: KeyComparison) -> Self {
        Self {
            comparison,
            entries: IndexMap::new(),
        }
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(comparison: KeyComparison, capacity: usize) -> Self {
        Self {
            comparison,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    pub fn case_sensitive() -> Self {
        Self::new(KeyComparison::CaseSensitive)
    }

    pub fn case_insensitive() -> Self {
        Self::new(KeyComparison::CaseInsensitive)
    }

    pub fn comparison(&self) -> KeyComparison {
        self.comparison
    }

    /// Insert or replace a value.
    ///
    /// Replacing keeps the key spelling of the first insertion and returns
    /// the previous value.
    pub fn put(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        let folded = self.comparison.fold(&name).into_owned();
        match self.entries.get_mut(&folded) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.insert(folded, (name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries
            .get(self.comparison.fold(name).as_ref())
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        let folded = self.comparison.fold(name).into_owned();
        self.entries.get_mut(&folded).map(|(_, v)| v)
    }

    /// Return the stored spelling of `name`, if present.
    pub fn stored_key(&self, name: &str) -> Option<&str> {
        self.entries
            .get(self.comparison.fold(name).as_ref())
            .map(|(k, _)| k.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(self.comparison.fold(name).as_ref())
    }

    /// Return the value for `name`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, name: &str, default: impl FnOnce() -> V) -> &mut V {
        let folded = self.comparison.fold(name).into_owned();
        &mut self
            .entries
            .entry(folded)
            .or_insert_with(|| (name.to_string(), default()))
            .1
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries
            .shift_remove(self.comparison.fold(name).as_ref())
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, value)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|(_, v)| v)
    }

    /// Copy this map into a fresh one with a different comparison mode.
    ///
    /// Keys that collide under the new mode collapse into the first
    /// spelling; the last value wins.
    pub fn with_comparison(self, comparison: KeyComparison) -> Self {
        let mut out = Self::with_capacity(comparison, self.entries.len());
        for (k, v) in self.entries.into_values() {
            out.put(k, v);
        }
        out
    }
}

impl<V> Default for CaseFoldingMap<V> {
    fn default() -> Self {
        Self::case_sensitive()
    }
}

impl<V: fmt::Debug> fmt::Debug for CaseFoldingMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Maps are equal when they hold the same entries in the same order under
/// the same comparison mode.
impl<V: PartialEq> PartialEq for CaseFoldingMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.comparison == other.comparison && self.iter().eq(other.iter())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for CaseFoldingMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::case_sensitive();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V> Extend<(K, V)> for CaseFoldingMap<V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<V> IntoIterator for CaseFoldingMap<V> {
    type Item = (String, V);
    type IntoIter = indexmap::map::IntoValues<String, (String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<V: Serialize> Serialize for CaseFoldingMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Deserializes into a case-sensitive map in document order.
impl<'de, V: Deserialize<'de>> Deserialize<'de> for CaseFoldingMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for MapVisitor<V> {
            type Value = CaseFoldingMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map =
                    CaseFoldingMap::with_capacity(KeyComparison::CaseSensitive, access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    map.put(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}
