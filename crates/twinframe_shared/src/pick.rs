//! # Pick Items and Pick Lists
//!
//! A pick is the result of a spatial query: which rendered items sit under
//! the pointer. Items are opaque 64-bit identifiers minted by the engine.
//! They cross the module boundary as two little-endian `u32` words and
//! cross the context boundary as plain numbers. Decoding also takes the
//! display form (`"e7"`) so text copied off the pick board reads back.

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of one pickable item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PickItem(u64);

impl PickItem {
    /// Wraps raw item bits.
    #[inline]
    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw item bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Splits the item into `[lo, hi]` words for module memory.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_words(self) -> [u32; 2] {
        [self.0 as u32, (self.0 >> 32) as u32]
    }

    /// Joins `[lo, hi]` words read from module memory.
    #[inline]
    #[must_use]
    pub const fn from_words(lo: u32, hi: u32) -> Self {
        Self(((hi as u64) << 32) | lo as u64)
    }
}

impl fmt::Display for PickItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl FromStr for PickItem {
    type Err = std::num::ParseIntError;

    /// Accepts both the display form (`e7`) and bare decimal (`7`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('e').unwrap_or(s);
        digits.parse::<u64>().map(Self)
    }
}

impl<'de> Deserialize<'de> for PickItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PickItemVisitor)
    }
}

struct PickItemVisitor;

impl Visitor<'_> for PickItemVisitor {
    type Value = PickItem;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a string like \"e7\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PickItem, E> {
        Ok(PickItem(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PickItem, E> {
        u64::try_from(v)
            .map(PickItem)
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PickItem, E> {
        v.parse().map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

/// Ordered list of pick items. Empty means "no pick".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PickList(Vec<PickItem>);

impl PickList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns true when nothing is picked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of picked items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The item a pointer-down interacts with.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<PickItem> {
        self.0.first().copied()
    }

    /// Returns the items as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[PickItem] {
        &self.0
    }

    /// Iterates over the items in pick order.
    pub fn iter(&self) -> impl Iterator<Item = PickItem> + '_ {
        self.0.iter().copied()
    }

    /// Drops every item.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Rebuilds a list from `[lo, hi]` word pairs. A trailing odd word is
    /// ignored.
    #[must_use]
    pub fn from_words(words: &[u32]) -> Self {
        words
            .chunks_exact(2)
            .map(|pair| PickItem::from_words(pair[0], pair[1]))
            .collect()
    }

    /// Flattens the list into `[lo, hi]` word pairs.
    #[must_use]
    pub fn to_words(&self) -> Vec<u32> {
        self.0.iter().flat_map(|item| item.to_words()).collect()
    }
}

impl From<Vec<PickItem>> for PickList {
    fn from(items: Vec<PickItem>) -> Self {
        Self(items)
    }
}

impl FromIterator<PickItem> for PickList {
    fn from_iter<I: IntoIterator<Item = PickItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Comma separated, the way the page shows it.
impl fmt::Display for PickList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}
