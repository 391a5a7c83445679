//! Host-side values the module can hold by heap slot.

use std::fmt;
use std::sync::Arc;

use twinframe_shared::{OffscreenSurface, PickItem, PickList};

use crate::closure::ClosureRef;

/// A host object referenced from module code.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    /// Absent value. Also what every freed or unknown slot reads as.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Double precision number.
    Number(f64),
    /// Unsigned 64-bit integer.
    BigInt(u64),
    /// Owned text.
    String(String),
    /// Ordered list of values.
    Array(Vec<HostValue>),
    /// A transferred rendering surface.
    Surface(Arc<OffscreenSurface>),
    /// A wrapped module closure.
    Function(ClosureRef),
    /// A captured error.
    Error(String),
}

impl HostValue {
    /// `undefined` or `null`.
    #[inline]
    #[must_use]
    pub const fn is_like_none(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Converts to `u64` the way a BigInt constructor would: integral
    /// non-negative numbers and decimal strings are accepted.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn to_u64(&self) -> Option<u64> {
        const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
        match self {
            Self::BigInt(v) => Some(*v),
            Self::Number(n) if n.fract() == 0.0 && (0.0..=MAX_SAFE).contains(n) => Some(*n as u64),
            Self::String(s) => s.trim().parse().ok(),
            Self::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    /// The closure behind a function value.
    #[must_use]
    pub const fn as_function(&self) -> Option<&ClosureRef> {
        match self {
            Self::Function(closure) => Some(closure),
            _ => None,
        }
    }

    /// Builds an array of BigInts from a pick list.
    #[must_use]
    pub fn from_pick_list(list: &PickList) -> Self {
        Self::Array(list.iter().map(|item| Self::BigInt(item.bits())).collect())
    }

    /// Reads a pick list out of an array, skipping entries that do not
    /// convert to `u64`. Non-arrays yield an empty list.
    #[must_use]
    pub fn to_pick_list(&self) -> PickList {
        match self {
            Self::Array(values) => values
                .iter()
                .filter_map(Self::to_u64)
                .map(PickItem::new)
                .collect(),
            _ => PickList::new(),
        }
    }

    /// Debug rendering used by the `debug_string` import.
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::BigInt(v) => write!(f, "{v}n"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Surface(surface) => write!(f, "OffscreenSurface({})", surface.id()),
            Self::Function(_) => f.write_str("Function"),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let value = HostValue::Array(vec![
            HostValue::Number(1.5),
            HostValue::from("hi"),
            HostValue::Null,
            HostValue::BigInt(7),
        ]);
        assert_eq!(value.describe(), r#"[1.5, "hi", null, 7n]"#);
        assert_eq!(HostValue::Error("boom".into()).describe(), "Error: boom");
        assert_eq!(
            HostValue::Surface(Arc::new(OffscreenSurface::new(3, 1, 1))).describe(),
            "OffscreenSurface(3)"
        );
    }

    #[test]
    fn test_display_nests_arrays() {
        let value = HostValue::Array(vec![
            HostValue::Array(vec![HostValue::Bool(true), HostValue::Undefined]),
            HostValue::from("a\"b"),
        ]);
        assert_eq!(value.to_string(), r#"[[true, undefined], "a\"b"]"#);
        assert_eq!(format!("{}", HostValue::Array(Vec::new())), "[]");
    }

    #[test]
    fn test_to_u64_accepts_bigint_like() {
        assert_eq!(HostValue::BigInt(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(HostValue::Number(7.0).to_u64(), Some(7));
        assert_eq!(HostValue::from("12").to_u64(), Some(12));
        assert_eq!(HostValue::Number(1.5).to_u64(), None);
        assert_eq!(HostValue::Number(-1.0).to_u64(), None);
        assert_eq!(HostValue::from("e7").to_u64(), None);
        assert_eq!(HostValue::Undefined.to_u64(), None);
    }

    #[test]
    fn test_pick_list_skips_invalid() {
        let value = HostValue::Array(vec![
            HostValue::BigInt(7),
            HostValue::from("nope"),
            HostValue::Number(12.0),
        ]);
        let list = value.to_pick_list();
        assert_eq!(list.to_string(), "e7,e12");

        let back = HostValue::from_pick_list(&list);
        assert_eq!(back, HostValue::Array(vec![HostValue::BigInt(7), HostValue::BigInt(12)]));
    }
}
