//! Engine instance handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one engine instance inside a foreign module.
///
/// Zero is the "not yet created" sentinel. A handle is only meaningful to
/// the module (and the coordinator) that created it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineHandle(u64);

impl EngineHandle {
    /// The sentinel for "no instance".
    pub const NONE: Self = Self(0);

    /// Wraps a raw handle returned by the module.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value passed back into the module.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true for the zero sentinel.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
