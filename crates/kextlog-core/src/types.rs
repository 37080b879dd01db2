//! Core types
//!
//! Pure data: levels, record flags and observer unit identifiers.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Caller-supplied severity tag.
///
/// Opaque to the transport: any value is carried to the observer unchanged.
/// The associated constants are the values the bundled macros use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Level(pub u32);

impl Level {
    pub const TRACE: Level = Level(0);
    pub const DEBUG: Level = Level(1);
    pub const INFO: Level = Level(2);
    pub const WARN: Level = Level(3);
    pub const ERROR: Level = Level(4);

    /// Raw wire value
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Name of a well-known level
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("TRACE"),
            1 => Some("DEBUG"),
            2 => Some("INFO"),
            3 => Some("WARN"),
            4 => Some("ERROR"),
            _ => None,
        }
    }
}

impl From<u32> for Level {
    fn from(v: u32) -> Self {
        Level(v)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "LEVEL({})", self.0),
        }
    }
}

/// Record flag bitset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordFlags(u32);

impl RecordFlags {
    /// Text was cut short to fit the available buffer
    pub const TRUNCATED: RecordFlags = RecordFlags(0x1);
    /// A previous record failed to reach the observer
    pub const DROPPED: RecordFlags = RecordFlags(0x2);

    /// No flags set
    pub const fn empty() -> Self {
        RecordFlags(0)
    }

    /// Build from raw bits; unknown bits are kept
    pub const fn from_bits(bits: u32) -> Self {
        RecordFlags(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: RecordFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RecordFlags) {
        self.0 |= other.0;
    }

    pub const fn union(self, other: RecordFlags) -> Self {
        RecordFlags(self.0 | other.0)
    }
}

impl core::ops::BitOr for RecordFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Observer unit identifier. 0 means "no observer attached".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitId(pub u32);

impl UnitId {
    /// Reserved "nobody attached" value
    pub const NONE: UnitId = UnitId(0);

    pub fn is_attached(self) -> bool {
        self.0 != 0
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
