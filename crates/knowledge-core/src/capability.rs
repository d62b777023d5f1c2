//! Capabilities: the atomic unit of permission.
//!
//! A user holds a [`CapabilitySet`] per document. The set is a small bit set
//! so it can be stored as a single integer column and compared cheaply.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, ValidationError};

/// One of the four document capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Share,
    Delete,
}

impl Capability {
    /// All capabilities, in bit order.
    pub const ALL: [Capability; 4] = [
        Capability::Read,
        Capability::Write,
        Capability::Share,
        Capability::Delete,
    ];

    /// The wire name of this capability.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Share => "share",
            Capability::Delete => "delete",
        }
    }

    const fn bit(&self) -> u8 {
        match self {
            Capability::Read => 0b0001,
            Capability::Write => 0b0010,
            Capability::Share => 0b0100,
            Capability::Delete => 0b1000,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names are matched ignoring surrounding whitespace and ASCII case.
impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Capability::Read),
            "write" => Ok(Capability::Write),
            "share" => Ok(Capability::Share),
            "delete" => Ok(Capability::Delete),
            other => Err(CoreError::UnknownCapability(other.to_string())),
        }
    }
}

/// A set of capabilities held by one user on one document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Capability>", from = "Vec<Capability>")]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    const MASK: u8 = 0b1111;

    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Every capability: what an owner receives at upload.
    pub const FULL: Self = Self(Self::MASK);

    pub const fn empty() -> Self {
        Self::EMPTY
    }

    pub const fn full() -> Self {
        Self::FULL
    }

    /// A set holding exactly one capability.
    pub const fn only(cap: Capability) -> Self {
        Self(cap.bit())
    }

    /// Parse capability names, rejecting unknown names and empty input.
    pub fn parse<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::EMPTY;
        let mut seen_any = false;
        for name in names {
            seen_any = true;
            let cap = name.as_ref().parse::<Capability>()?;
            set.insert(cap);
        }

        if !seen_any {
            return Err(ValidationError::EmptyCapabilities);
        }
        Ok(set)
    }

    /// Raw bit representation (for storage).
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Rebuild from raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn remove(&mut self, cap: Capability) {
        self.0 &= !cap.bit();
    }

    pub const fn union(&self, other: CapabilitySet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(&self, other: CapabilitySet) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(&self, other: CapabilitySet) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn is_subset(&self, other: CapabilitySet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterate the held capabilities in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    /// Capability names in canonical order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|c| c.as_str()).collect()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.names().join(","))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl From<Capability> for CapabilitySet {
    fn from(cap: Capability) -> Self {
        Self::only(cap)
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}
