//! What is being resolved.
//!
//! A [`Resolvent`] names one resolution unit: a qualified package name, the
//! slot it occupies, and where the result is going. Two packages in
//! different slots (e.g. `dev-lang/python:3.11` and `dev-lang/python:3.12`)
//! are resolved independently.

use std::fmt;

use portage_atom::Cpn;
use serde::{Deserialize, Serialize};

use crate::universe::PackageMetadata;

/// Unversioned `category/package` name.
///
/// Stored in its string form so resolvents order, hash and serialise
/// without depending on the atom parser.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Wrap an already-formatted `category/package` string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Cpn> for QualifiedName {
    fn from(cpn: &Cpn) -> Self {
        Self(cpn.to_string())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Slot component of a resolvent.
///
/// `Unknown` is used for specs that match nothing at all, so the failure
/// still has somewhere to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Known(String),
    Unknown,
}

impl SlotName {
    /// Slot of a concrete package; packages without a slot live in `0`.
    pub fn of(meta: &PackageMetadata) -> Self {
        SlotName::Known(meta.slot.clone().unwrap_or_else(|| "0".into()))
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            SlotName::Known(s) => Some(s),
            SlotName::Unknown => None,
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotName::Known(s) => f.write_str(s),
            SlotName::Unknown => f.write_str("(unknown)"),
        }
    }
}

/// Where a resolved package ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    /// Merged into the live root filesystem.
    InstallToRoot,
    /// Built into a binary package, nothing is merged.
    CreateBinary,
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationType::InstallToRoot => f.write_str("/"),
            DestinationType::CreateBinary => f.write_str("binary"),
        }
    }
}

/// A `(package, slot, destination)` resolution unit.
///
/// Field order matters: the derived ordering sorts by package, then slot,
/// then destination, which is the deterministic iteration order of the
/// resolution table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resolvent {
    pub package: QualifiedName,
    pub slot: SlotName,
    pub destination: DestinationType,
}

impl Resolvent {
    pub fn new(package: QualifiedName, slot: SlotName, destination: DestinationType) -> Self {
        Self {
            package,
            slot,
            destination,
        }
    }

    /// Resolvent occupied by a concrete package.
    pub fn for_package(meta: &PackageMetadata, destination: DestinationType) -> Self {
        Self::new(
            QualifiedName::from(&meta.cpv.cpn),
            SlotName::of(meta),
            destination,
        )
    }

    /// Slot filter to use when querying candidates for this resolvent.
    pub fn slot_filter(&self) -> SlotFilter {
        match &self.slot {
            SlotName::Known(s) => SlotFilter::Exact(s.clone()),
            SlotName::Unknown => SlotFilter::Any,
        }
    }
}

impl fmt::Display for Resolvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.package, self.slot, self.destination)
    }
}

/// Slot restriction for a universe query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotFilter {
    Any,
    Exact(String),
}

impl SlotFilter {
    pub fn accepts(&self, meta: &PackageMetadata) -> bool {
        match self {
            SlotFilter::Any => true,
            SlotFilter::Exact(slot) => meta.slot.as_deref().unwrap_or("0") == slot,
        }
    }
}
