//! What the resolver decided for one resolvent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::universe::{Mask, PackageId, UniverseQuery};

/// Where a [`Decision::ChangesToMake`] installs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub repository: String,
    /// Installed ids that go away once this is installed: same slot or
    /// same version.
    pub replacing: Vec<PackageId>,
}

/// A candidate that was rejected, with the constraints it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsuitableCandidate {
    pub package_id: PackageId,
    /// Display form, kept so a persisted decision reads without the universe.
    pub cpv: String,
    pub unmet_constraints: Vec<Constraint>,
    /// Masks on the candidate, if it was only rejected for being masked.
    pub masks: Vec<Mask>,
}

/// The outcome for one resolvent. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Install `origin_id`.
    ChangesToMake {
        origin_id: PackageId,
        /// `origin_id` is the best version in the slot.
        best: bool,
        taken: bool,
        destination: Option<Destination>,
    },
    /// Keep what is installed.
    ExistingNoChange {
        existing_id: PackageId,
        is_same: bool,
        is_same_version: bool,
        is_transient: bool,
        taken: bool,
    },
    /// Nothing is installed and nothing needs to be.
    NothingNoChange { taken: bool },
    /// Uninstall these ids.
    Remove { ids: Vec<PackageId>, taken: bool },
    /// Keep `existing_id` even though it fails `broken`.
    Break {
        existing_id: PackageId,
        broken: Vec<Constraint>,
        taken: bool,
    },
    /// No candidate works.
    UnableToMake {
        unsuitable_candidates: Vec<UnsuitableCandidate>,
        taken: bool,
    },
}

impl Decision {
    pub fn taken(&self) -> bool {
        match self {
            Decision::ChangesToMake { taken, .. }
            | Decision::ExistingNoChange { taken, .. }
            | Decision::NothingNoChange { taken }
            | Decision::Remove { taken, .. }
            | Decision::Break { taken, .. }
            | Decision::UnableToMake { taken, .. } => *taken,
        }
    }

    /// The id that ends up in place, if any.
    pub fn chosen_id(&self) -> Option<PackageId> {
        match self {
            Decision::ChangesToMake { origin_id, .. } => Some(*origin_id),
            Decision::ExistingNoChange { existing_id, .. } | Decision::Break { existing_id, .. } => {
                Some(*existing_id)
            }
            Decision::NothingNoChange { .. }
            | Decision::Remove { .. }
            | Decision::UnableToMake { .. } => None,
        }
    }

    /// The id whose dependencies must be followed.
    pub fn dependencies_of(&self) -> Option<PackageId> {
        match self {
            Decision::ChangesToMake {
                origin_id,
                taken: true,
                ..
            } => Some(*origin_id),
            Decision::ExistingNoChange {
                existing_id,
                taken: true,
                ..
            } => Some(*existing_id),
            _ => None,
        }
    }

    /// Whether this decision produces a job.
    pub fn is_actionable(&self) -> bool {
        match self {
            Decision::ChangesToMake { taken, .. } | Decision::Remove { taken, .. } => *taken,
            _ => false,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Decision::UnableToMake { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Decision::ChangesToMake { .. } => "changes_to_make",
            Decision::ExistingNoChange { .. } => "existing_no_change",
            Decision::NothingNoChange { .. } => "nothing_no_change",
            Decision::Remove { .. } => "remove",
            Decision::Break { .. } => "break",
            Decision::UnableToMake { .. } => "unable_to_make",
        }
    }

    /// Like the [`Display`](fmt::Display) form, with ids written as the
    /// cpvs they stand for.
    pub fn describe(&self, universe: &dyn UniverseQuery) -> String {
        let cpv = |id: &PackageId| {
            universe
                .package(*id)
                .map(|entry| entry.to_string())
                .unwrap_or_else(|_| id.to_string())
        };
        match self {
            Decision::ChangesToMake {
                origin_id, best, ..
            } => {
                let suffix = if *best { "" } else { " (not best)" };
                format!("install {}{suffix}", cpv(origin_id))
            }
            Decision::ExistingNoChange { existing_id, .. } => format!("keep {}", cpv(existing_id)),
            Decision::Remove { ids, .. } => {
                let ids: Vec<String> = ids.iter().map(cpv).collect();
                format!("remove {}", ids.join(", "))
            }
            Decision::Break {
                existing_id,
                broken,
                ..
            } => format!("break {} ({} unmet)", cpv(existing_id), broken.len()),
            Decision::NothingNoChange { .. } | Decision::UnableToMake { .. } => self.to_string(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::ChangesToMake {
                origin_id, best, ..
            } => {
                write!(f, "install {origin_id}")?;
                if !best {
                    f.write_str(" (not best)")?;
                }
                Ok(())
            }
            Decision::ExistingNoChange { existing_id, .. } => write!(f, "keep {existing_id}"),
            Decision::NothingNoChange { .. } => f.write_str("nothing"),
            Decision::Remove { ids, .. } => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "remove {}", ids.join(", "))
            }
            Decision::Break {
                existing_id,
                broken,
                ..
            } => write!(f, "break {existing_id} ({} unmet)", broken.len()),
            Decision::UnableToMake {
                unsuitable_candidates,
                ..
            } => write!(
                f,
                "unable to make ({} unsuitable candidates)",
                unsuitable_candidates.len()
            ),
        }
    }
}
