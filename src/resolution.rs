//! Per-resolvent bookkeeping owned by the decider.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::{Constraint, Constraints, UseExisting};
use crate::decision::Decision;
use crate::resolvent::Resolvent;
use crate::universe::PackageEntry;

/// Where a resolution is in the decide loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
    Unvisited,
    Considering,
    Decided,
}

/// Constraints and the current decision for one resolvent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolvent: Resolvent,
    pub constraints: Constraints,
    pub decision: Option<Decision>,
    pub state: VisitState,
}

impl Resolution {
    pub fn new(resolvent: Resolvent) -> Self {
        Self {
            resolvent,
            constraints: Constraints::new(),
            decision: None,
            state: VisitState::Unvisited,
        }
    }

    /// Whether `decision` is acceptable to `constraint`.
    ///
    /// A chosen id must match package constraints and avoid blocks. No
    /// chosen id is only fine when the constraint says so, or when a block
    /// is answered by removing what it blocks. The
    /// use-existing rule applies to kept packages, and a taken constraint
    /// needs a taken decision.
    pub fn check(
        constraint: &Constraint,
        decision: &Decision,
        chosen: Option<&PackageEntry>,
    ) -> bool {
        match chosen {
            Some(entry) if !constraint.accepts(entry) => return false,
            Some(_) => {}
            None if constraint.spec.is_block() && matches!(decision, Decision::Remove { .. }) => {}
            None if !constraint.nothing_is_fine_too => return false,
            None => {}
        }

        if let Decision::ExistingNoChange {
            is_same,
            is_same_version,
            is_transient,
            ..
        } = decision
        {
            let ok = match constraint.use_existing {
                UseExisting::IfPossible => true,
                UseExisting::IfTransient => *is_transient,
                UseExisting::IfSame => *is_same,
                UseExisting::IfSameVersion => *is_same_version,
                UseExisting::Never => false,
            };
            if !ok {
                return false;
            }
        }

        constraint.untaken || decision.taken()
    }
}

/// One recorded change of decision, kept for non-convergence reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub iteration: usize,
    pub resolvent: Resolvent,
    pub from: Option<String>,
    pub to: String,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} -> {}",
            self.iteration,
            self.resolvent,
            self.from.as_deref().unwrap_or("undecided"),
            self.to
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintOrigin, ConstraintSpec, Reason};
    use crate::repository::InMemoryRepository;
    use crate::universe::{
        InstalledSet, PackageId, PackageMetadata, Universe, UniverseQuery, UseConfig,
    };
    use portage_atom::{Cpv, Dep};

    fn constraint(spec: &str, use_existing: UseExisting) -> Constraint {
        Constraint {
            spec: ConstraintSpec::Package(Dep::parse(spec).unwrap()),
            use_requirements: Vec::new(),
            origin: ConstraintOrigin::Target,
            mandatory: true,
            untaken: false,
            nothing_is_fine_too: false,
            use_existing,
            reason: Reason::Target,
        }
    }

    fn keep(is_same: bool, taken: bool) -> Decision {
        Decision::ExistingNoChange {
            existing_id: PackageId(0),
            is_same,
            is_same_version: true,
            is_transient: false,
            taken,
        }
    }

    #[test]
    fn check_applies_use_existing_to_kept_packages() {
        let mut installed = InstalledSet::new();
        installed.add_favored(PackageMetadata::new(Cpv::parse("app-misc/foo-1.0").unwrap()));
        let universe =
            Universe::with_installed(&InMemoryRepository::new(), &UseConfig::default(), &installed);
        let entry = universe.package(PackageId(0)).unwrap();

        let lenient = constraint("app-misc/foo", UseExisting::IfPossible);
        let strict = constraint("app-misc/foo", UseExisting::IfSame);
        assert!(Resolution::check(&lenient, &keep(false, true), Some(entry)));
        assert!(!Resolution::check(&strict, &keep(false, true), Some(entry)));
        assert!(Resolution::check(&strict, &keep(true, true), Some(entry)));
        assert!(!Resolution::check(&lenient, &keep(true, false), Some(entry)));
        assert!(!Resolution::check(
            &constraint(">=app-misc/foo-2", UseExisting::IfPossible),
            &keep(true, true),
            Some(entry)
        ));
    }

    #[test]
    fn nothing_needs_permission() {
        let nothing = Decision::NothingNoChange { taken: true };
        let mut c = constraint("app-misc/foo", UseExisting::IfPossible);
        assert!(!Resolution::check(&c, &nothing, None));
        c.nothing_is_fine_too = true;
        assert!(Resolution::check(&c, &nothing, None));
    }
}
