//! Pluggable choices the decider delegates.
//!
//! [`ChoicePolicy`] picks a version for one resolvent out of its
//! [`Candidates`]. [`ResolverPolicy`] answers the questions that shape
//! the constraints themselves: how eagerly installed packages are kept,
//! which optional dependencies are followed, and what may be removed.
//! The defaults are driven by [`ResolverConfig`].

use std::collections::HashSet;

use portage_atom::Dep;
use tracing::warn;

use crate::config::ResolverConfig;
use crate::constraint::{Constraints, Reason, UseExisting};
use crate::decision::Decision;
use crate::resolvent::{DestinationType, QualifiedName, Resolvent};
use crate::spec_tree::DepLabel;
use crate::universe::{InstalledPolicy, PackageEntry, PackageId};

/// Everything a resolvent could be decided as.
#[derive(Debug, Default)]
pub struct Candidates<'u> {
    /// Unmasked repository versions, best first.
    pub installable: Vec<(PackageId, &'u PackageEntry)>,
    /// Masked repository versions, best first.
    pub masked: Vec<(PackageId, &'u PackageEntry)>,
    /// Installed versions in the resolvent's slot.
    pub installed: Vec<(PackageId, &'u PackageEntry)>,
}

impl<'u> Candidates<'u> {
    /// Split query results. Installed versions only count for resolvents
    /// that install to the live root.
    pub fn split(
        resolvent: &Resolvent,
        entries: impl IntoIterator<Item = (PackageId, &'u PackageEntry)>,
    ) -> Self {
        let mut candidates = Self::default();
        for (id, entry) in entries {
            if entry.is_installed() {
                if resolvent.destination == DestinationType::InstallToRoot {
                    candidates.installed.push((id, entry));
                }
            } else if entry.meta.is_masked() {
                candidates.masked.push((id, entry));
            } else {
                candidates.installable.push((id, entry));
            }
        }
        candidates
    }

    pub fn is_empty(&self) -> bool {
        self.installable.is_empty() && self.masked.is_empty() && self.installed.is_empty()
    }
}

/// What a [`ChoicePolicy`] settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Install this repository version.
    Install { id: PackageId, best: bool },
    /// Keep the installed version.
    Keep {
        id: PackageId,
        is_same: bool,
        is_same_version: bool,
        is_transient: bool,
    },
    /// Nothing is needed.
    Nothing,
    /// No candidate is acceptable.
    Fail,
}

/// Picks one candidate for a resolvent.
pub trait ChoicePolicy {
    fn choose(
        &self,
        resolvent: &Resolvent,
        candidates: &Candidates<'_>,
        constraints: &Constraints,
    ) -> Choice;
}

/// Whether any flag both versions declare is set differently.
pub fn options_changed(existing: &PackageEntry, installable: &PackageEntry) -> bool {
    let common: HashSet<&String> = existing
        .meta
        .iuse
        .iter()
        .filter(|flag| installable.meta.iuse.contains(flag))
        .collect();
    common
        .into_iter()
        .any(|flag| existing.flags.contains(flag) != installable.flags.contains(flag))
}

/// Prefers the installed version as far as the strictest use-existing
/// rule allows, then the best installable version.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChoicePolicy;

impl DefaultChoicePolicy {
    /// An installed version must be rebuilt when its options differ from
    /// the version that would replace it.
    pub fn forces_reinstall(&self, existing: &PackageEntry, installable: &PackageEntry) -> bool {
        options_changed(existing, installable)
    }
}

impl ChoicePolicy for DefaultChoicePolicy {
    fn choose(
        &self,
        _resolvent: &Resolvent,
        candidates: &Candidates<'_>,
        constraints: &Constraints,
    ) -> Choice {
        if let Some(&(id, locked)) = candidates
            .installed
            .iter()
            .find(|(_, e)| e.installed == Some(InstalledPolicy::Locked))
        {
            return if constraints.accept(locked) {
                Choice::Keep {
                    id,
                    is_same: true,
                    is_same_version: true,
                    is_transient: locked.meta.transient,
                }
            } else {
                Choice::Fail
            };
        }

        let existing = candidates
            .installed
            .iter()
            .find(|(_, e)| constraints.accept(e));
        let installable = candidates
            .installable
            .iter()
            .enumerate()
            .find(|(_, (_, e))| constraints.accept(e));

        if existing.is_none() && constraints.nothing_is_fine_too() {
            return Choice::Nothing;
        }

        let use_existing = constraints.strictest_use_existing();
        match (existing, installable) {
            (None, None) => Choice::Fail,
            (None, Some((index, &(id, _)))) => Choice::Install {
                id,
                best: index == 0,
            },
            (Some(&(id, entry)), None) => {
                let is_transient = entry.meta.transient;
                let keep = match use_existing {
                    UseExisting::IfPossible => true,
                    UseExisting::IfTransient | UseExisting::IfSame | UseExisting::IfSameVersion => {
                        is_transient
                    }
                    UseExisting::Never => false,
                };
                if keep {
                    Choice::Keep {
                        id,
                        is_same: true,
                        is_same_version: true,
                        is_transient,
                    }
                } else {
                    Choice::Fail
                }
            }
            (Some(&(existing_id, existing)), Some((index, &(installable_id, installable)))) => {
                let is_same_version = existing.meta.cpv.version == installable.meta.cpv.version;
                let is_same = is_same_version && !self.forces_reinstall(existing, installable);
                let keep = match use_existing {
                    UseExisting::Never | UseExisting::IfTransient => false,
                    UseExisting::IfSame => is_same,
                    UseExisting::IfSameVersion => is_same_version,
                    UseExisting::IfPossible => true,
                };
                if keep {
                    Choice::Keep {
                        id: existing_id,
                        is_same,
                        is_same_version,
                        is_transient: existing.meta.transient,
                    }
                } else {
                    Choice::Install {
                        id: installable_id,
                        best: index == 0,
                    }
                }
            }
        }
    }
}

/// Hooks that shape constraints and fallbacks.
pub trait ResolverPolicy {
    /// Use-existing rule for a new constraint.
    fn use_existing_for(&self, resolvent: &Resolvent, dep: &Dep, reason: &Reason) -> UseExisting;

    /// Whether a dependency with these labels is acted upon, or recorded
    /// as an untaken suggestion.
    fn take_dependency(&self, resolvent: &Resolvent, labels: &[DepLabel]) -> bool;

    /// Whether the dependencies of `decision` with these labels matter at
    /// all.
    fn care_about_dependency(&self, decision: &Decision, labels: &[DepLabel]) -> bool;

    fn is_world_member(&self, name: &QualifiedName) -> bool;

    /// Whether an installed package may be uninstalled to satisfy a
    /// blocker.
    fn may_remove(&self, resolvent: &Resolvent, entry: &PackageEntry) -> bool;

    /// Members of a named set, or `None` if the set is unknown.
    fn set_members(&self, name: &str) -> Option<Vec<String>>;
}

/// [`ResolverPolicy`] backed by a [`ResolverConfig`].
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    target_use_existing: UseExisting,
    dependency_use_existing: UseExisting,
    take_suggestions: bool,
    take_recommendations: bool,
    follow_installed_build_dependencies: bool,
    permit_uninstalls: bool,
    world: Vec<String>,
    world_names: HashSet<QualifiedName>,
}

impl DefaultPolicy {
    pub fn new(config: &ResolverConfig) -> Self {
        let world_names = config
            .world
            .iter()
            .filter_map(|atom| match Dep::parse(atom) {
                Ok(dep) => Some(QualifiedName::from(&dep.cpn)),
                Err(e) => {
                    warn!(atom = %atom, error = %e, "ignoring invalid world entry");
                    None
                }
            })
            .collect();
        Self {
            target_use_existing: config.target_use_existing,
            dependency_use_existing: config.dependency_use_existing,
            take_suggestions: config.take_suggestions,
            take_recommendations: config.take_recommendations,
            follow_installed_build_dependencies: config.follow_installed_build_dependencies,
            permit_uninstalls: config.permit_uninstalls,
            world: config.world.clone(),
            world_names,
        }
    }
}

impl ResolverPolicy for DefaultPolicy {
    fn use_existing_for(&self, _resolvent: &Resolvent, _dep: &Dep, reason: &Reason) -> UseExisting {
        if reason.is_target() {
            self.target_use_existing
        } else {
            self.dependency_use_existing
        }
    }

    fn take_dependency(&self, _resolvent: &Resolvent, labels: &[DepLabel]) -> bool {
        if labels.contains(&DepLabel::Suggestion) {
            self.take_suggestions
        } else if labels.contains(&DepLabel::Recommendation) {
            self.take_recommendations
        } else {
            true
        }
    }

    fn care_about_dependency(&self, decision: &Decision, labels: &[DepLabel]) -> bool {
        match decision {
            Decision::ExistingNoChange { .. } if !self.follow_installed_build_dependencies => {
                labels.is_empty() || !labels.iter().all(|l| l.is_build())
            }
            _ => true,
        }
    }

    fn is_world_member(&self, name: &QualifiedName) -> bool {
        self.world_names.contains(name)
    }

    fn may_remove(&self, _resolvent: &Resolvent, entry: &PackageEntry) -> bool {
        self.permit_uninstalls
            && entry.installed != Some(InstalledPolicy::Locked)
            && !self.is_world_member(&entry.name())
    }

    fn set_members(&self, name: &str) -> Option<Vec<String>> {
        match name {
            "world" => Some(self.world.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintOrigin, ConstraintSpec};
    use crate::repository::InMemoryRepository;
    use crate::resolvent::{SlotFilter, SlotName};
    use crate::universe::{
        InstalledSet, PackageMetadata, Universe, UniverseQuery, UseConfig,
    };
    use portage_atom::Cpv;

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

    fn meta(cpv: &str, iuse: &[&str], flags: &[&str]) -> PackageMetadata {
        PackageMetadata {
            iuse: iuse.iter().map(|s| s.to_string()).collect(),
            use_flags: flags.iter().map(|s| s.to_string()).collect(),
            ..PackageMetadata::new(Cpv::parse(cpv).unwrap())
        }
    }

    fn resolvent() -> Resolvent {
        Resolvent::new(
            QualifiedName::new("app-misc/foo"),
            SlotName::Known("0".into()),
            DestinationType::InstallToRoot,
        )
    }

    fn choose(universe: &Universe, constraints: &[Constraint]) -> Choice {
        let r = resolvent();
        let ids = universe.query(&r.package, &SlotFilter::Any).unwrap();
        let candidates = Candidates::split(
            &r,
            ids.into_iter().map(|id| (id, universe.package(id).unwrap())),
        );
        let mut set = Constraints::new();
        for c in constraints {
            set.add(c.clone());
        }
        DefaultChoicePolicy.choose(&r, &candidates, &set)
    }

    fn universe(installed_flags: &[&str]) -> Universe {
        let mut repo = InMemoryRepository::new();
        repo.add(meta("app-misc/foo-1.0", &["doc"], &[]));
        repo.add(meta("app-misc/foo-2.0", &["doc"], &[]));
        let mut installed = InstalledSet::new();
        installed.add_favored(meta("app-misc/foo-1.0", &["doc"], installed_flags));
        Universe::with_installed(&repo, &UseConfig::default(), &installed)
    }

    #[test]
    fn keeps_installed_when_possible() {
        let universe = universe(&[]);
        let choice = choose(&universe, &[constraint("app-misc/foo", UseExisting::IfPossible)]);
        assert!(matches!(choice, Choice::Keep { is_same_version: false, .. }));
    }

    #[test]
    fn never_installs_the_best_version() {
        let universe = universe(&[]);
        let choice = choose(&universe, &[constraint("app-misc/foo", UseExisting::Never)]);
        assert!(matches!(choice, Choice::Install { best: true, .. }));
    }

    #[test]
    fn if_same_compares_against_the_installable_version() {
        let universe = universe(&[]);
        let pinned = constraint("=app-misc/foo-1.0", UseExisting::IfSame);
        assert!(matches!(
            choose(&universe, &[pinned.clone()]),
            Choice::Keep { is_same: true, .. }
        ));

        let changed = self::universe(&["doc"]);
        assert!(matches!(
            choose(&changed, &[pinned]),
            Choice::Install { best: false, .. }
        ));
    }

    #[test]
    fn version_requirement_forces_an_upgrade() {
        let universe = universe(&[]);
        let choice = choose(&universe, &[constraint(">=app-misc/foo-2", UseExisting::IfPossible)]);
        assert!(matches!(choice, Choice::Install { best: true, .. }));
        let none = choose(&universe, &[constraint(">=app-misc/foo-3", UseExisting::IfPossible)]);
        assert_eq!(none, Choice::Fail);
    }

    #[test]
    fn locked_packages_are_never_replaced() {
        let mut repo = InMemoryRepository::new();
        repo.add(meta("app-misc/foo-2.0", &[], &[]));
        let mut installed = InstalledSet::new();
        installed.add_locked(meta("app-misc/foo-1.0", &[], &[]));
        let universe = Universe::with_installed(&repo, &UseConfig::default(), &installed);

        assert!(matches!(
            choose(&universe, &[constraint("app-misc/foo", UseExisting::Never)]),
            Choice::Keep { .. }
        ));
        assert_eq!(
            choose(&universe, &[constraint(">=app-misc/foo-2", UseExisting::Never)]),
            Choice::Fail
        );
    }

    #[test]
    fn default_policy_follows_config() {
        let config = ResolverConfig {
            world: vec!["app-misc/foo".into(), "not an atom".into()],
            ..ResolverConfig::default()
        };
        let policy = DefaultPolicy::new(&config);
        let r = resolvent();

        assert!(policy.is_world_member(&QualifiedName::new("app-misc/foo")));
        assert!(!policy.take_dependency(&r, &[DepLabel::Suggestion]));
        assert!(policy.take_dependency(&r, &[DepLabel::Recommendation]));
        assert!(policy.take_dependency(&r, &[DepLabel::Run]));
        assert_eq!(policy.set_members("world").map(|w| w.len()), Some(2));
        assert_eq!(policy.set_members("system"), None);

        let keep = Decision::ExistingNoChange {
            existing_id: PackageId(0),
            is_same: true,
            is_same_version: true,
            is_transient: false,
            taken: true,
        };
        assert!(!policy.care_about_dependency(&keep, &[DepLabel::Build]));
        assert!(policy.care_about_dependency(&keep, &[DepLabel::Run]));
    }
}
