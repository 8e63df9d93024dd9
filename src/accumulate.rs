//! Turning targets and dependencies into constraints.
//!
//! [`ConstraintEngine`] maps an atom to the resolvents it applies to and
//! builds the [`Constraint`] each one receives. Given a decision, it walks
//! the chosen package's dependency tree, picks one alternative out of
//! every `|| ( )` group, and yields a [`Requirement`] per
//! (resolvent, constraint) pair. It never touches the resolution table
//! itself; anything it needs to know about it goes through
//! [`ResolutionLookup`].

use std::collections::HashSet;

use portage_atom::{Dep, Operator};
use tracing::trace;

use crate::config::{ResolverConfig, SlotPolicy};
use crate::constraint::{
    BlockStrength, Constraint, ConstraintOrigin, ConstraintSpec, Reason, UseExisting,
};
use crate::decision::Decision;
use crate::error::Result;
use crate::matching::{atom_matches, dep_version, slot_requirement, use_requirements, use_satisfied};
use crate::policy::ResolverPolicy;
use crate::resolvent::{DestinationType, QualifiedName, Resolvent, SlotFilter, SlotName};
use crate::spec_tree::{DepLabel, Leaf, Leaves, SpecTree, Tristate};
use crate::universe::{PackageEntry, PackageId, UniverseQuery};

/// A constraint bound for a particular resolvent.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub resolvent: Resolvent,
    pub constraint: Constraint,
}

/// What the engine may ask about the current resolution table.
pub trait ResolutionLookup {
    fn has_resolution(&self, resolvent: &Resolvent) -> bool;

    /// Whether `resolvent` could be decided if `constraint` were added to
    /// what it already has.
    fn could_decide(&self, resolvent: &Resolvent, constraint: &Constraint) -> Result<bool>;
}

/// Context shared by every leaf of one dependency walk.
struct Walk<'w> {
    from: &'w Resolvent,
    from_id: PackageId,
    from_entry: &'w PackageEntry,
    decision: &'w Decision,
    lookup: &'w dyn ResolutionLookup,
}

/// Builds constraints from atoms.
pub struct ConstraintEngine<'a> {
    universe: &'a dyn UniverseQuery,
    policy: &'a dyn ResolverPolicy,
    config: &'a ResolverConfig,
}

impl<'a> ConstraintEngine<'a> {
    pub fn new(
        universe: &'a dyn UniverseQuery,
        policy: &'a dyn ResolverPolicy,
        config: &'a ResolverConfig,
    ) -> Self {
        Self {
            universe,
            policy,
            config,
        }
    }

    fn entries(&self, name: &QualifiedName) -> Result<Vec<(PackageId, &'a PackageEntry)>> {
        let universe = self.universe;
        let ids = universe.query(name, &SlotFilter::Any)?;
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push((id, universe.package(id)?));
        }
        Ok(entries)
    }

    /// Resolvents a package atom applies to.
    ///
    /// An atom naming a slot applies to that slot only. Otherwise the slot
    /// policy picks between the best installable slot and the installed
    /// slots. An empty result means nothing matches at all.
    pub fn resolvents_for(
        &self,
        dep: &Dep,
        reason: &Reason,
        destination: DestinationType,
    ) -> Result<Vec<Resolvent>> {
        let name = QualifiedName::from(&dep.cpn);
        if let (Some(slot), _) = slot_requirement(dep) {
            return Ok(vec![Resolvent::new(
                name,
                SlotName::Known(slot.to_string()),
                destination,
            )]);
        }

        let entries = self.entries(&name)?;
        let best = entries
            .iter()
            .find(|(_, e)| e.is_installable() && atom_matches(dep, e))
            .map(|(_, e)| e.slot().to_string());
        let mut installed: Vec<String> = Vec::new();
        for (_, entry) in &entries {
            if entry.is_installed()
                && atom_matches(dep, entry)
                && !installed.iter().any(|s| s == entry.slot())
            {
                installed.push(entry.slot().to_string());
            }
        }

        let policy = if reason.is_target() {
            self.config.target_slots
        } else {
            self.config.dependency_slots
        };
        let slots = match (best, policy) {
            (None, _) => installed,
            (Some(best), SlotPolicy::BestOrInstalled) => {
                if installed.contains(&best) {
                    installed
                } else {
                    vec![best]
                }
            }
            (Some(best), SlotPolicy::InstalledOrBest) => {
                if installed.is_empty() {
                    vec![best]
                } else {
                    installed
                }
            }
            (Some(best), SlotPolicy::All) => {
                let mut slots = Vec::with_capacity(installed.len() + 1);
                if !installed.contains(&best) {
                    slots.push(best);
                }
                slots.extend(installed);
                slots
            }
            (Some(best), SlotPolicy::Best) => vec![best],
        };

        Ok(slots
            .into_iter()
            .map(|slot| Resolvent::new(name.clone(), SlotName::Known(slot), destination))
            .collect())
    }

    /// Where to record a package atom that matches nothing.
    pub fn error_resolvents_for(&self, dep: &Dep, destination: DestinationType) -> Vec<Resolvent> {
        let slot = match slot_requirement(dep) {
            (Some(slot), _) => SlotName::Known(slot.to_string()),
            (None, _) => SlotName::Unknown,
        };
        vec![Resolvent::new(QualifiedName::from(&dep.cpn), slot, destination)]
    }

    /// Resolvents a blocker applies to: the named slot, or every slot any
    /// version of the package occupies.
    pub fn resolvents_for_blocker(&self, dep: &Dep) -> Result<Vec<Resolvent>> {
        let name = QualifiedName::from(&dep.cpn);
        let destination = DestinationType::InstallToRoot;
        if let (Some(slot), _) = slot_requirement(dep) {
            return Ok(vec![Resolvent::new(
                name,
                SlotName::Known(slot.to_string()),
                destination,
            )]);
        }
        let mut slots: Vec<String> = Vec::new();
        for (_, entry) in self.entries(&name)? {
            if !slots.iter().any(|s| s == entry.slot()) {
                slots.push(entry.slot().to_string());
            }
        }
        Ok(slots
            .into_iter()
            .map(|slot| Resolvent::new(name.clone(), SlotName::Known(slot), destination))
            .collect())
    }

    /// Requirements for a user target.
    pub fn target(&self, dep: &Dep, reason: Reason) -> Result<Vec<Requirement>> {
        let destination = self.config.destination;
        let mut resolvents = self.resolvents_for(dep, &reason, destination)?;
        if resolvents.is_empty() {
            resolvents = self.error_resolvents_for(dep, destination);
        }
        Ok(resolvents
            .into_iter()
            .map(|resolvent| {
                let constraint = Constraint {
                    spec: ConstraintSpec::Package(dep.clone()),
                    use_requirements: use_requirements(dep, &HashSet::new()),
                    origin: ConstraintOrigin::Target,
                    mandatory: true,
                    untaken: false,
                    nothing_is_fine_too: false,
                    use_existing: self.policy.use_existing_for(&resolvent, dep, &reason),
                    reason: reason.clone(),
                };
                Requirement {
                    resolvent,
                    constraint,
                }
            })
            .collect())
    }

    /// Requirements generated by the dependencies of `decision`.
    ///
    /// Empty unless the decision is a taken install or a taken keep.
    pub fn dependencies(
        &self,
        from: &Resolvent,
        decision: &Decision,
        lookup: &dyn ResolutionLookup,
    ) -> Result<Vec<Requirement>> {
        let Some(from_id) = decision.dependencies_of() else {
            return Ok(Vec::new());
        };
        let universe = self.universe;
        let from_entry = universe.package(from_id)?;
        let tree = universe.dependencies(from_id)?;
        let eval = |flag: &str| -> Tristate { universe.evaluate(from_id, flag) };

        let walk = Walk {
            from,
            from_id,
            from_entry,
            decision,
            lookup,
        };
        let mut out = Vec::new();
        self.collect(&walk, tree.leaves(&eval), &eval, &mut out)?;
        trace!(resolvent = %from, requirements = out.len(), "collected dependencies");
        Ok(out)
    }

    fn collect<'t>(
        &self,
        walk: &Walk<'_>,
        leaves: Leaves<'t>,
        eval: &'t dyn Fn(&str) -> Tristate,
        out: &mut Vec<Requirement>,
    ) -> Result<()> {
        for leaf in leaves {
            match leaf {
                Leaf::Package { dep, labels } => {
                    if self.policy.care_about_dependency(walk.decision, &labels) {
                        self.package_requirements(walk, dep, labels, out)?;
                    }
                }
                Leaf::Block { dep, labels } => {
                    if self.policy.care_about_dependency(walk.decision, &labels) {
                        self.block_requirements(walk, dep, labels, out)?;
                    }
                }
                Leaf::AnyOf { children, labels } => {
                    if let Some(child) = self.pick_any_of(walk, children, &labels, eval)? {
                        let leaves = Leaves::new(std::slice::from_ref(child), labels, eval);
                        self.collect(walk, leaves, eval, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn reason(&self, walk: &Walk<'_>, dep: &Dep, labels: Vec<DepLabel>) -> Result<Reason> {
        Ok(Reason::Dependency {
            from_id: walk.from_id,
            from_resolvent: walk.from.clone(),
            spec: dep.to_string(),
            labels,
            already_met: self.already_met(dep, &walk.from_entry.flags)?,
        })
    }

    /// Whether something installed already satisfies `dep`.
    fn already_met(&self, dep: &Dep, parent_flags: &HashSet<String>) -> Result<bool> {
        let requirements = use_requirements(dep, parent_flags);
        Ok(self
            .entries(&QualifiedName::from(&dep.cpn))?
            .iter()
            .any(|(_, e)| {
                e.is_installed() && atom_matches(dep, e) && use_satisfied(&requirements, &e.flags)
            }))
    }

    fn dependency_destination(&self, walk: &Walk<'_>, labels: &[DepLabel]) -> DestinationType {
        if labels.iter().any(|l| l.is_build()) {
            DestinationType::InstallToRoot
        } else {
            walk.from.destination
        }
    }

    fn package_constraint(
        &self,
        walk: &Walk<'_>,
        resolvent: &Resolvent,
        dep: &Dep,
        reason: &Reason,
        labels: &[DepLabel],
    ) -> Constraint {
        Constraint {
            spec: ConstraintSpec::Package(dep.clone()),
            use_requirements: use_requirements(dep, &walk.from_entry.flags),
            origin: ConstraintOrigin::Dependency,
            mandatory: labels.is_empty() || !labels.iter().all(|l| l.is_optional()),
            untaken: !self.policy.take_dependency(walk.from, labels),
            nothing_is_fine_too: false,
            use_existing: self.policy.use_existing_for(resolvent, dep, reason),
            reason: reason.clone(),
        }
    }

    fn package_requirements(
        &self,
        walk: &Walk<'_>,
        dep: &Dep,
        labels: Vec<DepLabel>,
        out: &mut Vec<Requirement>,
    ) -> Result<()> {
        let destination = self.dependency_destination(walk, &labels);
        let reason = self.reason(walk, dep, labels.clone())?;
        let mut resolvents = self.resolvents_for(dep, &reason, destination)?;
        if resolvents.is_empty() {
            resolvents = self.error_resolvents_for(dep, destination);
        }
        for resolvent in resolvents {
            let constraint = self.package_constraint(walk, &resolvent, dep, &reason, &labels);
            out.push(Requirement {
                resolvent,
                constraint,
            });
        }
        Ok(())
    }

    fn block_requirements(
        &self,
        walk: &Walk<'_>,
        dep: &Dep,
        labels: Vec<DepLabel>,
        out: &mut Vec<Requirement>,
    ) -> Result<()> {
        let strength = dep
            .blocker
            .as_ref()
            .map(BlockStrength::from)
            .unwrap_or(BlockStrength::Weak);
        let reason = self.reason(walk, dep, labels)?;
        let use_requirements = use_requirements(dep, &walk.from_entry.flags);
        let nothing_installed = !self
            .entries(&QualifiedName::from(&dep.cpn))?
            .iter()
            .any(|(_, e)| e.is_installed() && atom_matches(dep, e));

        for resolvent in self.resolvents_for_blocker(dep)? {
            // A package never blocks its own slot.
            if &resolvent == walk.from {
                continue;
            }
            out.push(Requirement {
                resolvent,
                constraint: Constraint {
                    spec: ConstraintSpec::Block {
                        dep: dep.clone(),
                        strength,
                    },
                    use_requirements: use_requirements.clone(),
                    origin: ConstraintOrigin::Dependency,
                    mandatory: strength == BlockStrength::Strong,
                    untaken: false,
                    nothing_is_fine_too: nothing_installed,
                    use_existing: UseExisting::IfPossible,
                    reason: reason.clone(),
                },
            });
        }
        Ok(())
    }

    /// Pick the alternative of a `|| ( )` group with the best score. A
    /// group scores as its worst leaf; ties go to the leftmost.
    fn pick_any_of<'t>(
        &self,
        walk: &Walk<'_>,
        children: &'t [SpecTree],
        labels: &[DepLabel],
        eval: &'t dyn Fn(&str) -> Tristate,
    ) -> Result<Option<&'t SpecTree>> {
        let mut best: Option<(i32, &SpecTree)> = None;
        for child in children {
            let Some(score) = self.child_score(walk, child, labels, eval)? else {
                continue;
            };
            if best.is_none_or(|(b, _)| score > b) {
                best = Some((score, child));
            }
        }
        Ok(best.map(|(_, child)| child))
    }

    fn child_score<'t>(
        &self,
        walk: &Walk<'_>,
        child: &'t SpecTree,
        labels: &[DepLabel],
        eval: &'t dyn Fn(&str) -> Tristate,
    ) -> Result<Option<i32>> {
        let mut worst: Option<i32> = None;
        for leaf in Leaves::new(std::slice::from_ref(child), labels.to_vec(), eval) {
            let score = match leaf {
                Leaf::Package { dep, labels } => Some(self.any_score(walk, dep, labels)?),
                // Blockers inside an any-of group carry no preference.
                Leaf::Block { .. } => None,
                Leaf::AnyOf { children, labels } => {
                    let mut best = None;
                    for c in children {
                        if let Some(s) = self.child_score(walk, c, &labels, eval)? {
                            best = Some(best.map_or(s, |b: i32| b.max(s)));
                        }
                    }
                    best
                }
            };
            if let Some(score) = score {
                worst = Some(worst.map_or(score, |w| w.min(score)));
            }
        }
        Ok(worst)
    }

    /// How much we like satisfying `dep` as one side of an any-of group.
    ///
    /// Installed matches beat installed-with-wrong-flags, which beat
    /// resolvents already being resolved, which beat anything that could
    /// be decided, which beats merely existing. The operator bias keeps
    /// `>=` alternatives ahead of `=` and `<` ones at the same level.
    fn any_score(&self, walk: &Walk<'_>, dep: &Dep, labels: Vec<DepLabel>) -> Result<i32> {
        let bias = match dep_version(dep) {
            None => 9,
            Some((Operator::Greater | Operator::GreaterOrEqual, _)) => 9,
            Some((Operator::Equal | Operator::Approximate, _)) => 2,
            Some((Operator::Less | Operator::LessOrEqual, _)) => 1,
        };

        let requirements = use_requirements(dep, &walk.from_entry.flags);
        let entries = self.entries(&QualifiedName::from(&dep.cpn))?;
        let installed = || entries.iter().filter(|(_, e)| e.is_installed());
        if installed().any(|(_, e)| atom_matches(dep, e) && use_satisfied(&requirements, &e.flags))
        {
            return Ok(50 + bias);
        }
        if !requirements.is_empty() && installed().any(|(_, e)| atom_matches(dep, e)) {
            return Ok(40 + bias);
        }

        let destination = self.dependency_destination(walk, &labels);
        let reason = self.reason(walk, dep, labels.clone())?;
        let resolvents = self.resolvents_for(dep, &reason, destination)?;
        if resolvents.iter().any(|r| walk.lookup.has_resolution(r)) {
            return Ok(30 + bias);
        }
        for resolvent in &resolvents {
            let constraint = self.package_constraint(walk, resolvent, dep, &reason, &labels);
            if walk.lookup.could_decide(resolvent, &constraint)? {
                return Ok(20 + bias);
            }
        }

        if entries.iter().any(|(_, e)| atom_matches(dep, e)) {
            return Ok(10 + bias);
        }
        Ok(0)
    }
}
