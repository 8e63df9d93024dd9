//! The fixed-point decide loop.
//!
//! The [`Decider`] owns the resolution table for one pass. Each
//! [`Decider::step`] takes one resolvent off the work queue, decides it
//! from its accumulated constraints and feeds the constraints its
//! dependencies generate back into the table. A constraint that
//! invalidates a decision already acted upon cannot be patched in place;
//! the step then reports a [`Restart`] and the caller begins a fresh pass
//! with that constraint preloaded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use portage_atom::Dep;
use tracing::{debug, trace};

use crate::accumulate::{ConstraintEngine, Requirement, ResolutionLookup};
use crate::config::ResolverConfig;
use crate::constraint::{Constraint, Constraints, Reason};
use crate::decision::{Decision, Destination, UnsuitableCandidate};
use crate::error::{ResolutionFailure, ResolverError, Result};
use crate::policy::{Candidates, Choice, ChoicePolicy, ResolverPolicy};
use crate::resolution::{Resolution, Transition, VisitState};
use crate::resolvent::{DestinationType, Resolvent, SlotFilter};
use crate::universe::{InstalledPolicy, PackageEntry, PackageId, UniverseQuery};

/// A constraint that could only be honoured by starting over.
#[derive(Debug, Clone, PartialEq)]
pub struct Restart {
    pub resolvent: Resolvent,
    /// Already converted with [`Constraint::preset`].
    pub constraint: Constraint,
}

/// Result of one [`Decider::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Something was decided or skipped; keep stepping.
    Progressed,
    /// Nothing is left to decide.
    FixedPoint,
    /// The pass must be abandoned.
    Restart(Restart),
}

/// Something that happened during resolution, reported to observers.
#[derive(Debug, Clone)]
pub enum ResolverEvent {
    PassStarted {
        pass: usize,
    },
    ConstraintAdded {
        resolvent: Resolvent,
        constraint: Constraint,
    },
    Decided {
        resolvent: Resolvent,
        decision: Decision,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Resolvents with at least one taken constraint.
    Taken,
    /// Everything left over, decided as untaken.
    Untaken,
}

/// Owns the resolution table of one pass.
pub struct Decider<'a> {
    universe: &'a dyn UniverseQuery,
    engine: ConstraintEngine<'a>,
    choice: &'a dyn ChoicePolicy,
    policy: &'a dyn ResolverPolicy,
    config: &'a ResolverConfig,
    presets: &'a BTreeMap<Resolvent, Constraints>,
    cancel: &'a AtomicBool,
    resolutions: BTreeMap<Resolvent, Resolution>,
    decision_order: Vec<Resolvent>,
    queue: VecDeque<Resolvent>,
    phase: Phase,
    iterations: usize,
    constraint_count: usize,
    transitions: VecDeque<Transition>,
    events: Option<Vec<ResolverEvent>>,
}

impl<'a> Decider<'a> {
    pub fn new(
        universe: &'a dyn UniverseQuery,
        choice: &'a dyn ChoicePolicy,
        policy: &'a dyn ResolverPolicy,
        config: &'a ResolverConfig,
        presets: &'a BTreeMap<Resolvent, Constraints>,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            universe,
            engine: ConstraintEngine::new(universe, policy, config),
            choice,
            policy,
            config,
            presets,
            cancel,
            resolutions: BTreeMap::new(),
            decision_order: Vec::new(),
            queue: VecDeque::new(),
            phase: Phase::Taken,
            iterations: 0,
            constraint_count: 0,
            transitions: VecDeque::new(),
            events: None,
        }
    }

    /// Keep a log of constraint additions and decisions for
    /// [`Decider::drain_events`].
    pub fn record_events(&mut self) {
        self.events.get_or_insert_with(Vec::new);
    }

    pub fn drain_events(&mut self) -> Vec<ResolverEvent> {
        self.events.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn emit(&mut self, event: impl FnOnce() -> ResolverEvent) {
        if let Some(events) = &mut self.events {
            events.push(event());
        }
    }

    pub fn resolutions(&self) -> &BTreeMap<Resolvent, Resolution> {
        &self.resolutions
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The resolution table, the order resolvents were first decided in,
    /// and the recent decision changes.
    pub fn into_parts(self) -> (BTreeMap<Resolvent, Resolution>, Vec<Resolvent>, Vec<Transition>) {
        (
            self.resolutions,
            self.decision_order,
            self.transitions.into_iter().collect(),
        )
    }

    /// Add the constraints of a user target.
    pub fn add_target(&mut self, dep: &Dep, reason: Reason) -> Result<Option<Restart>> {
        for requirement in self.engine.target(dep, reason)? {
            if let Some(restart) = self.apply(requirement)? {
                return Ok(Some(restart));
            }
        }
        Ok(None)
    }

    /// Failures of every taken resolvent that could not be made.
    pub fn failures(&self) -> Vec<ResolutionFailure> {
        self.resolutions
            .values()
            .filter_map(|resolution| match &resolution.decision {
                Some(Decision::UnableToMake {
                    unsuitable_candidates,
                    taken: true,
                }) => Some(ResolutionFailure {
                    resolvent: resolution.resolvent.clone(),
                    constraints: resolution.constraints.iter().cloned().collect(),
                    unsuitable_candidates: unsuitable_candidates.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Decide one resolvent.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(ResolverError::Cancelled);
        }
        self.iterations += 1;
        if self.iterations > self.config.iteration_cap(self.constraint_count) {
            return Err(ResolverError::NonConvergence {
                iterations: self.iterations,
                transitions: self.transitions.iter().cloned().collect(),
            });
        }

        let Some(resolvent) = self.next_resolvent() else {
            return Ok(StepOutcome::FixedPoint);
        };
        let Some(resolution) = self.resolutions.get_mut(&resolvent) else {
            return Ok(StepOutcome::Progressed);
        };
        if resolution.decision.is_some() {
            return Ok(StepOutcome::Progressed);
        }
        if self.phase == Phase::Taken && resolution.constraints.all_untaken() {
            trace!(resolvent = %resolvent, "deferring untaken resolvent");
            resolution.state = VisitState::Unvisited;
            return Ok(StepOutcome::Progressed);
        }

        let constraints = resolution.constraints.clone();
        let decision = self.decide(&resolvent, &constraints)?;
        self.set_decision(&resolvent, decision);
        Ok(match self.add_dependencies(&resolvent)? {
            Some(restart) => StepOutcome::Restart(restart),
            None => StepOutcome::Progressed,
        })
    }

    fn next_resolvent(&mut self) -> Option<Resolvent> {
        if let Some(resolvent) = self.queue.pop_front() {
            return Some(resolvent);
        }
        if self.phase == Phase::Taken {
            self.phase = Phase::Untaken;
            for (resolvent, resolution) in &mut self.resolutions {
                if resolution.decision.is_none() {
                    resolution.state = VisitState::Considering;
                    self.queue.push_back(resolvent.clone());
                }
            }
            debug!(deferred = self.queue.len(), "deciding untaken resolvents");
        }
        self.queue.pop_front()
    }

    fn resolution_mut(&mut self, resolvent: &Resolvent) -> &mut Resolution {
        let presets = self.presets;
        let constraint_count = &mut self.constraint_count;
        self.resolutions
            .entry(resolvent.clone())
            .or_insert_with(|| {
                let mut resolution = Resolution::new(resolvent.clone());
                if let Some(preset) = presets.get(resolvent) {
                    for constraint in preset {
                        if resolution.constraints.add(constraint.clone()) {
                            *constraint_count += 1;
                        }
                    }
                }
                resolution
            })
    }

    fn add_constraint(&mut self, resolvent: &Resolvent, constraint: Constraint) {
        let added = self
            .resolution_mut(resolvent)
            .constraints
            .add(constraint.clone());
        if added {
            self.constraint_count += 1;
            trace!(resolvent = %resolvent, constraint = %constraint, "constraint added");
            self.emit(|| ResolverEvent::ConstraintAdded {
                resolvent: resolvent.clone(),
                constraint,
            });
        }
    }

    /// Feed one requirement into the table.
    pub fn apply(&mut self, requirement: Requirement) -> Result<Option<Restart>> {
        let Requirement {
            resolvent,
            constraint,
        } = requirement;
        let universe = self.universe;

        let current = self.resolution_mut(&resolvent).decision.clone();
        if let Some(decision) = current {
            let chosen = decision
                .chosen_id()
                .map(|id| universe.package(id))
                .transpose()?;
            if !Resolution::check(&constraint, &decision, chosen) {
                return self.made_wrong_decision(&resolvent, &decision, constraint);
            }
        }

        self.add_constraint(&resolvent, constraint);
        if let Some(resolution) = self.resolutions.get_mut(&resolvent) {
            if resolution.decision.is_none() && resolution.state == VisitState::Unvisited {
                resolution.state = VisitState::Considering;
                self.queue.push_back(resolvent);
            }
        }
        Ok(None)
    }

    fn made_wrong_decision(
        &mut self,
        resolvent: &Resolvent,
        old: &Decision,
        constraint: Constraint,
    ) -> Result<Option<Restart>> {
        let mut adapted = self.resolution_mut(resolvent).constraints.clone();
        adapted.add(constraint.clone());

        match self.try_decide(resolvent, &adapted)? {
            Some(decision) if matches!(old, Decision::NothingNoChange { .. }) => {
                debug!(resolvent = %resolvent, "changing a nothing decision in place");
                self.add_constraint(resolvent, constraint);
                self.set_decision(resolvent, decision);
                self.add_dependencies(resolvent)
            }
            Some(_) => {
                debug!(
                    resolvent = %resolvent,
                    constraint = %constraint,
                    "decision invalidated, restarting"
                );
                Ok(Some(Restart {
                    resolvent: resolvent.clone(),
                    constraint: constraint.preset(),
                }))
            }
            None => {
                self.add_constraint(resolvent, constraint);
                let candidates = self.candidates(resolvent)?;
                let decision = self.cannot_decide(resolvent, &candidates, &adapted)?;
                self.set_decision(resolvent, decision);
                self.add_dependencies(resolvent)
            }
        }
    }

    fn set_decision(&mut self, resolvent: &Resolvent, decision: Decision) {
        let iteration = self.iterations;
        let history = self.config.transition_history;
        let universe = self.universe;
        let resolution = self.resolution_mut(resolvent);
        let from = resolution.decision.as_ref().map(|d| d.describe(universe));
        resolution.decision = Some(decision.clone());
        resolution.state = VisitState::Decided;

        let to = decision.describe(universe);
        debug!(resolvent = %resolvent, decision = %to, "decided");
        if history > 0 {
            if self.transitions.len() == history {
                self.transitions.pop_front();
            }
            self.transitions.push_back(Transition {
                iteration,
                resolvent: resolvent.clone(),
                from,
                to,
            });
        }
        if !self.decision_order.contains(resolvent) {
            self.decision_order.push(resolvent.clone());
        }
        self.emit(|| ResolverEvent::Decided {
            resolvent: resolvent.clone(),
            decision,
        });
    }

    fn add_dependencies(&mut self, resolvent: &Resolvent) -> Result<Option<Restart>> {
        let Some(decision) = self
            .resolutions
            .get(resolvent)
            .and_then(|r| r.decision.clone())
        else {
            return Ok(None);
        };
        let requirements = self.engine.dependencies(resolvent, &decision, &*self)?;
        for requirement in requirements {
            if let Some(restart) = self.apply(requirement)? {
                return Ok(Some(restart));
            }
        }
        Ok(None)
    }

    fn candidates(&self, resolvent: &Resolvent) -> Result<Candidates<'a>> {
        let universe = self.universe;
        let ids = universe.query(&resolvent.package, &resolvent.slot_filter())?;
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push((id, universe.package(id)?));
        }
        Ok(Candidates::split(resolvent, entries))
    }

    fn decide(&self, resolvent: &Resolvent, constraints: &Constraints) -> Result<Decision> {
        if let Some(decision) = self.try_decide(resolvent, constraints)? {
            return Ok(decision);
        }
        let candidates = self.candidates(resolvent)?;
        self.cannot_decide(resolvent, &candidates, constraints)
    }

    /// A decision every constraint accepts, if there is one.
    fn try_decide(
        &self,
        resolvent: &Resolvent,
        constraints: &Constraints,
    ) -> Result<Option<Decision>> {
        let candidates = self.candidates(resolvent)?;
        let taken = !constraints.all_untaken();
        Ok(
            match self.choice.choose(resolvent, &candidates, constraints) {
                Choice::Install { id, best } => Some(Decision::ChangesToMake {
                    origin_id: id,
                    best,
                    taken,
                    destination: Some(self.destination(resolvent, id)?),
                }),
                Choice::Keep {
                    id,
                    is_same,
                    is_same_version,
                    is_transient,
                } => Some(Decision::ExistingNoChange {
                    existing_id: id,
                    is_same,
                    is_same_version,
                    is_transient,
                    taken,
                }),
                Choice::Nothing => Some(Decision::NothingNoChange { taken }),
                Choice::Fail => None,
            },
        )
    }

    /// Fallbacks when no candidate satisfies everything: remove what is
    /// blocked, keep an installed version that fails nothing mandatory,
    /// or give up.
    fn cannot_decide(
        &self,
        resolvent: &Resolvent,
        candidates: &Candidates<'_>,
        constraints: &Constraints,
    ) -> Result<Decision> {
        let taken = !constraints.all_untaken();

        if constraints.only_blocks() {
            let blocked: Vec<(PackageId, &PackageEntry)> = candidates
                .installed
                .iter()
                .filter(|(_, e)| !constraints.accept(e))
                .copied()
                .collect();
            if !blocked.is_empty()
                && blocked
                    .iter()
                    .all(|(_, e)| self.policy.may_remove(resolvent, e))
            {
                return Ok(Decision::Remove {
                    ids: blocked.into_iter().map(|(id, _)| id).collect(),
                    taken,
                });
            }
        }

        for &(id, entry) in &candidates.installed {
            let locked = entry.installed == Some(InstalledPolicy::Locked);
            if locked || constraints.accept_mandatory(entry) {
                let broken = constraints.unmet_by(entry);
                if !broken.is_empty() {
                    return Ok(Decision::Break {
                        existing_id: id,
                        broken,
                        taken,
                    });
                }
            }
        }

        let unsuitable_candidates: Vec<UnsuitableCandidate> = candidates
            .installable
            .iter()
            .chain(&candidates.masked)
            .chain(&candidates.installed)
            .map(|&(id, entry)| UnsuitableCandidate {
                package_id: id,
                cpv: entry.to_string(),
                unmet_constraints: constraints.unmet_by(entry),
                masks: entry.meta.masks.clone(),
            })
            .collect();

        if taken && self.config.strict {
            return Err(ResolverError::Unsatisfiable {
                failures: vec![ResolutionFailure {
                    resolvent: resolvent.clone(),
                    constraints: constraints.iter().cloned().collect(),
                    unsuitable_candidates,
                }],
            });
        }
        Ok(Decision::UnableToMake {
            unsuitable_candidates,
            taken,
        })
    }

    /// Where an install of `id` goes and which installed ids it replaces:
    /// those of the same name in the same slot or with the same version.
    fn destination(&self, resolvent: &Resolvent, id: PackageId) -> Result<Destination> {
        let universe = self.universe;
        let repository = match resolvent.destination {
            DestinationType::InstallToRoot => self.config.install_repository.clone(),
            DestinationType::CreateBinary => self.config.binary_repository.clone(),
        };
        if resolvent.destination != DestinationType::InstallToRoot {
            return Ok(Destination {
                repository,
                replacing: Vec::new(),
            });
        }

        let entry = universe.package(id)?;
        let mut replacing = Vec::new();
        for other in universe.query(&resolvent.package, &SlotFilter::Any)? {
            let installed = universe.package(other)?;
            if installed.is_installed()
                && (installed.slot() == entry.slot()
                    || installed.meta.cpv.version == entry.meta.cpv.version)
            {
                replacing.push(other);
            }
        }
        Ok(Destination {
            repository,
            replacing,
        })
    }
}

impl ResolutionLookup for Decider<'_> {
    fn has_resolution(&self, resolvent: &Resolvent) -> bool {
        self.resolutions.contains_key(resolvent)
    }

    fn could_decide(&self, resolvent: &Resolvent, constraint: &Constraint) -> Result<bool> {
        let mut constraints = match self.resolutions.get(resolvent) {
            Some(resolution) => resolution.constraints.clone(),
            None => self.presets.get(resolvent).cloned().unwrap_or_default(),
        };
        constraints.add(constraint.clone());
        Ok(self.try_decide(resolvent, &constraints)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DefaultChoicePolicy, DefaultPolicy};
    use crate::repository::InMemoryRepository;
    use crate::resolvent::QualifiedName;
    use crate::spec_tree::{DepLabel, SpecTree, Tristate};
    use crate::universe::{
        ConditionEvaluator, InstalledSet, PackageMetadata, Universe, UniverseError, UseConfig,
    };
    use portage_atom::{Cpv, DepEntry};

    fn pkg(cpv: &str, rdepend: &[&str]) -> PackageMetadata {
        let mut meta = PackageMetadata::new(Cpv::parse(cpv).unwrap());
        meta.dependencies.rdepend = rdepend
            .iter()
            .map(|s| DepEntry::Atom(Dep::parse(s).unwrap()))
            .collect();
        meta
    }

    struct Fixture {
        universe: Universe,
        config: ResolverConfig,
        policy: DefaultPolicy,
        presets: BTreeMap<Resolvent, Constraints>,
        cancel: AtomicBool,
    }

    impl Fixture {
        fn new(universe: Universe, config: ResolverConfig) -> Self {
            let policy = DefaultPolicy::new(&config);
            Self {
                universe,
                config,
                policy,
                presets: BTreeMap::new(),
                cancel: AtomicBool::new(false),
            }
        }

        fn decider(&self) -> Decider<'_> {
            Decider::new(
                &self.universe,
                &DefaultChoicePolicy,
                &self.policy,
                &self.config,
                &self.presets,
                &self.cancel,
            )
        }

        /// Run one pass to its end, returning the decisions by package
        /// name or the restart that ended it.
        fn pass(&self, targets: &[&str]) -> std::result::Result<Vec<String>, Restart> {
            let mut decider = self.decider();
            for target in targets {
                let dep = Dep::parse(target).unwrap();
                if let Some(restart) = decider.add_target(&dep, Reason::Target).unwrap() {
                    return Err(restart);
                }
            }
            loop {
                match decider.step().unwrap() {
                    StepOutcome::Progressed => {}
                    StepOutcome::FixedPoint => break,
                    StepOutcome::Restart(restart) => return Err(restart),
                }
            }
            Ok(decider
                .resolutions()
                .values()
                .map(|r| {
                    let decision = r.decision.as_ref().unwrap();
                    let id = decision
                        .chosen_id()
                        .map(|id| self.universe.package(id).unwrap().to_string());
                    format!(
                        "{} {} {}",
                        r.resolvent.package,
                        decision.kind_name(),
                        id.unwrap_or_default()
                    )
                })
                .collect())
        }
    }

    #[test]
    fn dependencies_are_decided_too() {
        let mut repo = InMemoryRepository::new();
        repo.add(pkg("app-misc/foo-1", &["app-misc/bar"]));
        repo.add(pkg("app-misc/bar-1", &[]));
        repo.add(pkg("app-misc/bar-2", &[]));
        let fixture = Fixture::new(
            Universe::new(&repo, &UseConfig::default()),
            ResolverConfig::default(),
        );
        assert_eq!(
            fixture.pass(&["app-misc/foo"]).unwrap(),
            vec![
                "app-misc/bar changes_to_make app-misc/bar-2:0::gentoo",
                "app-misc/foo changes_to_make app-misc/foo-1:0::gentoo",
            ]
        );
    }

    #[test]
    fn later_constraint_on_a_decided_resolvent_restarts() {
        let mut repo = InMemoryRepository::new();
        repo.add(pkg("app-misc/foo-1", &["app-misc/bar"]));
        repo.add(pkg("app-misc/baz-1", &["<app-misc/bar-2"]));
        repo.add(pkg("app-misc/bar-1", &[]));
        repo.add(pkg("app-misc/bar-2", &[]));
        let mut fixture = Fixture::new(
            Universe::new(&repo, &UseConfig::default()),
            ResolverConfig::default(),
        );

        let restart = fixture
            .pass(&["app-misc/foo", "app-misc/bar", "app-misc/baz"])
            .unwrap_err();
        assert_eq!(restart.resolvent.package.as_str(), "app-misc/bar");
        assert_eq!(restart.constraint.reason, Reason::Preset);

        fixture
            .presets
            .entry(restart.resolvent.clone())
            .or_default()
            .add(restart.constraint);
        let decisions = fixture
            .pass(&["app-misc/foo", "app-misc/bar", "app-misc/baz"])
            .unwrap();
        assert!(decisions.contains(&"app-misc/bar changes_to_make app-misc/bar-1:0::gentoo".to_string()));
    }

    #[test]
    fn unmatched_dependency_is_unable_to_make() {
        let mut repo = InMemoryRepository::new();
        repo.add(pkg("app-misc/foo-1", &["app-misc/ghost"]));
        let fixture = Fixture::new(
            Universe::new(&repo, &UseConfig::default()),
            ResolverConfig::default(),
        );
        let decisions = fixture.pass(&["app-misc/foo"]).unwrap();
        assert!(decisions.contains(&"app-misc/ghost unable_to_make ".to_string()));

        let mut decider = fixture.decider();
        decider
            .add_target(&Dep::parse("app-misc/foo").unwrap(), Reason::Target)
            .unwrap();
        while decider.step().unwrap() != StepOutcome::FixedPoint {}
        let failures = decider.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resolvent.package.as_str(), "app-misc/ghost");
    }

    #[test]
    fn installed_blocked_package_is_removed() {
        let mut repo = InMemoryRepository::new();
        repo.add(pkg("app-misc/foo-1", &["!!app-misc/old"]));
        let mut installed = InstalledSet::new();
        installed.add_favored(pkg("app-misc/old-1", &[]));
        let fixture = Fixture::new(
            Universe::with_installed(&repo, &UseConfig::default(), &installed),
            ResolverConfig::default(),
        );
        let decisions = fixture.pass(&["app-misc/foo"]).unwrap();
        assert!(decisions.contains(&"app-misc/old remove ".to_string()));

        let locked = {
            let mut installed = InstalledSet::new();
            installed.add_locked(pkg("app-misc/old-1", &[]));
            Fixture::new(
                Universe::with_installed(&repo, &UseConfig::default(), &installed),
                ResolverConfig::default(),
            )
        };
        let decisions = locked.pass(&["app-misc/foo"]).unwrap();
        assert!(decisions.contains(&"app-misc/old break app-misc/old-1:0::installed".to_string()));
    }

    /// Universe where `app-misc/foo` carries a hand-written tree, for
    /// labels that package metadata cannot express.
    struct Labelled {
        inner: Universe,
        tree: SpecTree,
    }

    impl ConditionEvaluator for Labelled {
        fn evaluate(&self, id: PackageId, flag: &str) -> Tristate {
            self.inner.evaluate(id, flag)
        }
    }

    impl UniverseQuery for Labelled {
        fn query(
            &self,
            name: &QualifiedName,
            slot: &SlotFilter,
        ) -> std::result::Result<Vec<PackageId>, UniverseError> {
            self.inner.query(name, slot)
        }

        fn package(&self, id: PackageId) -> std::result::Result<&PackageEntry, UniverseError> {
            self.inner.package(id)
        }

        fn dependencies(&self, id: PackageId) -> std::result::Result<&SpecTree, UniverseError> {
            if self.inner.package(id)?.name().as_str() == "app-misc/foo" {
                Ok(&self.tree)
            } else {
                self.inner.dependencies(id)
            }
        }

        fn names(&self) -> Vec<QualifiedName> {
            self.inner.names()
        }
    }

    #[test]
    fn suggestions_are_decided_untaken_after_everything_else() {
        let mut repo = InMemoryRepository::new();
        repo.add(pkg("app-misc/foo-1", &[]));
        repo.add(pkg("app-misc/extra-1", &[]));
        let universe = Labelled {
            inner: Universe::new(&repo, &UseConfig::default()),
            tree: SpecTree::AllOf(vec![
                SpecTree::Labels(vec![DepLabel::Suggestion]),
                SpecTree::Package(Dep::parse("app-misc/extra").unwrap()),
            ]),
        };
        let config = ResolverConfig::default();
        let policy = DefaultPolicy::new(&config);
        let presets = BTreeMap::new();
        let cancel = AtomicBool::new(false);
        let mut decider = Decider::new(
            &universe,
            &DefaultChoicePolicy,
            &policy,
            &config,
            &presets,
            &cancel,
        );
        decider.record_events();
        decider
            .add_target(&Dep::parse("app-misc/foo").unwrap(), Reason::Target)
            .unwrap();
        while decider.step().unwrap() != StepOutcome::FixedPoint {}

        let events = decider.drain_events();
        let decided: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ResolverEvent::Decided {
                    resolvent,
                    decision,
                } => Some(format!("{} {}", resolvent.package, decision.taken())),
                _ => None,
            })
            .collect();
        assert_eq!(decided, vec!["app-misc/foo true", "app-misc/extra false"]);
        assert!(decider.drain_events().is_empty());
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let fixture = Fixture::new(
            Universe::new(&InMemoryRepository::new(), &UseConfig::default()),
            ResolverConfig::default(),
        );
        fixture.cancel.store(true, Ordering::Relaxed);
        let mut decider = fixture.decider();
        assert!(matches!(decider.step(), Err(ResolverError::Cancelled)));
    }
}
