//! Top-level driver: targets in, job lists out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use portage_atom::Dep;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ResolverConfig;
use crate::constraint::{Constraints, Reason};
use crate::decider::{Decider, ResolverEvent, Restart, StepOutcome};
use crate::decision::Decision;
use crate::error::{ResolutionFailure, ResolverError, Result};
use crate::job::JobList;
use crate::orderer::{CycleNote, Orderer};
use crate::policy::{ChoicePolicy, DefaultChoicePolicy, DefaultPolicy, ResolverPolicy};
use crate::resolution::{Resolution, Transition};
use crate::resolvent::Resolvent;
use crate::universe::UniverseQuery;

/// Everything a resolution run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverLists {
    /// Every resolution, sorted by resolvent.
    pub resolutions: Vec<Resolution>,
    pub pretend_job_list: JobList,
    pub execute_job_list: JobList,
    /// Suggestions and other optional changes that were not taken.
    pub untaken_job_list: JobList,
    /// Taken resolvents nothing could be found for.
    pub errors: Vec<ResolutionFailure>,
    pub cycle_notes: Vec<CycleNote>,
    /// Number of passes thrown away before this one.
    pub restarts: usize,
}

impl ResolverLists {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// The resolution for `resolvent`, if it was ever constrained.
    pub fn resolution(&self, resolvent: &Resolvent) -> Option<&Resolution> {
        self.resolutions
            .binary_search_by(|r| r.resolvent.cmp(resolvent))
            .ok()
            .map(|i| &self.resolutions[i])
    }

    /// Decisions on every slot of `package`.
    pub fn decisions_for<'s>(&'s self, package: &'s str) -> impl Iterator<Item = &'s Decision> {
        self.resolutions
            .iter()
            .filter(move |r| r.resolvent.package.as_str() == package)
            .filter_map(|r| r.decision.as_ref())
    }

    /// Fail with [`ResolverError::Unsatisfiable`] if anything taken could
    /// not be made.
    pub fn into_result(self) -> Result<Self> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(ResolverError::Unsatisfiable {
                failures: self.errors,
            })
        }
    }
}

enum Pass {
    Finished {
        resolutions: BTreeMap<Resolvent, Resolution>,
        decision_order: Vec<Resolvent>,
        failures: Vec<ResolutionFailure>,
    },
    Restart {
        restart: Restart,
        transitions: Vec<Transition>,
    },
}

/// Resolves a set of targets against a universe.
///
/// ```no_run
/// use portage_resolver::{InMemoryRepository, Resolver, ResolverConfig, Universe, UseConfig};
///
/// let repo = InMemoryRepository::new();
/// let universe = Universe::new(&repo, &UseConfig::default());
/// let config = ResolverConfig::default();
/// let mut resolver = Resolver::new(&universe, config);
/// resolver.add_target("app-misc/foo")?;
/// let lists = resolver.resolve()?;
/// for job in &lists.execute_job_list {
///     println!("{job}");
/// }
/// # Ok::<(), portage_resolver::ResolverError>(())
/// ```
pub struct Resolver<'a> {
    universe: &'a dyn UniverseQuery,
    config: ResolverConfig,
    policy: Box<dyn ResolverPolicy + 'a>,
    choice: Box<dyn ChoicePolicy + 'a>,
    targets: Vec<(Dep, Reason)>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Resolver<'a> {
    pub fn new(universe: &'a dyn UniverseQuery, config: ResolverConfig) -> Self {
        Self {
            universe,
            policy: Box::new(DefaultPolicy::new(&config)),
            choice: Box::new(DefaultChoicePolicy),
            config,
            targets: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_policy(mut self, policy: impl ResolverPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_choice_policy(mut self, choice: impl ChoicePolicy + 'a) -> Self {
        self.choice = Box::new(choice);
        self
    }

    /// Setting the flag makes the running pass stop with
    /// [`ResolverError::Cancelled`].
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Add a target: an atom such as `>=app-misc/foo-2`, or a set such as
    /// `@world`.
    pub fn add_target(&mut self, spec: &str) -> Result<()> {
        let spec = spec.trim();
        if let Some(set) = spec.strip_prefix('@') {
            let members = self
                .policy
                .set_members(set)
                .ok_or_else(|| ResolverError::InvalidSpec {
                    spec: spec.to_string(),
                    message: "unknown set".into(),
                })?;
            for member in members {
                let dep = parse_target(&member)?;
                self.targets.push((
                    dep,
                    Reason::Set {
                        name: set.to_string(),
                        inner: Box::new(Reason::Target),
                    },
                ));
            }
            return Ok(());
        }
        let dep = parse_target(spec)?;
        self.targets.push((dep, Reason::Target));
        Ok(())
    }

    pub fn resolve(&self) -> Result<ResolverLists> {
        self.run(&mut |_| {}, false)
    }

    /// Like [`Resolver::resolve`], reporting every pass start, constraint
    /// addition and decision to `observer`.
    pub fn resolve_observed(
        &self,
        observer: &mut dyn FnMut(&ResolverEvent),
    ) -> Result<ResolverLists> {
        self.run(observer, true)
    }

    fn run(&self, observer: &mut dyn FnMut(&ResolverEvent), record: bool) -> Result<ResolverLists> {
        let mut presets: BTreeMap<Resolvent, Constraints> = BTreeMap::new();
        let mut restarts = 0;

        let (resolutions, decision_order, failures) = loop {
            info!(pass = restarts + 1, targets = self.targets.len(), "starting resolution pass");
            observer(&ResolverEvent::PassStarted { pass: restarts + 1 });
            match self.pass(&presets, &mut *observer, record)? {
                Pass::Finished {
                    resolutions,
                    decision_order,
                    failures,
                } => break (resolutions, decision_order, failures),
                Pass::Restart {
                    restart,
                    transitions,
                } => {
                    restarts += 1;
                    if restarts > self.config.max_restarts {
                        return Err(ResolverError::NonConvergence {
                            iterations: restarts,
                            transitions,
                        });
                    }
                    info!(
                        resolvent = %restart.resolvent,
                        constraint = %restart.constraint,
                        restarts,
                        "restarting with a preset constraint"
                    );
                    presets
                        .entry(restart.resolvent)
                        .or_default()
                        .add(restart.constraint);
                }
            }
        };

        info!(
            resolutions = resolutions.len(),
            failures = failures.len(),
            restarts,
            "resolution finished"
        );
        let ordered = Orderer::new(self.universe, &self.config).order(&resolutions, &decision_order)?;
        Ok(ResolverLists {
            resolutions: resolutions.into_values().collect(),
            pretend_job_list: ordered.pretend,
            execute_job_list: ordered.execute,
            untaken_job_list: ordered.untaken,
            errors: failures,
            cycle_notes: ordered.cycle_notes,
            restarts,
        })
    }

    fn pass(
        &self,
        presets: &BTreeMap<Resolvent, Constraints>,
        observer: &mut dyn FnMut(&ResolverEvent),
        record: bool,
    ) -> Result<Pass> {
        let mut decider = Decider::new(
            self.universe,
            &*self.choice,
            &*self.policy,
            &self.config,
            presets,
            &self.cancel,
        );
        if record {
            decider.record_events();
        }

        for (dep, reason) in &self.targets {
            let restart = decider.add_target(dep, reason.clone())?;
            forward(&mut decider, observer);
            if let Some(restart) = restart {
                let (_, _, transitions) = decider.into_parts();
                return Ok(Pass::Restart {
                    restart,
                    transitions,
                });
            }
        }

        loop {
            let outcome = decider.step()?;
            forward(&mut decider, observer);
            match outcome {
                StepOutcome::Progressed => {}
                StepOutcome::FixedPoint => break,
                StepOutcome::Restart(restart) => {
                    let (_, _, transitions) = decider.into_parts();
                    return Ok(Pass::Restart {
                        restart,
                        transitions,
                    });
                }
            }
        }

        let failures = decider.failures();
        if self.config.strict && !failures.is_empty() {
            return Err(ResolverError::Unsatisfiable { failures });
        }
        let (resolutions, decision_order, _) = decider.into_parts();
        Ok(Pass::Finished {
            resolutions,
            decision_order,
            failures,
        })
    }
}

fn forward(decider: &mut Decider<'_>, observer: &mut dyn FnMut(&ResolverEvent)) {
    for event in decider.drain_events() {
        observer(&event);
    }
}

fn parse_target(spec: &str) -> Result<Dep> {
    let dep = Dep::parse(spec).map_err(|e| ResolverError::InvalidSpec {
        spec: spec.to_string(),
        message: e.to_string(),
    })?;
    if dep.blocker.is_some() {
        return Err(ResolverError::InvalidSpec {
            spec: spec.to_string(),
            message: "a blocker cannot be a target".into(),
        });
    }
    Ok(dep)
}
