//! Dependency resolution and job ordering for Gentoo-style repositories.
//!
//! Targets are parsed with [`portage_atom`] and resolved against a
//! [`Universe`] built from prioritised repositories plus the installed
//! set. The resolver accumulates constraints per `(package, slot,
//! destination)` [`Resolvent`], decides each one until nothing changes,
//! and then orders the resulting installs and uninstalls into
//! [`JobList`]s.
//!
//! ```no_run
//! use portage_atom::{Cpv, Dep, DepEntry};
//! use portage_resolver::{
//!     InMemoryRepository, PackageDeps, PackageMetadata, Resolver, ResolverConfig, Universe,
//!     UseConfig,
//! };
//!
//! let mut repo = InMemoryRepository::new();
//! repo.add(PackageMetadata {
//!     dependencies: PackageDeps {
//!         rdepend: vec![DepEntry::Atom(Dep::parse("dev-libs/bar").unwrap())],
//!         ..PackageDeps::default()
//!     },
//!     ..PackageMetadata::new(Cpv::parse("app-misc/foo-1.0").unwrap())
//! });
//! repo.add(PackageMetadata::new(Cpv::parse("dev-libs/bar-2.0").unwrap()));
//!
//! let universe = Universe::new(&repo, &UseConfig::default());
//! let mut resolver = Resolver::new(&universe, ResolverConfig::default());
//! resolver.add_target("app-misc/foo").unwrap();
//! let lists = resolver.resolve().unwrap();
//! for job in &lists.execute_job_list {
//!     println!("{job}");
//! }
//! ```

mod accumulate;
mod config;
mod constraint;
mod decider;
mod decision;
mod error;
mod job;
mod matching;
mod orderer;
mod policy;
mod repository;
mod resolution;
mod resolvent;
mod resolver;
mod spec_tree;
mod universe;

pub use accumulate::{ConstraintEngine, Requirement, ResolutionLookup};
pub use config::{DemotionRule, ReplacePolicy, ResolverConfig, SlotPolicy};
pub use constraint::{
    BlockStrength, Constraint, ConstraintOrigin, ConstraintSpec, Constraints, Reason, UseExisting,
};
pub use decider::{Decider, ResolverEvent, Restart, StepOutcome};
pub use decision::{Decision, Destination, UnsuitableCandidate};
pub use error::{ConfigError, ResolutionFailure, ResolverError, Result};
pub use job::{Arrow, Job, JobId, JobKind, JobList};
pub use matching::{atom_matches, version_matches};
pub use orderer::{CycleNote, DemotionTable, EdgeKind, OrderedJobs, Orderer, RejectedEdge};
pub use policy::{
    Candidates, Choice, ChoicePolicy, DefaultChoicePolicy, DefaultPolicy, ResolverPolicy,
    options_changed,
};
pub use portage_atom::DepEntry;
pub use repository::{InMemoryRepository, PackageRepository};
pub use resolution::{Resolution, Transition, VisitState};
pub use resolvent::{DestinationType, QualifiedName, Resolvent, SlotFilter, SlotName};
pub use resolver::{Resolver, ResolverLists};
pub use spec_tree::{DepLabel, Leaf, Leaves, SpecTree, Tristate};
pub use universe::{
    ConditionEvaluator, DepClass, InstalledPolicy, InstalledSet, Mask, PackageDeps, PackageEntry,
    PackageId, PackageMetadata, Universe, UniverseError, UniverseQuery, UseConfig,
};
