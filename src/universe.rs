//! Arena of every package version the resolver may look at.
//!
//! [`Universe`] owns one [`PackageEntry`] per concrete version, drawn from
//! prioritised repositories plus the installed set, and hands out stable
//! [`PackageId`] handles into it. The resolver only ever talks to it
//! through the [`UniverseQuery`] trait.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use portage_atom::{Cpv, DepEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::repository::PackageRepository;
use crate::resolvent::{QualifiedName, SlotFilter};
use crate::spec_tree::{SpecTree, Tristate};

/// Stable handle for one package version in a [`Universe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub u32);

impl PackageId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised by a [`UniverseQuery`] implementation.
#[derive(Error, Debug)]
pub enum UniverseError {
    /// The handle does not belong to this universe.
    #[error("unknown package id {0}")]
    UnknownPackage(PackageId),

    /// The backing store failed.
    #[error("repository {repository} failed: {message}")]
    Backend { repository: String, message: String },
}

/// Why a version may not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mask {
    /// Masked by the user's configuration.
    User,
    /// Masked by the repository (`package.mask`).
    Repository { comment: String },
    /// A keyword that is not accepted.
    Unaccepted { key: String },
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mask::User => f.write_str("masked by user"),
            Mask::Repository { comment } if comment.is_empty() => {
                f.write_str("masked by repository")
            }
            Mask::Repository { comment } => write!(f, "masked by repository ({comment})"),
            Mask::Unaccepted { key } => write!(f, "unaccepted keyword {key}"),
        }
    }
}

/// Metadata for a concrete version.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    /// The fully-qualified category/package/version.
    pub cpv: Cpv,
    /// The slot this version occupies.
    pub slot: Option<String>,
    /// Sub-slot for ABI tracking.
    pub subslot: Option<String>,
    /// Declared IUSE flags (names only, without +/- defaults).
    pub iuse: Vec<String>,
    /// Active USE flags for this version.
    pub use_flags: HashSet<String>,
    /// Repository this version comes from (e.g. `"gentoo"`, `"guru"`).
    pub repo: Option<String>,
    /// `KEYWORDS`.
    pub keywords: Vec<String>,
    /// Reasons this version is masked. Empty means installable.
    pub masks: Vec<Mask>,
    /// Installed packages that may be silently replaced (e.g. live
    /// ebuilds rebuilt by the user).
    pub transient: bool,
    /// Structured dependency trees, separated by class.
    pub dependencies: PackageDeps,
}

impl PackageMetadata {
    /// Unmasked, unslotted metadata with no dependencies.
    pub fn new(cpv: Cpv) -> Self {
        Self {
            cpv,
            slot: None,
            subslot: None,
            iuse: Vec::new(),
            use_flags: HashSet::new(),
            repo: None,
            keywords: Vec::new(),
            masks: Vec::new(),
            transient: false,
            dependencies: PackageDeps::default(),
        }
    }

    pub fn is_masked(&self) -> bool {
        !self.masks.is_empty()
    }
}

/// Dependency trees separated by PMS dependency class.
///
/// Each field corresponds to one ebuild variable. The class decides the
/// default label of its entries, and through that how the orderer treats
/// the resulting edges.
#[derive(Debug, Clone, Default)]
pub struct PackageDeps {
    /// Build-time dependencies (`DEPEND`).
    pub depend: Vec<DepEntry>,
    /// Runtime dependencies (`RDEPEND`).
    pub rdepend: Vec<DepEntry>,
    /// Build host dependencies for cross-compilation (`BDEPEND`).
    pub bdepend: Vec<DepEntry>,
    /// Post-merge dependencies (`PDEPEND`).
    pub pdepend: Vec<DepEntry>,
    /// Install-time dependencies (`IDEPEND`).
    pub idepend: Vec<DepEntry>,
}

impl PackageDeps {
    /// Iterate over the non-empty dependency classes and their entries.
    pub fn iter_classes(&self) -> impl Iterator<Item = (DepClass, &[DepEntry])> {
        [
            (DepClass::Depend, self.depend.as_slice()),
            (DepClass::Bdepend, self.bdepend.as_slice()),
            (DepClass::Idepend, self.idepend.as_slice()),
            (DepClass::Rdepend, self.rdepend.as_slice()),
            (DepClass::Pdepend, self.pdepend.as_slice()),
        ]
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
    }
}

/// PMS dependency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepClass {
    Depend,
    Rdepend,
    Bdepend,
    Pdepend,
    Idepend,
}

impl fmt::Display for DepClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepClass::Depend => write!(f, "DEPEND"),
            DepClass::Rdepend => write!(f, "RDEPEND"),
            DepClass::Bdepend => write!(f, "BDEPEND"),
            DepClass::Pdepend => write!(f, "PDEPEND"),
            DepClass::Idepend => write!(f, "IDEPEND"),
        }
    }
}

/// Global USE flag configuration.
///
/// - **`enabled`**: flags switched on for every repository package.
/// - **`disabled`**: flags switched off even if the package enables them.
///
/// Installed packages keep the flags they were built with.
#[derive(Debug, Clone, Default)]
pub struct UseConfig {
    pub enabled: HashSet<String>,
    pub disabled: HashSet<String>,
}

impl From<HashSet<String>> for UseConfig {
    /// Treat the set as the enabled flags; everything else is off.
    fn from(enabled: HashSet<String>) -> Self {
        Self {
            enabled,
            disabled: HashSet::new(),
        }
    }
}

/// How strongly the resolver should hold on to an installed package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstalledPolicy {
    /// Kept when it satisfies everything, replaced otherwise.
    Favored,
    /// Never replaced; a conflicting requirement breaks it instead.
    Locked,
}

/// Packages currently installed on the system.
#[derive(Debug, Clone, Default)]
pub struct InstalledSet {
    pub(crate) packages: Vec<(PackageMetadata, InstalledPolicy)>,
}

impl InstalledSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, meta: PackageMetadata, policy: InstalledPolicy) {
        self.packages.push((meta, policy));
    }

    /// Add a package as [`InstalledPolicy::Favored`].
    pub fn add_favored(&mut self, meta: PackageMetadata) {
        self.add(meta, InstalledPolicy::Favored);
    }

    /// Add a package as [`InstalledPolicy::Locked`].
    pub fn add_locked(&mut self, meta: PackageMetadata) {
        self.add(meta, InstalledPolicy::Locked);
    }
}

/// One version in the arena.
#[derive(Debug)]
pub struct PackageEntry {
    pub meta: PackageMetadata,
    /// `Some` for installed packages.
    pub installed: Option<InstalledPolicy>,
    /// Index of the source repository; lower wins. Installed entries use
    /// `usize::MAX`.
    pub priority: usize,
    /// USE flags in effect for this version.
    pub flags: HashSet<String>,
    deps: OnceLock<SpecTree>,
}

impl PackageEntry {
    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    /// Repository packages that carry no mask.
    pub fn is_installable(&self) -> bool {
        self.installed.is_none() && !self.meta.is_masked()
    }

    pub fn name(&self) -> QualifiedName {
        QualifiedName::from(&self.meta.cpv.cpn)
    }

    pub fn slot(&self) -> &str {
        self.meta.slot.as_deref().unwrap_or("0")
    }
}

impl fmt::Display for PackageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.meta.cpv, self.slot())?;
        match (&self.installed, &self.meta.repo) {
            (Some(_), _) => f.write_str("::installed"),
            (None, Some(repo)) => write!(f, "::{repo}"),
            (None, None) => Ok(()),
        }
    }
}

/// Evaluates `flag?` guards for a given package.
pub trait ConditionEvaluator {
    fn evaluate(&self, id: PackageId, flag: &str) -> Tristate;
}

/// Read-only view of the package universe used by the resolver.
///
/// Implementations must be idempotent for the lifetime of a run.
pub trait UniverseQuery: ConditionEvaluator {
    /// All versions of `name` accepted by `slot`, best first. Installed
    /// versions are reported after every repository version.
    fn query(&self, name: &QualifiedName, slot: &SlotFilter)
    -> Result<Vec<PackageId>, UniverseError>;

    fn package(&self, id: PackageId) -> Result<&PackageEntry, UniverseError>;

    /// The full dependency tree of `id`.
    fn dependencies(&self, id: PackageId) -> Result<&SpecTree, UniverseError>;

    /// Names of every package the universe knows, in a stable order.
    fn names(&self) -> Vec<QualifiedName>;
}

/// The in-memory [`UniverseQuery`] implementation.
#[derive(Debug, Default)]
pub struct Universe {
    entries: Vec<PackageEntry>,
    by_name: IndexMap<QualifiedName, Vec<PackageId>>,
    use_config: UseConfig,
}

impl Universe {
    /// Universe over a single repository with nothing installed.
    pub fn new(repo: &dyn PackageRepository, use_config: &UseConfig) -> Self {
        Self::from_repositories(&[repo], use_config, &InstalledSet::new())
    }

    /// Universe over a single repository plus the installed set.
    pub fn with_installed(
        repo: &dyn PackageRepository,
        use_config: &UseConfig,
        installed: &InstalledSet,
    ) -> Self {
        Self::from_repositories(&[repo], use_config, installed)
    }

    /// Universe over several repositories, the first one having the
    /// highest priority.
    pub fn from_repositories(
        repos: &[&dyn PackageRepository],
        use_config: &UseConfig,
        installed: &InstalledSet,
    ) -> Self {
        let mut universe = Self {
            use_config: use_config.clone(),
            ..Self::default()
        };

        for (priority, repo) in repos.iter().enumerate() {
            let mut cpns = repo.all_packages();
            cpns.sort_by_key(|cpn| cpn.to_string());
            for cpn in cpns {
                for mut meta in repo.versions_for(&cpn) {
                    if meta.repo.is_none() {
                        meta.repo = Some(repo.name().to_string());
                    }
                    let flags = universe.effective_flags(&meta);
                    universe.push(meta, None, priority, flags);
                }
            }
        }

        for (meta, policy) in &installed.packages {
            let flags = meta.use_flags.clone();
            universe.push(meta.clone(), Some(*policy), usize::MAX, flags);
        }

        let Universe {
            entries, by_name, ..
        } = &mut universe;
        for ids in by_name.values_mut() {
            ids.sort_by(|a, b| {
                let (ea, eb) = (&entries[a.index()], &entries[b.index()]);
                ea.is_installed()
                    .cmp(&eb.is_installed())
                    .then_with(|| eb.meta.cpv.version.cmp(&ea.meta.cpv.version))
                    .then_with(|| ea.priority.cmp(&eb.priority))
            });
        }

        debug!(
            packages = universe.entries.len(),
            names = universe.by_name.len(),
            "universe built"
        );
        universe
    }

    fn effective_flags(&self, meta: &PackageMetadata) -> HashSet<String> {
        meta.use_flags
            .iter()
            .chain(self.use_config.enabled.iter())
            .filter(|flag| !self.use_config.disabled.contains(*flag))
            .cloned()
            .collect()
    }

    fn push(
        &mut self,
        meta: PackageMetadata,
        installed: Option<InstalledPolicy>,
        priority: usize,
        flags: HashSet<String>,
    ) {
        let id = PackageId(self.entries.len() as u32);
        let name = QualifiedName::from(&meta.cpv.cpn);
        self.entries.push(PackageEntry {
            meta,
            installed,
            priority,
            flags,
            deps: OnceLock::new(),
        });
        self.by_name.entry(name).or_default().push(id);
    }

    fn entry(&self, id: PackageId) -> Result<&PackageEntry, UniverseError> {
        self.entries
            .get(id.index())
            .ok_or(UniverseError::UnknownPackage(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConditionEvaluator for Universe {
    fn evaluate(&self, id: PackageId, flag: &str) -> Tristate {
        let Ok(entry) = self.entry(id) else {
            return Tristate::Indeterminate;
        };
        if entry.flags.contains(flag) {
            Tristate::True
        } else if entry.meta.iuse.iter().any(|f| f == flag)
            || self.use_config.disabled.contains(flag)
            || entry.meta.use_flags.contains(flag)
        {
            Tristate::False
        } else {
            Tristate::Indeterminate
        }
    }
}

impl UniverseQuery for Universe {
    fn query(
        &self,
        name: &QualifiedName,
        slot: &SlotFilter,
    ) -> Result<Vec<PackageId>, UniverseError> {
        let Some(ids) = self.by_name.get(name) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .copied()
            .filter(|id| slot.accepts(&self.entries[id.index()].meta))
            .collect())
    }

    fn package(&self, id: PackageId) -> Result<&PackageEntry, UniverseError> {
        self.entry(id)
    }

    fn dependencies(&self, id: PackageId) -> Result<&SpecTree, UniverseError> {
        let entry = self.entry(id)?;
        Ok(entry
            .deps
            .get_or_init(|| SpecTree::from_package_deps(&entry.meta.dependencies)))
    }

    fn names(&self) -> Vec<QualifiedName> {
        self.by_name.keys().cloned().collect()
    }
}
