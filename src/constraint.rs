//! Requirements placed on a resolvent.

use std::fmt;

use portage_atom::{Blocker, Dep};
use serde::{Deserialize, Serialize};

use crate::matching::{atom_matches, use_satisfied};
use crate::resolvent::Resolvent;
use crate::spec_tree::DepLabel;
use crate::universe::{PackageEntry, PackageId};

/// Atoms are persisted in their string form and re-parsed on load.
pub(crate) mod dep_string {
    use portage_atom::Dep;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(dep: &Dep, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(dep)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Dep, D::Error> {
        let s = String::deserialize(deserializer)?;
        Dep::parse(&s).map_err(|e| de::Error::custom(format!("invalid atom {s:?}: {e}")))
    }
}

/// `!` or `!!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStrength {
    /// `!atom`: may coexist briefly, the blocked package goes away after.
    Weak,
    /// `!!atom`: must be gone before the blocker is installed.
    Strong,
}

impl From<&Blocker> for BlockStrength {
    fn from(blocker: &Blocker) -> Self {
        match blocker {
            Blocker::Weak => BlockStrength::Weak,
            Blocker::Strong => BlockStrength::Strong,
        }
    }
}

/// What a constraint asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSpec {
    /// The chosen version must match.
    Package(#[serde(with = "dep_string")] Dep),
    /// The chosen version must not match.
    Block {
        #[serde(with = "dep_string")]
        dep: Dep,
        strength: BlockStrength,
    },
}

impl ConstraintSpec {
    pub fn dep(&self) -> &Dep {
        match self {
            ConstraintSpec::Package(dep) | ConstraintSpec::Block { dep, .. } => dep,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, ConstraintSpec::Block { .. })
    }
}

impl PartialEq for ConstraintSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstraintSpec::Package(a), ConstraintSpec::Package(b)) => {
                a.to_string() == b.to_string()
            }
            (
                ConstraintSpec::Block { dep: a, strength: sa },
                ConstraintSpec::Block { dep: b, strength: sb },
            ) => sa == sb && a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dep())
    }
}

/// Where a constraint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOrigin {
    Target,
    Dependency,
    Synthetic,
}

/// When an installed version may be kept instead of reinstalling.
///
/// Ordered from strictest to most lenient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseExisting {
    Never,
    IfTransient,
    IfSame,
    IfSameVersion,
    IfPossible,
}

/// Diagnostic chain explaining a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Requested by the user.
    Target,
    /// Pulled in by another package's dependencies.
    Dependency {
        from_id: PackageId,
        from_resolvent: Resolvent,
        /// The dependency as written.
        spec: String,
        labels: Vec<DepLabel>,
        /// Something installed already satisfied it.
        already_met: bool,
    },
    /// Carried over from an abandoned pass.
    Preset,
    /// Expanded from a named set such as `@world`.
    Set { name: String, inner: Box<Reason> },
}

impl Reason {
    pub fn is_target(&self) -> bool {
        match self {
            Reason::Target => true,
            Reason::Set { inner, .. } => inner.is_target(),
            Reason::Dependency { .. } | Reason::Preset => false,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Target => f.write_str("target"),
            Reason::Dependency {
                from_resolvent,
                spec,
                labels,
                ..
            } => {
                write!(f, "dependency {spec} of {from_resolvent}")?;
                if !labels.is_empty() {
                    let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                    write!(f, " ({})", labels.join(", "))?;
                }
                Ok(())
            }
            Reason::Preset => f.write_str("preset from an earlier pass"),
            Reason::Set { name, inner } => write!(f, "@{name} ({inner})"),
        }
    }
}

/// One requirement on a resolvent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub spec: ConstraintSpec,
    /// USE requirements resolved against the depending package.
    pub use_requirements: Vec<(String, bool)>,
    pub origin: ConstraintOrigin,
    pub mandatory: bool,
    pub untaken: bool,
    pub nothing_is_fine_too: bool,
    pub use_existing: UseExisting,
    pub reason: Reason,
}

impl Constraint {
    /// Whether `entry` matches the atom, ignoring block polarity.
    pub fn matches(&self, entry: &PackageEntry) -> bool {
        atom_matches(self.spec.dep(), entry) && use_satisfied(&self.use_requirements, &entry.flags)
    }

    /// Whether choosing `entry` is acceptable to this constraint.
    pub fn accepts(&self, entry: &PackageEntry) -> bool {
        match self.spec {
            ConstraintSpec::Package(_) => self.matches(entry),
            ConstraintSpec::Block { .. } => !self.matches(entry),
        }
    }

    /// Copy used to seed a fresh pass.
    ///
    /// USE requirements were already resolved against the depending
    /// package when the constraint was made, so they carry over as they
    /// are.
    pub fn preset(&self) -> Self {
        Self {
            origin: ConstraintOrigin::Synthetic,
            reason: Reason::Preset,
            ..self.clone()
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec)?;
        if !self.use_requirements.is_empty() {
            let reqs: Vec<String> = self
                .use_requirements
                .iter()
                .map(|(flag, on)| if *on { flag.clone() } else { format!("-{flag}") })
                .collect();
            write!(f, "[{}]", reqs.join(","))?;
        }
        write!(f, " ({})", self.reason)
    }
}

/// Insertion-ordered, only-growing set of constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints(Vec<Constraint>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint unless an identical one is already present.
    /// Returns whether the set grew.
    pub fn add(&mut self, constraint: Constraint) -> bool {
        if self.0.contains(&constraint) {
            false
        } else {
            self.0.push(constraint);
            true
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every constraint is a suggestion nobody took.
    pub fn all_untaken(&self) -> bool {
        self.0.iter().all(|c| c.untaken)
    }

    /// Deciding "nothing" is acceptable to every constraint.
    pub fn nothing_is_fine_too(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| c.nothing_is_fine_too)
    }

    pub fn only_blocks(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| c.spec.is_block())
    }

    pub fn strictest_use_existing(&self) -> UseExisting {
        self.0
            .iter()
            .map(|c| c.use_existing)
            .min()
            .unwrap_or(UseExisting::IfPossible)
    }

    /// Whether `entry` is acceptable to every constraint.
    pub fn accept(&self, entry: &PackageEntry) -> bool {
        self.0.iter().all(|c| c.accepts(entry))
    }

    /// Constraints `entry` fails.
    pub fn unmet_by(&self, entry: &PackageEntry) -> Vec<Constraint> {
        self.0.iter().filter(|c| !c.accepts(entry)).cloned().collect()
    }

    /// Whether `entry` fails nothing mandatory.
    pub fn accept_mandatory(&self, entry: &PackageEntry) -> bool {
        self.0.iter().filter(|c| c.mandatory).all(|c| c.accepts(entry))
    }

    /// Whether `other` contains every constraint of `self`.
    pub fn is_subset_of(&self, other: &Constraints) -> bool {
        self.0.iter().all(|c| other.0.contains(c))
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::universe::{PackageMetadata, Universe, UniverseQuery, UseConfig};
    use portage_atom::Cpv;

    pub(crate) fn package(spec: &str) -> Constraint {
        Constraint {
            spec: ConstraintSpec::Package(Dep::parse(spec).unwrap()),
            use_requirements: Vec::new(),
            origin: ConstraintOrigin::Target,
            mandatory: true,
            untaken: false,
            nothing_is_fine_too: false,
            use_existing: UseExisting::IfSame,
            reason: Reason::Target,
        }
    }

    fn block(spec: &str) -> Constraint {
        let dep = Dep::parse(spec).unwrap();
        let strength = BlockStrength::from(dep.blocker.as_ref().unwrap());
        Constraint {
            spec: ConstraintSpec::Block { dep, strength },
            nothing_is_fine_too: true,
            use_existing: UseExisting::IfPossible,
            origin: ConstraintOrigin::Dependency,
            ..package("app-misc/placeholder")
        }
    }

    fn universe() -> Universe {
        let mut repo = InMemoryRepository::new();
        let mut meta = PackageMetadata::new(Cpv::parse("dev-libs/openssl-3.0.0").unwrap());
        meta.use_flags.insert("asm".into());
        repo.add(meta);
        Universe::new(&repo, &UseConfig::default())
    }

    #[test]
    fn block_inverts_match() {
        let universe = universe();
        let entry = universe.package(PackageId(0)).unwrap();
        assert!(package(">=dev-libs/openssl-3").accepts(entry));
        assert!(!block("!!>=dev-libs/openssl-3").accepts(entry));
        assert!(block("!<dev-libs/openssl-3").accepts(entry));
    }

    #[test]
    fn use_requirements_are_part_of_matching() {
        let universe = universe();
        let entry = universe.package(PackageId(0)).unwrap();
        let mut c = package("dev-libs/openssl");
        c.use_requirements = vec![("asm".into(), true)];
        assert!(c.accepts(entry));
        c.use_requirements = vec![("asm".into(), false)];
        assert!(!c.accepts(entry));
        assert_eq!(c.preset().use_requirements, c.use_requirements);
        assert_eq!(c.preset().origin, ConstraintOrigin::Synthetic);
        assert_eq!(c.preset().reason, Reason::Preset);
    }

    #[test]
    fn add_deduplicates() {
        let mut set = Constraints::new();
        assert!(set.add(package("app-misc/foo")));
        assert!(!set.add(package("app-misc/foo")));
        assert!(set.add(package(">=app-misc/foo-2")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn summaries() {
        let mut set = Constraints::new();
        assert!(set.all_untaken());
        assert!(!set.nothing_is_fine_too());

        set.add(block("!app-misc/foo"));
        assert!(set.nothing_is_fine_too());
        assert!(set.only_blocks());
        assert_eq!(set.strictest_use_existing(), UseExisting::IfPossible);

        let mut optional = package("app-misc/foo");
        optional.untaken = true;
        optional.use_existing = UseExisting::Never;
        set.add(optional);
        assert!(!set.nothing_is_fine_too());
        assert!(!set.only_blocks());
        assert!(!set.all_untaken());
        assert_eq!(set.strictest_use_existing(), UseExisting::Never);
    }

    #[test]
    fn serde_keeps_atoms_as_strings() {
        let c = block("!!<app-misc/foo-2:0");
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("app-misc/foo-2"), "{json}");
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
