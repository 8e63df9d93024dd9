//! Matching atoms against concrete versions.
//!
//! Version comparison follows
//! [PMS 8.3.1](https://projects.gentoo.org/pms/latest/pms.html#x1-830008.3.1).
//! USE dependencies are resolved against the depending package's flags
//! once, when a constraint is created, and stored as plain
//! `(flag, must_be_enabled)` requirements.

use std::cmp::Ordering;
use std::collections::HashSet;

use portage_atom::{Dep, Operator, SlotDep, UseDepKind, Version};

use crate::universe::PackageEntry;

/// Test whether `candidate` satisfies `op constraint`.
///
/// `=` with a glob version (`=cat/pkg-1.2*`) is prefix matching, which
/// [`Version`]'s ordering already implements. `~` ignores the revision.
pub fn version_matches(candidate: &Version, op: &Operator, constraint: &Version) -> bool {
    match op {
        Operator::Less => candidate < constraint,
        Operator::LessOrEqual => candidate <= constraint,
        Operator::Equal => candidate.cmp(constraint) == Ordering::Equal,
        Operator::GreaterOrEqual => candidate >= constraint,
        Operator::Greater => candidate > constraint,
        Operator::Approximate => candidate.base() == constraint.base(),
    }
}

/// Named slot and sub-slot an atom asks for.
///
/// `:*`, `:=` and no slot at all accept any slot.
pub fn slot_requirement(dep: &Dep) -> (Option<&str>, Option<&str>) {
    match &dep.slot_dep {
        Some(SlotDep::Slot { slot: Some(s), .. }) => (Some(&s.slot), s.subslot.as_deref()),
        _ => (None, None),
    }
}

/// Operator and bare version of a versioned atom.
pub fn dep_version(dep: &Dep) -> Option<(Operator, Version)> {
    dep.version
        .as_ref()
        .map(|v| (v.op.unwrap_or(Operator::Equal), bare_version(v)))
}

fn bare_version(v: &Version) -> Version {
    Version {
        op: None,
        numbers: v.numbers.clone(),
        letter: v.letter,
        suffixes: v.suffixes.clone(),
        revision: v.revision.clone(),
        glob: v.glob,
    }
}

/// Resolve `[flag]`, `[-flag]`, `[flag?]`, `[!flag?]`, `[flag=]` and
/// `[!flag=]` against the flags of the depending package.
///
/// Conditional forms that do not apply are dropped. Targets have no
/// parent, so `parent_flags` is empty for them. Sorted by flag name.
pub fn use_requirements(dep: &Dep, parent_flags: &HashSet<String>) -> Vec<(String, bool)> {
    let Some(use_deps) = &dep.use_deps else {
        return Vec::new();
    };
    let mut requirements = Vec::new();
    for ud in use_deps {
        let parent_on = parent_flags.contains(&ud.flag);
        let required = match ud.kind {
            UseDepKind::Enabled => Some(true),
            UseDepKind::Disabled => Some(false),
            UseDepKind::Conditional => parent_on.then_some(true),
            UseDepKind::ConditionalInverse => (!parent_on).then_some(true),
            UseDepKind::Equal => Some(parent_on),
            UseDepKind::EqualInverse => Some(!parent_on),
        };
        if let Some(required) = required {
            requirements.push((ud.flag.clone(), required));
        }
    }
    requirements.sort();
    requirements.dedup();
    requirements
}

/// Whether `flags` meet every `(flag, must_be_enabled)` requirement.
pub fn use_satisfied(requirements: &[(String, bool)], flags: &HashSet<String>) -> bool {
    requirements
        .iter()
        .all(|(flag, enabled)| flags.contains(flag) == *enabled)
}

/// Match name, version, slot, sub-slot and repository of `dep` against
/// `entry`. USE requirements are checked separately by
/// [`use_satisfied`].
pub fn atom_matches(dep: &Dep, entry: &PackageEntry) -> bool {
    let meta = &entry.meta;
    if dep.cpn != meta.cpv.cpn {
        return false;
    }
    if let Some((op, version)) = dep_version(dep) {
        if !version_matches(&meta.cpv.version, &op, &version) {
            return false;
        }
    }
    let (slot, subslot) = slot_requirement(dep);
    if slot.is_some_and(|s| s != entry.slot()) {
        return false;
    }
    if subslot.is_some_and(|s| meta.subslot.as_deref() != Some(s)) {
        return false;
    }
    // Installed packages still remember their origin repository.
    if let Some(repo) = &dep.repo {
        if meta.repo.as_deref() != Some(repo.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::universe::{PackageId, PackageMetadata, Universe, UniverseQuery, UseConfig};
    use portage_atom::Cpv;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn vg(s: &str) -> Version {
        let mut ver = Version::parse(s).unwrap();
        ver.glob = true;
        ver
    }

    fn flags(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ordering_operators() {
        assert!(version_matches(&v("1.2.3"), &Operator::Less, &v("1.2.4")));
        assert!(!version_matches(&v("1.2.3"), &Operator::Less, &v("1.2.3")));
        assert!(version_matches(&v("1.2.3"), &Operator::LessOrEqual, &v("1.2.3")));
        assert!(version_matches(&v("1.2.4"), &Operator::GreaterOrEqual, &v("1.2.3")));
        assert!(!version_matches(&v("1.2.3"), &Operator::Greater, &v("1.2.3")));
        assert!(version_matches(&v("1.2.3_rc1"), &Operator::Less, &v("1.2.3")));
        assert!(version_matches(&v("1.2.3_p1"), &Operator::Greater, &v("1.2.3")));
    }

    #[test]
    fn equal_includes_revision_but_approximate_does_not() {
        assert!(!version_matches(&v("1.2.3-r1"), &Operator::Equal, &v("1.2.3")));
        assert!(version_matches(&v("1.2.3-r1"), &Operator::Approximate, &v("1.2.3")));
        assert!(!version_matches(&v("1.2.4"), &Operator::Approximate, &v("1.2.3")));
    }

    #[test]
    fn glob_is_prefix_matching() {
        assert!(version_matches(&v("1.75.0"), &Operator::Equal, &vg("1.75")));
        assert!(version_matches(&v("1.75"), &Operator::Equal, &vg("1.75")));
        assert!(!version_matches(&v("1.7"), &Operator::Equal, &vg("1.75")));
        assert!(!version_matches(&v("1.76.0"), &Operator::Equal, &vg("1.75")));
    }

    #[test]
    fn slot_requirement_ignores_operators() {
        let dep = Dep::parse("dev-lang/python:3.12/3.12t=").unwrap();
        assert_eq!(slot_requirement(&dep), (Some("3.12"), Some("3.12t")));
        let dep = Dep::parse("dev-lang/python:=").unwrap();
        assert_eq!(slot_requirement(&dep), (None, None));
        let dep = Dep::parse("dev-lang/python:*").unwrap();
        assert_eq!(slot_requirement(&dep), (None, None));
    }

    #[test]
    fn use_requirements_follow_the_parent() {
        let dep = Dep::parse("dev-libs/openssl[ssl?,!debug?,static=,-test]").unwrap();
        assert_eq!(
            use_requirements(&dep, &flags(&["ssl", "static"])),
            vec![
                ("debug".to_string(), true),
                ("ssl".to_string(), true),
                ("static".to_string(), true),
                ("test".to_string(), false),
            ]
        );
        assert_eq!(
            use_requirements(&dep, &flags(&["debug"])),
            vec![("static".to_string(), false), ("test".to_string(), false)]
        );
    }

    #[test]
    fn use_satisfied_checks_both_polarities() {
        let reqs = vec![("ssl".to_string(), true), ("test".to_string(), false)];
        assert!(use_satisfied(&reqs, &flags(&["ssl"])));
        assert!(!use_satisfied(&reqs, &flags(&["ssl", "test"])));
        assert!(!use_satisfied(&reqs, &flags(&[])));
    }

    #[test]
    fn atom_matches_slot_and_repository() {
        let mut repo = InMemoryRepository::named("gentoo");
        repo.add(PackageMetadata {
            slot: Some("3.12".into()),
            subslot: Some("3.12".into()),
            ..PackageMetadata::new(Cpv::parse("dev-lang/python-3.12.4").unwrap())
        });
        let universe = Universe::new(&repo, &UseConfig::default());
        let entry = universe.package(PackageId(0)).unwrap();

        let yes = [
            "dev-lang/python",
            ">=dev-lang/python-3.12",
            "=dev-lang/python-3.12*",
            "dev-lang/python:3.12/3.12",
            "dev-lang/python::gentoo",
        ];
        for spec in yes {
            assert!(atom_matches(&Dep::parse(spec).unwrap(), entry), "{spec}");
        }
        let no = [
            "dev-lang/perl",
            "<dev-lang/python-3.12",
            "dev-lang/python:3.11",
            "dev-lang/python:3.12/3.13",
            "dev-lang/python::guru",
        ];
        for spec in no {
            assert!(!atom_matches(&Dep::parse(spec).unwrap(), entry), "{spec}");
        }
    }
}
