//! Example: resolve a small slice of the Gentoo tree and print the job lists.
//!
//! The slice has transitive deps, `|| ()` any-of (openssl vs libressl),
//! multi-slot Python, blockers, versioned constraints and USE-conditional
//! dependencies. A couple of packages are already installed, so the plan
//! mixes fresh installs, upgrades and kept versions.
//!
//! Runs the resolver twice, once with `ssl` enabled and once without, to
//! show how USE flags change the plan. Set `RUST_LOG=portage_resolver=debug`
//! to watch the decisions being made.

use std::collections::HashSet;

use portage_atom::{Cpv, Dep};
use portage_resolver::{
    DepEntry, InMemoryRepository, InstalledSet, PackageDeps, PackageMetadata, ReplacePolicy,
    Resolver, ResolverConfig, ResolverLists, Universe, UseConfig,
};
use tracing_subscriber::EnvFilter;

fn atom(s: &str) -> DepEntry {
    DepEntry::Atom(Dep::parse(s).unwrap())
}

/// Shorthand to build a PackageMetadata from a CPV string.
fn pkg(cpv: &str, slot: &str, depend: Vec<DepEntry>, rdepend: Vec<DepEntry>) -> PackageMetadata {
    PackageMetadata {
        slot: Some(slot.into()),
        dependencies: PackageDeps {
            depend,
            rdepend,
            ..PackageDeps::default()
        },
        ..PackageMetadata::new(Cpv::parse(cpv).unwrap())
    }
}

/// Build a PackageMetadata with a sub-slot (e.g. openssl:0/3.2).
fn pkg_subslot(cpv: &str, slot: &str, subslot: &str, rdepend: Vec<DepEntry>) -> PackageMetadata {
    PackageMetadata {
        subslot: Some(subslot.into()),
        ..pkg(cpv, slot, vec![], rdepend)
    }
}

fn build_repo() -> InMemoryRepository {
    let mut repo = InMemoryRepository::new();

    repo.add(pkg("sys-libs/zlib-1.2.13", "0", vec![], vec![]));
    repo.add(pkg("sys-libs/zlib-1.3.1", "0", vec![], vec![]));
    repo.add(pkg("app-arch/bzip2-1.0.8-r4", "0", vec![], vec![]));
    repo.add(pkg("dev-libs/expat-2.6.2", "0", vec![], vec![]));

    // openssl weak-blocks libressl, libressl strong-blocks openssl.
    for (cpv, subslot) in [("dev-libs/openssl-3.1.7", "3.1"), ("dev-libs/openssl-3.2.1", "3.2")] {
        repo.add(pkg_subslot(
            cpv,
            "0",
            subslot,
            vec![atom(">=sys-libs/zlib-1.2.13"), atom("!dev-libs/libressl")],
        ));
    }
    repo.add(pkg(
        "dev-libs/libressl-3.9.2",
        "0",
        vec![],
        vec![atom("sys-libs/zlib"), atom("!!dev-libs/openssl")],
    ));

    repo.add(pkg(
        "media-libs/libpng-1.6.43",
        "0",
        vec![],
        vec![atom(">=sys-libs/zlib-1.2.13")],
    ));

    for (cpv, slot) in [("dev-lang/python-3.11.9", "3.11"), ("dev-lang/python-3.12.4", "3.12")] {
        repo.add(PackageMetadata {
            iuse: vec!["xml".into()],
            ..pkg(
                cpv,
                slot,
                vec![],
                vec![
                    atom(">=sys-libs/zlib-1.2.13"),
                    atom("app-arch/bzip2"),
                    DepEntry::UseConditional {
                        flag: "xml".into(),
                        negate: false,
                        children: vec![atom("dev-libs/expat")],
                    },
                ],
            )
        });
    }

    repo.add(pkg(
        "dev-python/certifi-2024.2.2",
        "0",
        vec![],
        vec![atom("dev-lang/python:*")],
    ));

    repo.add(PackageMetadata {
        iuse: vec!["ssl".into()],
        ..pkg(
            "net-misc/curl-8.7.1",
            "0",
            vec![],
            vec![
                atom(">=sys-libs/zlib-1.2.13"),
                DepEntry::AnyOf(vec![atom("dev-libs/openssl"), atom("dev-libs/libressl")]),
                DepEntry::UseConditional {
                    flag: "ssl".into(),
                    negate: false,
                    children: vec![atom("dev-python/certifi")],
                },
            ],
        )
    });

    repo.add(pkg(
        "app-portage/gentoolkit-0.6.3",
        "0",
        vec![atom("dev-lang/python:3.12")],
        vec![atom("dev-lang/python:3.12"), atom("dev-python/certifi")],
    ));

    repo.add(pkg(
        "www-client/firefox-125.0.3",
        "0",
        vec![
            atom("dev-lang/python:3.11"),
            atom("dev-lang/python:3.12"),
            atom("media-libs/libpng"),
        ],
        vec![atom(">=dev-libs/openssl-3.2.0:0=")],
    ));

    repo
}

fn build_installed() -> InstalledSet {
    let mut installed = InstalledSet::new();
    installed.add_favored(pkg("sys-libs/zlib-1.2.13", "0", vec![], vec![]));
    installed.add_favored(pkg_subslot(
        "dev-libs/openssl-3.1.7",
        "0",
        "3.1",
        vec![atom(">=sys-libs/zlib-1.2.13")],
    ));
    installed.add_favored(pkg("app-arch/bzip2-1.0.8-r4", "0", vec![], vec![]));
    installed
}

fn print_lists(lists: &ResolverLists) {
    println!("  Pretend:");
    for job in &lists.pretend_job_list {
        println!("    {job}");
    }
    println!("  Execute:");
    for job in &lists.execute_job_list {
        let after: Vec<String> = job
            .arrows
            .iter()
            .filter_map(|arrow| {
                let before = lists.execute_job_list.get(arrow.comes_after)?;
                Some(format!("{} ({})", before.string_id, arrow.kind))
            })
            .collect();
        if after.is_empty() {
            println!("    {job}");
        } else {
            println!("    {job}\n        after {}", after.join(", "));
        }
    }
    if !lists.untaken_job_list.is_empty() {
        println!("  Not taken:");
        for job in &lists.untaken_job_list {
            println!("    {job}");
        }
    }
    for note in &lists.cycle_notes {
        println!("  {note}");
    }
    for error in &lists.errors {
        println!("  Unresolved: {error}");
    }
    if lists.restarts > 0 {
        println!("  ({} restart(s))", lists.restarts);
    }
}

fn resolve_and_print(repo: &InMemoryRepository, use_config: &UseConfig, config: ResolverConfig) {
    let universe = Universe::with_installed(repo, use_config, &build_installed());
    let mut resolver = Resolver::new(&universe, config);
    for target in ["net-misc/curl", "app-portage/gentoolkit", "www-client/firefox"] {
        if let Err(e) = resolver.add_target(target) {
            eprintln!("  {e}");
            return;
        }
    }
    match resolver.resolve() {
        Ok(lists) => print_lists(&lists),
        Err(e) => eprintln!("  Resolution failed: {e}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let repo = build_repo();

    println!("Installed:");
    println!("  sys-libs/zlib-1.2.13, dev-libs/openssl-3.1.7, app-arch/bzip2-1.0.8-r4");
    println!("\nTargets:");
    println!("  net-misc/curl app-portage/gentoolkit www-client/firefox");

    let flags_on = UseConfig::from(
        ["ssl", "xml"]
            .iter()
            .map(|s| s.to_string())
            .collect::<HashSet<_>>(),
    );
    println!("\n{}\nUSE=\"ssl xml\"\n{}", "=".repeat(60), "=".repeat(60));
    resolve_and_print(&repo, &flags_on, ResolverConfig::default());

    println!(
        "\n{}\nUSE=\"-ssl -xml\", separate uninstalls, fetch jobs\n{}",
        "=".repeat(60),
        "=".repeat(60)
    );
    let config = ResolverConfig {
        replace_policy: ReplacePolicy::UninstallAfter,
        fetch_jobs: true,
        ..ResolverConfig::default()
    };
    resolve_and_print(&repo, &UseConfig::default(), config);
}
