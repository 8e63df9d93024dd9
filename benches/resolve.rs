use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use portage_atom::{Cpv, Dep};
use portage_resolver::{
    DepEntry, InMemoryRepository, PackageDeps, PackageMetadata, Resolver, ResolverConfig,
    Universe, UseConfig,
};

/// A layered repository: every package in layer `n` depends on two
/// packages of layer `n + 1`, plus an any-of group picking between them.
fn layered_repo(layers: usize, width: usize) -> InMemoryRepository {
    let mut repo = InMemoryRepository::new();
    for layer in 0..layers {
        for i in 0..width {
            let mut rdepend = Vec::new();
            if layer + 1 < layers {
                let next = |j: usize| format!("cat-{}/pkg{}", layer + 1, j % width);
                rdepend.push(DepEntry::Atom(Dep::parse(&next(i)).unwrap()));
                rdepend.push(DepEntry::AnyOf(vec![
                    DepEntry::Atom(Dep::parse(&format!(">={}-2", next(i + 1))).unwrap()),
                    DepEntry::Atom(Dep::parse(&next(i + 2)).unwrap()),
                ]));
            }
            for version in ["1", "2", "3"] {
                repo.add(PackageMetadata {
                    slot: Some("0".into()),
                    dependencies: PackageDeps {
                        rdepend: rdepend.clone(),
                        ..PackageDeps::default()
                    },
                    ..PackageMetadata::new(
                        Cpv::parse(&format!("cat-{layer}/pkg{i}-{version}")).unwrap(),
                    )
                });
            }
        }
    }
    repo
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for (layers, width) in [(4, 8), (8, 16), (16, 32)] {
        let repo = layered_repo(layers, width);
        let universe = Universe::new(&repo, &UseConfig::default());
        let targets: Vec<String> = (0..width).map(|i| format!("cat-0/pkg{i}")).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{layers}x{width}")),
            &targets,
            |b, targets| {
                b.iter(|| {
                    let mut resolver = Resolver::new(&universe, ResolverConfig::default());
                    for target in targets {
                        resolver.add_target(target).unwrap();
                    }
                    resolver.resolve().unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
