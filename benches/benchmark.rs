use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rbac_policy::{ConfigurationManager, Privilege, Role};
use std::hint::black_box;

fn privilege(i: usize) -> Privilege {
    Privilege::new(format!("p{i}"), format!("Privilege {i}"), "method")
        .with_property("permission", format!("app:area{i}"))
        .with_property("method", "read,update")
}

/// A chain of `depth` roles, each containing the next and granting one privilege.
fn chain_manager(depth: usize) -> ConfigurationManager {
    let mut manager = ConfigurationManager::new().unwrap();
    for i in 0..depth {
        manager.create_privilege(privilege(i)).unwrap();
    }
    for i in (0..depth).rev() {
        let mut role = Role::new(format!("r{i}"), format!("Role {i}")).add_privilege(format!("p{i}"));
        if i + 1 < depth {
            role = role.contain(format!("r{}", i + 1));
        }
        manager.create_role(role).unwrap();
    }
    manager
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for depth in [5, 25, 100] {
        let manager = chain_manager(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| black_box(manager.resolve("r0")))
        });
    }
    group.finish();
}

fn bench_permission_check(c: &mut Criterion) {
    let manager = chain_manager(25);

    c.bench_function("is_permitted", |b| {
        b.iter(|| black_box(manager.is_permitted("r0", "app:area24:update")))
    });
}

fn bench_validate_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_all");
    for depth in [5, 25, 100] {
        let manager = chain_manager(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| black_box(manager.validate_all()))
        });
    }
    group.finish();
}

fn bench_role_update(c: &mut Criterion) {
    let mut manager = chain_manager(50);

    c.bench_function("update_role_with_cycle_check", |b| {
        b.iter(|| {
            let role = Role::new("r10", "Role 10").add_privilege("p10").contain("r11");
            black_box(manager.update_role(role).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_resolution,
    bench_permission_check,
    bench_validate_all,
    bench_role_update
);
criterion_main!(benches);
