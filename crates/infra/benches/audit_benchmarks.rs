use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use backoffice_auth::capability::AUDIT_READ;
use backoffice_auth::{Identity, Role, has_capability};
use backoffice_core::SubjectId;
use backoffice_infra::audit::{
    AuditAction, AuditFilter, AuditStore, InMemoryAuditStore, NewAuditEntry, Pagination,
    StatsQuery,
};
use backoffice_infra::invites::InviteCode;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn seeded_store(rt: &tokio::runtime::Runtime, n: usize) -> InMemoryAuditStore {
    let store = InMemoryAuditStore::new();
    let actions = [
        AuditAction::UserBanned,
        AuditAction::SchoolCreated,
        AuditAction::PostDeleted,
        AuditAction::InviteCreated,
    ];
    rt.block_on(async {
        for i in 0..n {
            let actor = Identity::master(SubjectId::new(format!("admin-{}", i % 16)), None);
            store
                .append(
                    NewAuditEntry::by(&actor, actions[i % actions.len()])
                        .target("user", format!("u{i}")),
                )
                .await
                .unwrap();
        }
    });
    store
}

fn bench_audit_query(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("audit_query");

    for size in [1_000usize, 10_000] {
        let store = seeded_store(&rt, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("filtered_page", size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(store.query(
                    AuditFilter {
                        action: Some(AuditAction::UserBanned),
                        ..Default::default()
                    },
                    Pagination::default(),
                ))
                .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("stats", size), &size, |b, _| {
            b.iter(|| rt.block_on(store.stats(StatsQuery::default())).unwrap());
        });
    }

    group.finish();
}

fn bench_capability_check(c: &mut Criterion) {
    let roles = [Role::EDU_ADMIN, Role::new("Viewer"), Role::GLOBAL_ADMIN];
    c.bench_function("has_capability_scan", |b| {
        b.iter(|| has_capability(black_box(roles.iter()), black_box(&AUDIT_READ)));
    });
}

fn bench_invite_codes(c: &mut Criterion) {
    c.bench_function("invite_code_generate", |b| b.iter(InviteCode::generate));
}

criterion_group!(
    benches,
    bench_audit_query,
    bench_capability_check,
    bench_invite_codes
);
criterion_main!(benches);
