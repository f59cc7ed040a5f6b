use common::ActorId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{AccountClass, AccountId, Money};
use ledger::LedgerService;
use store::InMemoryStore;

async fn open(service: &LedgerService<InMemoryStore>, dollars: i64) -> AccountId {
    service
        .open_account(
            ActorId::new(),
            AccountClass::Checking,
            "1234",
            Money::from_dollars(dollars),
        )
        .await
        .unwrap()
        .id
}

fn bench_open_account(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/open_account", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = LedgerService::new(InMemoryStore::new());
                open(&service, 100).await;
            });
        });
    });
}

fn bench_deposit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = LedgerService::new(InMemoryStore::new());
    let account_id = rt.block_on(open(&service, 0));

    c.bench_function("ledger/deposit", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .deposit(account_id, Money::from_cents(100), "bench")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_withdraw_after_deposit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = LedgerService::new(InMemoryStore::new());
    let account_id = rt.block_on(open(&service, 1_000_000));

    // Paired so the balance never drifts toward zero across iterations.
    c.bench_function("ledger/deposit_withdraw_pair", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .deposit(account_id, Money::from_cents(100), "bench")
                    .await
                    .unwrap();
                service
                    .withdraw(account_id, Money::from_cents(100), "1234", "bench")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_transfer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = LedgerService::new(InMemoryStore::new());
    let a = rt.block_on(open(&service, 1_000_000));
    let b_id = rt.block_on(open(&service, 1_000_000));

    c.bench_function("ledger/transfer", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .transfer(a, b_id, Money::from_cents(100), "1234", "bench")
                    .await
                    .unwrap();
                service
                    .transfer(b_id, a, Money::from_cents(100), "1234", "bench")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_history_over_populated_ledger(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = LedgerService::new(InMemoryStore::new());
    let account_id = rt.block_on(open(&service, 0));

    // Pre-populate: 200 deposit entries
    let opened = rt.block_on(async {
        for _ in 0..200 {
            service
                .deposit(account_id, Money::from_cents(100), "bench")
                .await
                .unwrap();
        }
        service.account_info(account_id).await.unwrap().created_at
    });

    c.bench_function("ledger/history_200_entries", |b| {
        b.iter(|| {
            rt.block_on(async {
                let entries = service
                    .history(account_id, opened, chrono::Utc::now())
                    .await
                    .unwrap();
                assert_eq!(entries.len(), 200);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_open_account,
    bench_deposit,
    bench_withdraw_after_deposit,
    bench_transfer,
    bench_history_over_populated_ledger,
);
criterion_main!(benches);
