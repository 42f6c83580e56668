use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use motormart_core::{AggregateId, TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_events::InMemoryEventBus;
use motormart_infra::command_dispatcher::CommandDispatcher;
use motormart_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use motormart_infra::projections::listings::{CatalogProjection, ListingReadModel};
use motormart_infra::read_model::InMemoryTenantStore;
use motormart_listings::{
    AdjustStock, Condition, CreateListing, Listing, ListingCommand, ListingCreated,
    ListingDetails, ListingEvent, ListingId, StockAdjusted,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Naive CRUD simulation: direct key-value updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<(TenantId, AggregateId), CrudState>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CrudState {
    title: String,
    stock: i64,
    version: u64, // For optimistic concurrency (not used in benchmarks)
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn create(&self, tenant_id: TenantId, listing_id: AggregateId, title: String) {
        let mut map = self.inner.write().unwrap();
        map.insert(
            (tenant_id, listing_id),
            CrudState {
                title,
                stock: 1,
                version: 1,
            },
        );
    }

    fn adjust_stock(
        &self,
        tenant_id: TenantId,
        listing_id: AggregateId,
        delta: i64,
    ) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if let Some(state) = map.get_mut(&(tenant_id, listing_id)) {
            let new_stock = state.stock + delta;
            if new_stock < 0 {
                return Err(());
            }
            state.stock = new_stock;
            state.version += 1;
            Ok(())
        } else {
            Err(())
        }
    }
}

fn bench_details() -> ListingDetails {
    ListingDetails {
        brand: "Toyota".to_string(),
        model_year: 2021,
        category: "sedan".to_string(),
        mileage: 30_000,
        fuel_type: None,
        transmission: None,
        color: None,
        vin: None,
        engine_size: None,
        horsepower: None,
        doors: None,
        seats: None,
        description: "Benchmark vehicle.".to_string(),
        features: vec![],
        image_url: None,
        location: None,
        rating: None,
    }
}

fn create_cmd(tenant_id: TenantId, listing_id: ListingId, seller_id: UserId) -> ListingCommand {
    ListingCommand::CreateListing(CreateListing {
        tenant_id,
        listing_id,
        seller_id,
        title: "Benchmark Car".to_string(),
        condition: Condition::Used,
        details: bench_details(),
        price_cents: 2_000_000,
        stock: 1,
        occurred_at: Utc::now(),
    })
}

fn setup_event_sourcing() -> (
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>,
    TenantId,
    UserId,
    AggregateId,
) {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let tenant_id = TenantId::new();
    let seller_id = UserId::new();
    let listing_id = AggregateId::new();
    (dispatcher, tenant_id, seller_id, listing_id)
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // Benchmark: CreateListing command (first command, no history)
    group.bench_function("create_listing_fresh", |b| {
        let (dispatcher, tenant_id, seller_id, _) = setup_event_sourcing();
        b.iter(|| {
            let listing_id = AggregateId::new();
            dispatcher
                .dispatch(
                    tenant_id,
                    listing_id,
                    "listings.listing",
                    create_cmd(tenant_id, ListingId::new(black_box(listing_id)), seller_id),
                    |_, id| Listing::empty(ListingId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: AdjustStock command after creation (with history)
    group.bench_function("adjust_stock_with_history", |b| {
        let (dispatcher, tenant_id, seller_id, listing_id) = setup_event_sourcing();
        let listing_id_typed = ListingId::new(listing_id);

        // Create listing once
        dispatcher
            .dispatch(
                tenant_id,
                listing_id,
                "listings.listing",
                create_cmd(tenant_id, listing_id_typed, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            let adjust_cmd = AdjustStock {
                tenant_id,
                listing_id: listing_id_typed,
                actor_id: seller_id,
                actor_is_staff: false,
                delta: black_box(5),
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    tenant_id,
                    listing_id,
                    "listings.listing",
                    ListingCommand::AdjustStock(adjust_cmd),
                    |_, id| Listing::empty(ListingId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");
    group.throughput(Throughput::Elements(1));

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let listing_id = AggregateId::new();

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = ListingEvent::StockAdjusted(StockAdjusted {
                                tenant_id,
                                listing_id: ListingId::new(listing_id),
                                delta: i as i64,
                                new_stock: i as u32,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                tenant_id,
                                listing_id,
                                "listings.listing",
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(
                        store
                            .append(events, motormart_core::ExpectedVersion::Any)
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let seller_id = UserId::new();
                let listing_id = AggregateId::new();
                let listing_id_typed = ListingId::new(listing_id);

                // Pre-generate events
                let mut all_envelopes = Vec::new();
                {
                    let create_event = ListingEvent::ListingCreated(ListingCreated {
                        tenant_id,
                        listing_id: listing_id_typed,
                        seller_id,
                        title: "Benchmark Car".to_string(),
                        condition: Condition::Used,
                        details: bench_details(),
                        price_cents: 2_000_000,
                        stock: 1,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        tenant_id,
                        listing_id,
                        "listings.listing",
                        uuid::Uuid::now_v7(),
                        &create_event,
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], motormart_core::ExpectedVersion::Any)
                        .unwrap();
                    all_envelopes.push(stored[0].to_envelope());

                    // Add stock adjustments
                    for i in 0..(count - 1) {
                        let adjust_event = ListingEvent::StockAdjusted(StockAdjusted {
                            tenant_id,
                            listing_id: listing_id_typed,
                            delta: (i % 10) as i64,
                            new_stock: (1 + i % 10) as u32,
                            occurred_at: Utc::now(),
                        });
                        let uncommitted = UncommittedEvent::from_typed(
                            tenant_id,
                            listing_id,
                            "listings.listing",
                            uuid::Uuid::now_v7(),
                            &adjust_event,
                        )
                        .unwrap();
                        let stored = store
                            .append(
                                vec![uncommitted],
                                motormart_core::ExpectedVersion::Exact((i + 1) as u64),
                            )
                            .unwrap();
                        all_envelopes.push(stored[0].to_envelope());
                    }
                }

                let read_model_store: Arc<InMemoryTenantStore<ListingId, ListingReadModel>> =
                    Arc::new(InMemoryTenantStore::new());
                let projection = CatalogProjection::new(read_model_store);

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(all_envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_event_sourcing_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_sourcing_vs_naive_crud");
    group.sample_size(1000);

    // Benchmark: Event sourcing (create + adjust)
    group.bench_function("event_sourcing_create_and_adjust", |b| {
        let (dispatcher, tenant_id, seller_id, _) = setup_event_sourcing();

        b.iter(|| {
            let listing_id = AggregateId::new();
            let listing_id_typed = ListingId::new(listing_id);

            dispatcher
                .dispatch(
                    tenant_id,
                    listing_id,
                    "listings.listing",
                    create_cmd(tenant_id, listing_id_typed, seller_id),
                    |_, id| Listing::empty(ListingId::new(id)),
                )
                .unwrap();

            let adjust_cmd = AdjustStock {
                tenant_id,
                listing_id: listing_id_typed,
                actor_id: seller_id,
                actor_is_staff: false,
                delta: 10,
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    tenant_id,
                    listing_id,
                    "listings.listing",
                    ListingCommand::AdjustStock(adjust_cmd),
                    |_, id| Listing::empty(ListingId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: Naive CRUD (create + adjust)
    group.bench_function("naive_crud_create_and_adjust", |b| {
        let store = NaiveCrudStore::new();
        let tenant_id = TenantId::new();
        let listing_id = AggregateId::new();

        b.iter(|| {
            store.create(tenant_id, listing_id, "Benchmark Car".to_string());
            store.adjust_stock(tenant_id, listing_id, 10).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_event_sourcing_vs_naive_crud
);
criterion_main!(benches);
