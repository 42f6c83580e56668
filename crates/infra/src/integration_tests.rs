//! Integration tests for the full event-sourced pipeline.
//!
//! Command -> EventStore -> EventBus -> Projection -> ReadModel
//!
//! Verifies that commands update read models, tenant isolation holds, and
//! optimistic concurrency conflicts surface.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::sync::Arc;

    use motormart_core::{AggregateId, TenantId, UserId};
    use motormart_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use motormart_listings::{
        AdjustStock, ApproveListing, Condition, CreateListing, Listing, ListingCommand,
        ListingDetails, ListingId,
    };

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::InMemoryEventStore;
    use crate::projections::listings::{
        CatalogFilter, CatalogProjection, CatalogSort, ListingReadModel,
    };
    use crate::read_model::InMemoryTenantStore;

    type Dispatcher =
        CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;
    type Catalog =
        CatalogProjection<Arc<InMemoryTenantStore<ListingId, ListingReadModel>>>;

    fn details() -> ListingDetails {
        ListingDetails {
            brand: "Volkswagen".to_string(),
            model_year: 2019,
            category: "hatchback".to_string(),
            mileage: 42_000,
            fuel_type: Some("petrol".to_string()),
            transmission: None,
            color: None,
            vin: None,
            engine_size: None,
            horsepower: None,
            doors: None,
            seats: None,
            description: "One owner.".to_string(),
            features: vec![],
            image_url: None,
            location: None,
            rating: None,
        }
    }

    fn setup() -> (Dispatcher, Arc<Catalog>) {
        let store = InMemoryEventStore::new();
        let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
            Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store, bus.clone());
        let read_store: Arc<InMemoryTenantStore<ListingId, ListingReadModel>> =
            Arc::new(InMemoryTenantStore::new());
        let projection = Arc::new(CatalogProjection::new(read_store));

        // Subscribe before any events are published.
        let projection_clone = projection.clone();
        let bus_clone = bus.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let sub = bus_clone.subscribe();
            let _ = ready_tx.send(());
            while let Ok(env) = sub.recv() {
                if let Err(e) = projection_clone.apply_envelope(&env) {
                    eprintln!("Failed to apply envelope: {e:?}");
                }
            }
        });
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

        (dispatcher, projection)
    }

    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn create_cmd(tenant_id: TenantId, listing_id: ListingId, seller_id: UserId) -> ListingCommand {
        ListingCommand::CreateListing(CreateListing {
            tenant_id,
            listing_id,
            seller_id,
            title: "2019 Golf GTI".to_string(),
            condition: Condition::Used,
            details: details(),
            price_cents: 1_800_000,
            stock: 1,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_and_approve_reaches_catalog() {
        let (dispatcher, projection) = setup();
        let tenant_id = TenantId::new();
        let seller_id = UserId::new();
        let listing_id = ListingId::new(AggregateId::new());

        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_id, listing_id, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();
        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                ListingCommand::ApproveListing(ApproveListing {
                    tenant_id,
                    listing_id,
                    note: None,
                    occurred_at: Utc::now(),
                }),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        wait_for_processing();

        let page =
            projection.browse(tenant_id, &CatalogFilter::default(), CatalogSort::Newest, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.listings[0].title, "2019 Golf GTI");
    }

    #[test]
    fn stock_adjustment_flows_to_read_model() {
        let (dispatcher, projection) = setup();
        let tenant_id = TenantId::new();
        let seller_id = UserId::new();
        let listing_id = ListingId::new(AggregateId::new());

        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_id, listing_id, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();
        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                ListingCommand::AdjustStock(AdjustStock {
                    tenant_id,
                    listing_id,
                    actor_id: seller_id,
                    actor_is_staff: false,
                    delta: 3,
                    occurred_at: Utc::now(),
                }),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        wait_for_processing();

        let rm = projection.get(tenant_id, &listing_id).unwrap();
        assert_eq!(rm.stock, 4);
    }

    #[test]
    fn tenant_isolation_across_pipeline() {
        let (dispatcher, projection) = setup();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let listing_id = ListingId::new(AggregateId::new());

        dispatcher
            .dispatch(
                tenant_a,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_a, listing_id, UserId::new()),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        wait_for_processing();

        assert!(projection.get(tenant_a, &listing_id).is_some());
        assert!(projection.get(tenant_b, &listing_id).is_none());
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let (dispatcher, _) = setup();
        let tenant_id = TenantId::new();
        let seller_id = UserId::new();
        let listing_id = ListingId::new(AggregateId::new());

        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_id, listing_id, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        let err = dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_id, listing_id, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn oversell_is_rejected_by_the_aggregate() {
        let (dispatcher, _) = setup();
        let tenant_id = TenantId::new();
        let seller_id = UserId::new();
        let listing_id = ListingId::new(AggregateId::new());

        dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                create_cmd(tenant_id, listing_id, seller_id),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap();

        let err = dispatcher
            .dispatch(
                tenant_id,
                listing_id.0,
                "listings.listing",
                ListingCommand::AdjustStock(AdjustStock {
                    tenant_id,
                    listing_id,
                    actor_id: seller_id,
                    actor_is_staff: false,
                    delta: -2,
                    occurred_at: Utc::now(),
                }),
                |_, id| Listing::empty(ListingId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));
    }
}
