use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use motormart_core::{AggregateId, DomainError, TenantId, UserId};
use motormart_events::{EventBus, EventEnvelope, InMemoryEventBus};
use motormart_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{
        EventFilter, EventQuery, EventQueryResult, EventStoreError, InMemoryEventStore,
        Pagination, StoredEvent,
    },
    projections::{
        carts::{CartReadModel, CartsProjection},
        cursor_store::PostgresCursorStore,
        listings::{
            CatalogFilter, CatalogPage, CatalogProjection, CatalogSort, ListingReadModel,
        },
        messages::{MessageReadModel, MessagesProjection},
        orders::{DashboardSummary, OrderReadModel, OrdersProjection},
        purchase_requests::{PurchaseRequestReadModel, PurchaseRequestsProjection},
        users::{EffectivePermissions, UserReadModel, UsersProjection},
        wishlists::{WishlistReadModel, WishlistsProjection},
    },
    read_model::InMemoryTenantStore,
    workers::{ProjectionWorker, WorkerHandle},
};
use motormart_listings::ListingId;
use motormart_messaging::{MessageId, PurchaseRequestId};
use motormart_notify::{EmailSender, LogEmailSender};
use motormart_orders::OrderId;
use motormart_payments::{PaymentService, SimulatedPaymentGateway};
use motormart_shopping::{CartId, WishlistId};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
type ApiDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

type CatalogStore = Arc<InMemoryTenantStore<ListingId, ListingReadModel>>;
type OrdersStore = Arc<InMemoryTenantStore<OrderId, OrderReadModel>>;

/// Catalog and orders projections, with either in-memory or
/// Postgres-persisted cursors depending on deployment.
///
/// Read model data itself stays in memory; the cursor store only makes
/// idempotency survive a restart when `DATABASE_URL` is configured.
#[derive(Clone)]
pub enum TrackedProjections {
    InMemory {
        catalog: Arc<CatalogProjection<CatalogStore>>,
        orders: Arc<OrdersProjection<OrdersStore>>,
    },
    PersistentCursors {
        catalog: Arc<CatalogProjection<CatalogStore, PostgresCursorStore>>,
        orders: Arc<OrdersProjection<OrdersStore, PostgresCursorStore>>,
    },
}

impl TrackedProjections {
    /// Apply one envelope to whichever tracked projection owns it.
    fn apply(&self, envelope: &EventEnvelope<serde_json::Value>) -> Result<(), String> {
        match envelope.aggregate_type() {
            "listings.listing" => match self {
                TrackedProjections::InMemory { catalog, .. } => {
                    catalog.apply_envelope(envelope).map_err(|e| e.to_string())
                }
                TrackedProjections::PersistentCursors { catalog, .. } => {
                    catalog.apply_envelope(envelope).map_err(|e| e.to_string())
                }
            },
            "orders.order" => match self {
                TrackedProjections::InMemory { orders, .. } => {
                    orders.apply_envelope(envelope).map_err(|e| e.to_string())
                }
                TrackedProjections::PersistentCursors { orders, .. } => {
                    orders.apply_envelope(envelope).map_err(|e| e.to_string())
                }
            },
            _ => Ok(()),
        }
    }
}

/// Shared application services wired at startup.
pub struct AppServices {
    dispatcher: Arc<ApiDispatcher>,
    event_store: Arc<InMemoryEventStore>,
    tracked: TrackedProjections,
    carts: Arc<CartsProjection<Arc<InMemoryTenantStore<CartId, CartReadModel>>>>,
    wishlists: Arc<WishlistsProjection<Arc<InMemoryTenantStore<WishlistId, WishlistReadModel>>>>,
    messages: Arc<MessagesProjection<Arc<InMemoryTenantStore<MessageId, MessageReadModel>>>>,
    requests: Arc<
        PurchaseRequestsProjection<
            Arc<InMemoryTenantStore<PurchaseRequestId, PurchaseRequestReadModel>>,
        >,
    >,
    users: Arc<UsersProjection<Arc<InMemoryTenantStore<UserId, UserReadModel>>>>,
    email: Arc<dyn EmailSender>,
    payments: Arc<dyn PaymentService>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    // Keeps the bus-to-projection thread alive for the server's lifetime.
    _projection_worker: WorkerHandle,
}

pub async fn build_services() -> AppServices {
    // In-memory infra wiring: store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let catalog_store: CatalogStore = Arc::new(InMemoryTenantStore::new());
    let orders_store: OrdersStore = Arc::new(InMemoryTenantStore::new());

    // Cursors persist to Postgres when DATABASE_URL is configured.
    let tracked = match std::env::var("DATABASE_URL") {
        Ok(url) => match sqlx::PgPool::connect(&url).await {
            Ok(pool) => {
                // The cursor store issues its queries from the projection
                // worker thread, so it needs this runtime's handle.
                let cursors = Arc::new(PostgresCursorStore::new(
                    pool,
                    tokio::runtime::Handle::current(),
                ));
                TrackedProjections::PersistentCursors {
                    catalog: Arc::new(
                        CatalogProjection::new(catalog_store)
                            .with_persistent_cursors(cursors.clone(), "listings.catalog"),
                    ),
                    orders: Arc::new(
                        OrdersProjection::new(orders_store)
                            .with_persistent_cursors(cursors, "orders.orders"),
                    ),
                }
            }
            Err(e) => {
                tracing::warn!("DATABASE_URL set but connection failed ({e}); using in-memory cursors");
                TrackedProjections::InMemory {
                    catalog: Arc::new(CatalogProjection::new(catalog_store)),
                    orders: Arc::new(OrdersProjection::new(orders_store)),
                }
            }
        },
        Err(_) => TrackedProjections::InMemory {
            catalog: Arc::new(CatalogProjection::new(catalog_store)),
            orders: Arc::new(OrdersProjection::new(orders_store)),
        },
    };

    let carts_store: Arc<InMemoryTenantStore<CartId, CartReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let carts = Arc::new(CartsProjection::new(carts_store));

    let wishlists_store: Arc<InMemoryTenantStore<WishlistId, WishlistReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let wishlists = Arc::new(WishlistsProjection::new(wishlists_store));

    let messages_store: Arc<InMemoryTenantStore<MessageId, MessageReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let messages = Arc::new(MessagesProjection::new(messages_store));

    let requests_store: Arc<InMemoryTenantStore<PurchaseRequestId, PurchaseRequestReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let requests = Arc::new(PurchaseRequestsProjection::new(requests_store));

    let users_store: Arc<InMemoryTenantStore<UserId, UserReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let users = Arc::new(UsersProjection::new(users_store));

    let email: Arc<dyn EmailSender> = Arc::new(LogEmailSender::new());
    let payments: Arc<dyn PaymentService> = Arc::new(SimulatedPaymentGateway::new());

    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> projections -> realtime fan-out.
    let projection_worker = {
        let tracked = tracked.clone();
        let carts = carts.clone();
        let wishlists = wishlists.clone();
        let messages = messages.clone();
        let requests = requests.clone();
        let users = users.clone();
        let realtime_tx = realtime_tx.clone();
        ProjectionWorker::spawn(
            "api.projections",
            bus.clone(),
            None,
            move |env: EventEnvelope<serde_json::Value>| -> Result<(), String> {
                let at = env.aggregate_type();

                // Apply to the relevant projection only.
                match at {
                    "listings.listing" | "orders.order" => tracked.apply(&env)?,
                    "shopping.cart" => carts.apply_envelope(&env).map_err(|e| e.to_string())?,
                    "shopping.wishlist" => {
                        wishlists.apply_envelope(&env).map_err(|e| e.to_string())?
                    }
                    "messaging.message" => {
                        messages.apply_envelope(&env).map_err(|e| e.to_string())?
                    }
                    "messaging.purchase_request" => {
                        requests.apply_envelope(&env).map_err(|e| e.to_string())?
                    }
                    "auth.user" => users.apply_envelope(&env).map_err(|e| e.to_string())?,
                    _ => return Ok(()),
                }

                // Broadcast projection update (lossy; no backpressure on core).
                let _ = realtime_tx.send(RealtimeMessage {
                    tenant_id: env.tenant_id(),
                    topic: format!("{at}.projection_updated"),
                    payload: serde_json::json!({
                        "kind": "projection_update",
                        "aggregate_type": at,
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                    }),
                });
                Ok(())
            },
        )
    };

    let dispatcher: Arc<ApiDispatcher> = Arc::new(CommandDispatcher::new(store.clone(), bus));
    AppServices {
        dispatcher,
        event_store: store,
        tracked,
        carts,
        wishlists,
        messages,
        requests,
        users,
        email,
        payments,
        realtime_tx,
        _projection_worker: projection_worker,
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn email(&self) -> &Arc<dyn EmailSender> {
        &self.email
    }

    pub fn payments(&self) -> &Arc<dyn PaymentService> {
        &self.payments
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: motormart_core::Aggregate<Error = DomainError>,
        A::Event: motormart_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    // ───────────────────────── catalog (listings) ─────────────────────────

    pub fn catalog_get(
        &self,
        tenant_id: TenantId,
        listing_id: &ListingId,
    ) -> Option<ListingReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => catalog.get(tenant_id, listing_id),
            TrackedProjections::PersistentCursors { catalog, .. } => {
                catalog.get(tenant_id, listing_id)
            }
        }
    }

    pub fn catalog_browse(
        &self,
        tenant_id: TenantId,
        filter: &CatalogFilter,
        sort: CatalogSort,
        page: usize,
    ) -> CatalogPage {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => {
                catalog.browse(tenant_id, filter, sort, page)
            }
            TrackedProjections::PersistentCursors { catalog, .. } => {
                catalog.browse(tenant_id, filter, sort, page)
            }
        }
    }

    pub fn catalog_for_seller(
        &self,
        tenant_id: TenantId,
        seller_id: UserId,
    ) -> Vec<ListingReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => {
                catalog.list_for_seller(tenant_id, seller_id)
            }
            TrackedProjections::PersistentCursors { catalog, .. } => {
                catalog.list_for_seller(tenant_id, seller_id)
            }
        }
    }

    pub fn catalog_pending_review(&self, tenant_id: TenantId) -> Vec<ListingReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => catalog.pending_review(tenant_id),
            TrackedProjections::PersistentCursors { catalog, .. } => {
                catalog.pending_review(tenant_id)
            }
        }
    }

    pub fn catalog_categories(&self, tenant_id: TenantId) -> Vec<String> {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => catalog.categories(tenant_id),
            TrackedProjections::PersistentCursors { catalog, .. } => catalog.categories(tenant_id),
        }
    }

    pub fn catalog_brands(&self, tenant_id: TenantId) -> Vec<String> {
        match &self.tracked {
            TrackedProjections::InMemory { catalog, .. } => catalog.brands(tenant_id),
            TrackedProjections::PersistentCursors { catalog, .. } => catalog.brands(tenant_id),
        }
    }

    // ───────────────────────────── orders ─────────────────────────────

    pub fn orders_get(&self, tenant_id: TenantId, order_id: &OrderId) -> Option<OrderReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => orders.get(tenant_id, order_id),
            TrackedProjections::PersistentCursors { orders, .. } => orders.get(tenant_id, order_id),
        }
    }

    pub fn orders_list(&self, tenant_id: TenantId) -> Vec<OrderReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => orders.list(tenant_id),
            TrackedProjections::PersistentCursors { orders, .. } => orders.list(tenant_id),
        }
    }

    pub fn orders_for_buyer(&self, tenant_id: TenantId, buyer_id: UserId) -> Vec<OrderReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => {
                orders.list_for_buyer(tenant_id, buyer_id)
            }
            TrackedProjections::PersistentCursors { orders, .. } => {
                orders.list_for_buyer(tenant_id, buyer_id)
            }
        }
    }

    pub fn orders_for_seller(&self, tenant_id: TenantId, seller_id: UserId) -> Vec<OrderReadModel> {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => {
                orders.list_for_seller(tenant_id, seller_id)
            }
            TrackedProjections::PersistentCursors { orders, .. } => {
                orders.list_for_seller(tenant_id, seller_id)
            }
        }
    }

    pub fn orders_dashboard(
        &self,
        tenant_id: TenantId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DashboardSummary {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => orders.dashboard(tenant_id, now),
            TrackedProjections::PersistentCursors { orders, .. } => orders.dashboard(tenant_id, now),
        }
    }

    pub fn orders_dashboard_for_seller(
        &self,
        tenant_id: TenantId,
        seller_id: UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DashboardSummary {
        match &self.tracked {
            TrackedProjections::InMemory { orders, .. } => {
                orders.dashboard_for_seller(tenant_id, seller_id, now)
            }
            TrackedProjections::PersistentCursors { orders, .. } => {
                orders.dashboard_for_seller(tenant_id, seller_id, now)
            }
        }
    }

    // ─────────────────── carts / wishlists / messaging ───────────────────

    pub fn cart_for_buyer(&self, tenant_id: TenantId, buyer_id: UserId) -> Option<CartReadModel> {
        self.carts.for_buyer(tenant_id, buyer_id)
    }

    pub fn wishlist_for_buyer(
        &self,
        tenant_id: TenantId,
        buyer_id: UserId,
    ) -> Option<WishlistReadModel> {
        self.wishlists.for_buyer(tenant_id, buyer_id)
    }

    pub fn wishlist_is_saved(
        &self,
        tenant_id: TenantId,
        buyer_id: UserId,
        listing_id: ListingId,
    ) -> bool {
        self.wishlists.is_saved(tenant_id, buyer_id, listing_id)
    }

    pub fn messages_get(
        &self,
        tenant_id: TenantId,
        message_id: &MessageId,
    ) -> Option<MessageReadModel> {
        self.messages.get(tenant_id, message_id)
    }

    pub fn messages_inbox(&self, tenant_id: TenantId, user_id: UserId) -> Vec<MessageReadModel> {
        self.messages.inbox(tenant_id, user_id)
    }

    pub fn messages_sent(&self, tenant_id: TenantId, user_id: UserId) -> Vec<MessageReadModel> {
        self.messages.sent(tenant_id, user_id)
    }

    pub fn messages_unread_count(&self, tenant_id: TenantId, user_id: UserId) -> usize {
        self.messages.unread_count(tenant_id, user_id)
    }

    pub fn requests_get(
        &self,
        tenant_id: TenantId,
        request_id: &PurchaseRequestId,
    ) -> Option<PurchaseRequestReadModel> {
        self.requests.get(tenant_id, request_id)
    }

    pub fn requests_for_buyer(
        &self,
        tenant_id: TenantId,
        buyer_id: UserId,
    ) -> Vec<PurchaseRequestReadModel> {
        self.requests.list_for_buyer(tenant_id, buyer_id)
    }

    pub fn requests_for_seller(
        &self,
        tenant_id: TenantId,
        seller_id: UserId,
    ) -> Vec<PurchaseRequestReadModel> {
        self.requests.list_for_seller(tenant_id, seller_id)
    }

    // ───────────────────────────── users ─────────────────────────────

    pub fn users_get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.users.get(tenant_id, user_id)
    }

    pub fn users_list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.users.list(tenant_id)
    }

    pub fn users_get_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        self.users.get_by_email(tenant_id, email)
    }

    pub fn users_effective_permissions<F>(
        &self,
        tenant_id: TenantId,
        user_id: &UserId,
        role_permissions: F,
    ) -> Option<EffectivePermissions>
    where
        F: Fn(&str) -> Vec<String>,
    {
        self.users
            .effective_permissions(tenant_id, user_id, role_permissions)
    }

    // ──────────────────────── event inspection ────────────────────────

    /// Query events with filters and pagination.
    pub async fn query_events(
        &self,
        tenant_id: TenantId,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        self.event_store
            .query_events(tenant_id, filter, pagination)
            .await
    }

    /// Get events for a specific aggregate.
    pub async fn get_aggregate_events(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        pagination: Option<Pagination>,
    ) -> Result<EventQueryResult, EventStoreError> {
        self.event_store
            .get_aggregate_events(tenant_id, aggregate_id, pagination)
            .await
    }

    /// Get a single event by its ID.
    pub async fn get_event_by_id(
        &self,
        tenant_id: TenantId,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        self.event_store.get_event_by_id(tenant_id, event_id).await
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
