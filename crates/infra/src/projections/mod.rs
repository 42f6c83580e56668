//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: reconstructable from the event stream
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe under at-least-once delivery

pub mod cursor_store;

// Domain projections
pub mod carts;
pub mod listings;
pub mod messages;
pub mod orders;
pub mod purchase_requests;
pub mod users;
pub mod wishlists;

pub use cursor_store::{InMemoryCursorStore, PostgresCursorStore, ProjectionCursorStore};

pub use carts::{CartReadModel, CartsProjection};
pub use listings::{
    CatalogFilter, CatalogPage, CatalogProjection, CatalogProjectionError, CatalogSort,
    ListingReadModel, CATALOG_PAGE_SIZE,
};
pub use messages::{MessageReadModel, MessagesProjection};
pub use orders::{DashboardSummary, OrderReadModel, OrdersProjection, OrdersProjectionError};
pub use purchase_requests::{PurchaseRequestReadModel, PurchaseRequestsProjection};
pub use users::{default_role_permissions, EffectivePermissions, UserReadModel, UsersProjection};
pub use wishlists::{WishlistReadModel, WishlistsProjection};
