use axum::{
    routing::{get, put},
    Router,
};

pub mod admin;
pub mod cart;
pub mod common;
pub mod dashboard;
pub mod events;
pub mod listings;
pub mod messages;
pub mod orders;
pub mod rbac;
pub mod requests;
pub mod system;
pub mod wishlist;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .route("/profile", put(admin::update_my_profile))
        .nest("/catalog", listings::catalog_router())
        .nest("/listings", listings::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/wishlist", wishlist::router())
        .nest("/messages", messages::router())
        .nest("/requests", requests::router())
        .nest("/dashboard", dashboard::router())
        .nest("/admin", admin::router())
        .nest("/admin/rbac", rbac::router())
        .nest("/admin/events", events::router())
}
