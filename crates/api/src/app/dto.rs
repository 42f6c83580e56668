use serde::Deserialize;

use motormart_infra::projections::{
    carts::CartReadModel,
    listings::{CatalogPage, ListingReadModel},
    messages::MessageReadModel,
    orders::{DashboardSummary, OrderReadModel},
    purchase_requests::PurchaseRequestReadModel,
    users::UserReadModel,
    wishlists::WishlistReadModel,
};
use motormart_listings::{Condition, ListingDetails};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub condition: Condition,
    pub details: ListingDetails,
    pub price_cents: u64,
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub condition: Option<Condition>,
    pub details: Option<ListingDetails>,
}

#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    pub price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveListingRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectListingRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<Condition>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub min_year: Option<i32>,
    pub max_mileage: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub listing_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetCartQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub listing_id: Option<String>,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequestRequest {
    pub listing_id: String,
    pub message: String,
    pub offered_price_cents: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RespondToRequestRequest {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendUserRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn listing_to_json(rm: ListingReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.listing_id.to_string(),
        "seller_id": rm.seller_id.to_string(),
        "title": rm.title,
        "condition": rm.condition,
        "details": rm.details,
        "price_cents": rm.price_cents,
        "stock": rm.stock,
        "approval": rm.approval,
        "review_note": rm.review_note,
        "created_at": rm.created_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn catalog_page_to_json(page: CatalogPage) -> serde_json::Value {
    serde_json::json!({
        "page": page.page,
        "total": page.total,
        "total_pages": page.total_pages,
        "listings": page.listings.into_iter().map(listing_to_json).collect::<Vec<_>>(),
    })
}

pub fn order_to_json(rm: OrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.to_string(),
        "buyer_id": rm.buyer_id.to_string(),
        "customer_name": rm.customer_name,
        "customer_email": rm.customer_email,
        "delivery_address": rm.delivery_address,
        "payment_method": rm.payment_method,
        "status": rm.status.as_str(),
        "status_color": rm.status.status_color(),
        "can_be_cancelled": rm.status.can_be_cancelled(),
        "can_be_updated": rm.status.can_be_updated(),
        "total_cents": rm.total_cents,
        "placed_at": rm.placed_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "listing_id": l.listing_id.to_string(),
            "listing_name": l.listing_name,
            "quantity": l.quantity,
            "unit_price_cents": l.unit_price_cents,
            "seller_id": l.seller_id.to_string(),
        })).collect::<Vec<_>>(),
    })
}

pub fn cart_to_json(rm: CartReadModel) -> serde_json::Value {
    let subtotal = rm.subtotal_cents();
    let count = rm.item_count();
    serde_json::json!({
        "id": rm.cart_id.to_string(),
        "buyer_id": rm.buyer_id.to_string(),
        "subtotal_cents": subtotal,
        "item_count": count,
        "updated_at": rm.updated_at.to_rfc3339(),
        "items": rm.items.into_iter().map(|i| serde_json::json!({
            "listing_id": i.listing_id.to_string(),
            "listing_name": i.listing_name,
            "unit_price_cents": i.unit_price_cents,
            "quantity": i.quantity,
        })).collect::<Vec<_>>(),
    })
}

pub fn wishlist_to_json(rm: WishlistReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.wishlist_id.to_string(),
        "buyer_id": rm.buyer_id.to_string(),
        "listings": rm.listings.into_iter().map(|l| l.to_string()).collect::<Vec<_>>(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn message_to_json(rm: MessageReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.message_id.to_string(),
        "sender_id": rm.sender_id.to_string(),
        "recipient_id": rm.recipient_id.to_string(),
        "listing_id": rm.listing_id.map(|l| l.to_string()),
        "subject": rm.subject,
        "body": rm.body,
        "read": rm.read,
        "sent_at": rm.sent_at.to_rfc3339(),
    })
}

pub fn purchase_request_to_json(rm: PurchaseRequestReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.request_id.to_string(),
        "buyer_id": rm.buyer_id.to_string(),
        "seller_id": rm.seller_id.to_string(),
        "listing_id": rm.listing_id.to_string(),
        "message": rm.message,
        "offered_price_cents": rm.offered_price_cents,
        "response": rm.response,
        "status": rm.status.as_str(),
        "created_at": rm.created_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn user_to_json(rm: UserReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.user_id.to_string(),
        "email": rm.email,
        "display_name": rm.display_name,
        "roles": rm.roles,
        "status": rm.status,
        "phone": rm.phone,
        "address": rm.address,
        "city": rm.city,
        "country": rm.country,
        "created_at": rm.created_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn dashboard_to_json(summary: DashboardSummary) -> serde_json::Value {
    serde_json::json!({
        "total_orders": summary.total_orders,
        "revenue_cents": summary.revenue_cents,
        "status_counts": summary.status_counts.into_iter()
            .map(|(status, count)| serde_json::json!({ "status": status, "count": count }))
            .collect::<Vec<_>>(),
        "monthly_revenue": summary.monthly_revenue.into_iter()
            .map(|m| serde_json::json!({
                "year": m.year,
                "month": m.month,
                "revenue_cents": m.revenue_cents,
            }))
            .collect::<Vec<_>>(),
        "recent_orders": summary.recent_orders.into_iter().map(order_to_json).collect::<Vec<_>>(),
    })
}
