//! Catalog projection: the browsable listing read model.
//!
//! Backs the public catalog (approved, in-stock listings with filtering,
//! sorting, and fixed-size pages) and the seller's own-listings view.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use motormart_core::{AggregateId, TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_listings::{ApprovalStatus, Condition, ListingDetails, ListingEvent, ListingId};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::read_model::TenantStore;

/// Catalog pages are fixed at 12 cards to match the storefront grid.
pub const CATALOG_PAGE_SIZE: usize = 12;

/// Queryable listing read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReadModel {
    pub listing_id: ListingId,
    pub seller_id: UserId,
    pub title: String,
    pub condition: Condition,
    pub details: ListingDetails,
    pub price_cents: u64,
    pub stock: u32,
    pub approval: ApprovalStatus,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingReadModel {
    /// Visible in the public catalog: approved with stock on hand.
    pub fn is_on_market(&self) -> bool {
        self.approval == ApprovalStatus::Approved && self.stock > 0
    }
}

/// Filter criteria for catalog browsing. Fields combine with AND semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<Condition>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub min_year: Option<i32>,
    pub max_mileage: Option<u32>,
    /// Case-insensitive substring match against title, description and brand.
    pub search: Option<String>,
}

impl CatalogFilter {
    fn matches(&self, rm: &ListingReadModel) -> bool {
        if let Some(ref category) = self.category {
            if !rm.details.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(ref brand) = self.brand {
            if !rm.details.brand.eq_ignore_ascii_case(brand) {
                return false;
            }
        }
        if let Some(condition) = self.condition {
            if rm.condition != condition {
                return false;
            }
        }
        if let Some(min) = self.min_price_cents {
            if rm.price_cents < min {
                return false;
            }
        }
        if let Some(max) = self.max_price_cents {
            if rm.price_cents > max {
                return false;
            }
        }
        if let Some(min_year) = self.min_year {
            if rm.details.model_year < min_year {
                return false;
            }
        }
        if let Some(max_mileage) = self.max_mileage {
            if rm.details.mileage > max_mileage {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                rm.title, rm.details.brand, rm.details.description
            )
            .to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Sort order for catalog pages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    /// Newest first (default).
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YearDesc,
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    pub listings: Vec<ListingReadModel>,
    pub page: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize listing event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct CatalogProjection<S, C = InMemoryCursorStore>
where
    S: TenantStore<ListingId, ListingReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
    cursor_store: Option<Arc<C>>,
    projection_name: String,
}

impl<S> CatalogProjection<S>
where
    S: TenantStore<ListingId, ListingReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: None,
            projection_name: "listings.catalog".to_string(),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
        projection_name: impl Into<String>,
    ) -> CatalogProjection<S, C> {
        CatalogProjection {
            store: self.store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: Some(cursor_store),
            projection_name: projection_name.into(),
        }
    }
}

impl<S, C> CatalogProjection<S, C>
where
    S: TenantStore<ListingId, ListingReadModel>,
    C: ProjectionCursorStore + 'static,
{
    fn get_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store
                .get_cursor(tenant_id, aggregate_id, &self.projection_name)
                .unwrap_or(0)
        } else {
            match self.cursors.read() {
                Ok(cursors) => *cursors
                    .get(&CursorKey {
                        tenant_id,
                        aggregate_id,
                    })
                    .unwrap_or(&0),
                Err(_) => 0,
            }
        }
    }

    fn update_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                sequence_number,
            );
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.update_cursor(
                tenant_id,
                aggregate_id,
                &self.projection_name,
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.clear_cursors(tenant_id, &self.projection_name);
        }
    }

    pub fn get(&self, tenant_id: TenantId, listing_id: &ListingId) -> Option<ListingReadModel> {
        self.store.get(tenant_id, listing_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ListingReadModel> {
        self.store.list(tenant_id)
    }

    /// Listings owned by one seller, any approval status, newest first.
    pub fn list_for_seller(&self, tenant_id: TenantId, seller_id: UserId) -> Vec<ListingReadModel> {
        let mut listings: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.seller_id == seller_id)
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    /// Listings awaiting review, oldest first so moderators see the queue in
    /// arrival order.
    pub fn pending_review(&self, tenant_id: TenantId) -> Vec<ListingReadModel> {
        let mut listings: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.approval == ApprovalStatus::Pending)
            .collect();
        listings.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        listings
    }

    /// Browse the public catalog: on-market listings only, filtered, sorted,
    /// paged at [`CATALOG_PAGE_SIZE`]. `page` is 1-based; an out-of-range page
    /// yields an empty listing set with correct totals.
    pub fn browse(
        &self,
        tenant_id: TenantId,
        filter: &CatalogFilter,
        sort: CatalogSort,
        page: usize,
    ) -> CatalogPage {
        let mut matched: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.is_on_market() && filter.matches(rm))
            .collect();

        match sort {
            CatalogSort::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            CatalogSort::PriceAsc => matched.sort_by_key(|rm| rm.price_cents),
            CatalogSort::PriceDesc => {
                matched.sort_by(|a, b| b.price_cents.cmp(&a.price_cents))
            }
            CatalogSort::YearDesc => {
                matched.sort_by(|a, b| b.details.model_year.cmp(&a.details.model_year))
            }
        }

        let total = matched.len();
        let total_pages = total.div_ceil(CATALOG_PAGE_SIZE);
        let page = page.max(1);
        let listings = matched
            .into_iter()
            .skip((page - 1) * CATALOG_PAGE_SIZE)
            .take(CATALOG_PAGE_SIZE)
            .collect();

        CatalogPage {
            listings,
            page,
            total,
            total_pages,
        }
    }

    /// Distinct categories across on-market listings, sorted.
    pub fn categories(&self, tenant_id: TenantId) -> Vec<String> {
        self.distinct(tenant_id, |rm| rm.details.category.clone())
    }

    /// Distinct brands across on-market listings, sorted.
    pub fn brands(&self, tenant_id: TenantId) -> Vec<String> {
        self.distinct(tenant_id, |rm| rm.details.brand.clone())
    }

    fn distinct(&self, tenant_id: TenantId, f: impl Fn(&ListingReadModel) -> String) -> Vec<String> {
        let mut values: Vec<String> = self
            .store
            .list(tenant_id)
            .iter()
            .filter(|rm| rm.is_on_market())
            .map(f)
            .collect();
        values.sort();
        values.dedup();
        values
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "listings.listing" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ListingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, listing_id) = match &ev {
            ListingEvent::ListingCreated(e) => (e.tenant_id, e.listing_id),
            ListingEvent::ListingUpdated(e) => (e.tenant_id, e.listing_id),
            ListingEvent::ListingResubmitted(e) => (e.tenant_id, e.listing_id),
            ListingEvent::PriceSet(e) => (e.tenant_id, e.listing_id),
            ListingEvent::StockAdjusted(e) => (e.tenant_id, e.listing_id),
            ListingEvent::ListingApproved(e) => (e.tenant_id, e.listing_id),
            ListingEvent::ListingRejected(e) => (e.tenant_id, e.listing_id),
            ListingEvent::ListingArchived(e) => (e.tenant_id, e.listing_id),
        };

        if event_tenant != tenant_id {
            return Err(CatalogProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if listing_id.0 != aggregate_id {
            return Err(CatalogProjectionError::TenantIsolation(
                "event listing_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ListingEvent::ListingCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.listing_id,
                    ListingReadModel {
                        listing_id: e.listing_id,
                        seller_id: e.seller_id,
                        title: e.title,
                        condition: e.condition,
                        details: e.details,
                        price_cents: e.price_cents,
                        stock: e.stock,
                        approval: ApprovalStatus::Pending,
                        review_note: None,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            ListingEvent::ListingUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    if let Some(title) = e.title {
                        rm.title = title;
                    }
                    if let Some(condition) = e.condition {
                        rm.condition = condition;
                    }
                    if let Some(details) = e.details {
                        rm.details = details;
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::ListingResubmitted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.approval = ApprovalStatus::Pending;
                    rm.review_note = None;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::PriceSet(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.price_cents = e.price_cents;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.stock = e.new_stock;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::ListingApproved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.approval = ApprovalStatus::Approved;
                    rm.review_note = e.note;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::ListingRejected(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.approval = ApprovalStatus::Rejected;
                    rm.review_note = Some(e.note);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
            ListingEvent::ListingArchived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.listing_id) {
                    rm.approval = ApprovalStatus::Archived;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.listing_id, rm);
                }
            }
        }

        self.update_cursor(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), CatalogProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
                self.clear_cursors(t);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
