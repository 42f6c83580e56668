use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;

/// Listing identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub AggregateId);

impl ListingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ListingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Vehicle condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
    CertifiedPreOwned,
}

/// Staff review lifecycle for a listing.
///
/// Only `Approved` listings appear in public browse results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Archived,
}

/// Vehicle details attached to a listing.
///
/// `brand`, `model_year` and `category` are required; the rest is optional
/// seller-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ListingDetails {
    pub brand: String,
    pub model_year: i32,
    pub category: String,
    pub mileage: u32,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub vin: Option<String>,
    pub engine_size: Option<String>,
    pub horsepower: Option<u32>,
    pub doors: Option<u8>,
    pub seats: Option<u8>,
    pub description: String,
    pub features: Vec<String>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    /// Aggregated review score, 1..=5 when present.
    pub rating: Option<u8>,
}

impl ListingDetails {
    fn validate(&self) -> Result<(), DomainError> {
        if self.brand.trim().is_empty() {
            return Err(DomainError::validation("brand cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if !(1900..=2100).contains(&self.model_year) {
            return Err(DomainError::validation("model year must be 1900..=2100"));
        }
        if let Some(vin) = &self.vin {
            if vin.trim().is_empty() {
                return Err(DomainError::validation("VIN cannot be empty when provided"));
            }
        }
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(DomainError::validation("rating must be 1..=5"));
            }
        }
        Ok(())
    }
}

/// Aggregate root: a car listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    id: ListingId,
    tenant_id: Option<TenantId>,
    seller_id: Option<UserId>,
    title: String,
    condition: Condition,
    details: ListingDetails,
    price_cents: u64,
    stock: u32,
    approval: ApprovalStatus,
    review_note: Option<String>,
    version: u64,
    created: bool,
}

impl Listing {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ListingId) -> Self {
        Self {
            id,
            tenant_id: None,
            seller_id: None,
            title: String::new(),
            condition: Condition::Used,
            details: ListingDetails::default(),
            price_cents: 0,
            stock: 0,
            approval: ApprovalStatus::Pending,
            review_note: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ListingId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn seller_id(&self) -> Option<UserId> {
        self.seller_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn details(&self) -> &ListingDetails {
        &self.details
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn approval(&self) -> ApprovalStatus {
        self.approval
    }

    pub fn review_note(&self) -> Option<&str> {
        self.review_note.as_deref()
    }

    /// Check if the listing is publicly visible and purchasable.
    pub fn is_on_market(&self) -> bool {
        self.approval == ApprovalStatus::Approved && self.stock > 0
    }
}

impl AggregateRoot for Listing {
    type Id = ListingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: CreateListing. Starts in `pending` review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateListing {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub seller_id: UserId,
    pub title: String,
    pub condition: Condition,
    pub details: ListingDetails,
    pub price_cents: u64,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateListing. `None` fields are left unchanged.
///
/// `actor_id`/`actor_is_staff` carry who is editing; only the owning seller
/// or staff may mutate a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateListing {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub actor_id: UserId,
    pub actor_is_staff: bool,
    pub title: Option<String>,
    pub condition: Option<Condition>,
    pub details: Option<ListingDetails>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPrice (cents, must be > 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPrice {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub actor_id: UserId,
    pub actor_is_staff: bool,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (signed delta; resulting stock must never go negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub actor_id: UserId,
    pub actor_is_staff: bool,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveListing (staff decision; only `pending` listings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveListing {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectListing (staff decision; only `pending` listings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectListing {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveListing (owner or staff; terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveListing {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub actor_id: UserId,
    pub actor_is_staff: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingCommand {
    CreateListing(CreateListing),
    UpdateListing(UpdateListing),
    SetPrice(SetPrice),
    AdjustStock(AdjustStock),
    ApproveListing(ApproveListing),
    RejectListing(RejectListing),
    ArchiveListing(ArchiveListing),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event: ListingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCreated {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub seller_id: UserId,
    pub title: String,
    pub condition: Condition,
    pub details: ListingDetails,
    pub price_cents: u64,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingUpdated. Carries only the changed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdated {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub title: Option<String>,
    pub condition: Option<Condition>,
    pub details: Option<ListingDetails>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingResubmitted. Emitted when a rejected listing is edited,
/// sending it back to `pending` review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingResubmitted {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSet {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub delta: i64,
    pub new_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingApproved {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRejected {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ListingArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingArchived {
    pub tenant_id: TenantId,
    pub listing_id: ListingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingEvent {
    ListingCreated(ListingCreated),
    ListingUpdated(ListingUpdated),
    ListingResubmitted(ListingResubmitted),
    PriceSet(PriceSet),
    StockAdjusted(StockAdjusted),
    ListingApproved(ListingApproved),
    ListingRejected(ListingRejected),
    ListingArchived(ListingArchived),
}

impl Event for ListingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ListingEvent::ListingCreated(_) => "listings.listing.created",
            ListingEvent::ListingUpdated(_) => "listings.listing.updated",
            ListingEvent::ListingResubmitted(_) => "listings.listing.resubmitted",
            ListingEvent::PriceSet(_) => "listings.listing.price_set",
            ListingEvent::StockAdjusted(_) => "listings.listing.stock_adjusted",
            ListingEvent::ListingApproved(_) => "listings.listing.approved",
            ListingEvent::ListingRejected(_) => "listings.listing.rejected",
            ListingEvent::ListingArchived(_) => "listings.listing.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ListingEvent::ListingCreated(e) => e.occurred_at,
            ListingEvent::ListingUpdated(e) => e.occurred_at,
            ListingEvent::ListingResubmitted(e) => e.occurred_at,
            ListingEvent::PriceSet(e) => e.occurred_at,
            ListingEvent::StockAdjusted(e) => e.occurred_at,
            ListingEvent::ListingApproved(e) => e.occurred_at,
            ListingEvent::ListingRejected(e) => e.occurred_at,
            ListingEvent::ListingArchived(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Listing {
    type Command = ListingCommand;
    type Event = ListingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ListingEvent::ListingCreated(e) => {
                self.id = e.listing_id;
                self.tenant_id = Some(e.tenant_id);
                self.seller_id = Some(e.seller_id);
                self.title = e.title.clone();
                self.condition = e.condition;
                self.details = e.details.clone();
                self.price_cents = e.price_cents;
                self.stock = e.stock;
                self.approval = ApprovalStatus::Pending;
                self.review_note = None;
                self.created = true;
            }
            ListingEvent::ListingUpdated(e) => {
                if let Some(title) = &e.title {
                    self.title = title.clone();
                }
                if let Some(condition) = e.condition {
                    self.condition = condition;
                }
                if let Some(details) = &e.details {
                    self.details = details.clone();
                }
            }
            ListingEvent::ListingResubmitted(_) => {
                self.approval = ApprovalStatus::Pending;
                self.review_note = None;
            }
            ListingEvent::PriceSet(e) => {
                self.price_cents = e.price_cents;
            }
            ListingEvent::StockAdjusted(e) => {
                self.stock = e.new_stock;
            }
            ListingEvent::ListingApproved(e) => {
                self.approval = ApprovalStatus::Approved;
                self.review_note = e.note.clone();
            }
            ListingEvent::ListingRejected(e) => {
                self.approval = ApprovalStatus::Rejected;
                self.review_note = Some(e.note.clone());
            }
            ListingEvent::ListingArchived(_) => {
                self.approval = ApprovalStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ListingCommand::CreateListing(cmd) => self.handle_create(cmd),
            ListingCommand::UpdateListing(cmd) => self.handle_update(cmd),
            ListingCommand::SetPrice(cmd) => self.handle_set_price(cmd),
            ListingCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
            ListingCommand::ApproveListing(cmd) => self.handle_approve(cmd),
            ListingCommand::RejectListing(cmd) => self.handle_reject(cmd),
            ListingCommand::ArchiveListing(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Listing {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_listing_id(&self, listing_id: ListingId) -> Result<(), DomainError> {
        if self.id != listing_id {
            return Err(DomainError::invariant("listing_id mismatch"));
        }
        Ok(())
    }

    fn ensure_owner_or_staff(&self, actor_id: UserId, actor_is_staff: bool) -> Result<(), DomainError> {
        if actor_is_staff || self.seller_id == Some(actor_id) {
            return Ok(());
        }
        Err(DomainError::Unauthorized)
    }

    fn ensure_not_archived(&self) -> Result<(), DomainError> {
        if self.approval == ApprovalStatus::Archived {
            return Err(DomainError::invariant("archived listings are immutable"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateListing) -> Result<Vec<ListingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("listing already exists"));
        }

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.price_cents == 0 {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        cmd.details.validate()?;

        Ok(vec![ListingEvent::ListingCreated(ListingCreated {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            seller_id: cmd.seller_id,
            title: cmd.title.trim().to_string(),
            condition: cmd.condition,
            details: cmd.details.clone(),
            price_cents: cmd.price_cents,
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateListing) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;
        self.ensure_owner_or_staff(cmd.actor_id, cmd.actor_is_staff)?;
        self.ensure_not_archived()?;

        if cmd.title.is_none() && cmd.condition.is_none() && cmd.details.is_none() {
            return Err(DomainError::validation("no listing fields to update"));
        }
        if let Some(title) = &cmd.title {
            if title.trim().is_empty() {
                return Err(DomainError::validation("title cannot be empty"));
            }
        }
        if let Some(details) = &cmd.details {
            details.validate()?;
        }

        let mut events = vec![ListingEvent::ListingUpdated(ListingUpdated {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            title: cmd.title.as_ref().map(|t| t.trim().to_string()),
            condition: cmd.condition,
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })];

        // Editing a rejected listing resubmits it for review.
        if self.approval == ApprovalStatus::Rejected {
            events.push(ListingEvent::ListingResubmitted(ListingResubmitted {
                tenant_id: cmd.tenant_id,
                listing_id: cmd.listing_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_set_price(&self, cmd: &SetPrice) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;
        self.ensure_owner_or_staff(cmd.actor_id, cmd.actor_is_staff)?;
        self.ensure_not_archived()?;

        if cmd.price_cents == 0 {
            return Err(DomainError::validation("price must be greater than zero"));
        }

        Ok(vec![ListingEvent::PriceSet(PriceSet {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            price_cents: cmd.price_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;
        self.ensure_owner_or_staff(cmd.actor_id, cmd.actor_is_staff)?;
        self.ensure_not_archived()?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("stock delta cannot be zero"));
        }

        let new_stock = i64::from(self.stock) + cmd.delta;
        if new_stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        if new_stock > i64::from(u32::MAX) {
            return Err(DomainError::validation("stock delta too large"));
        }

        Ok(vec![ListingEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            delta: cmd.delta,
            new_stock: new_stock as u32,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveListing) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;

        if self.approval != ApprovalStatus::Pending {
            return Err(DomainError::invariant("only pending listings can be approved"));
        }

        Ok(vec![ListingEvent::ListingApproved(ListingApproved {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectListing) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;

        if self.approval != ApprovalStatus::Pending {
            return Err(DomainError::invariant("only pending listings can be rejected"));
        }
        if cmd.note.trim().is_empty() {
            return Err(DomainError::validation("rejection note cannot be empty"));
        }

        Ok(vec![ListingEvent::ListingRejected(ListingRejected {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            note: cmd.note.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveListing) -> Result<Vec<ListingEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_listing_id(cmd.listing_id)?;
        self.ensure_owner_or_staff(cmd.actor_id, cmd.actor_is_staff)?;

        if self.approval == ApprovalStatus::Archived {
            return Err(DomainError::conflict("listing is already archived"));
        }

        Ok(vec![ListingEvent::ListingArchived(ListingArchived {
            tenant_id: cmd.tenant_id,
            listing_id: cmd.listing_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_listing_id() -> ListingId {
        ListingId::new(AggregateId::new())
    }

    fn test_seller_id() -> UserId {
        UserId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_details() -> ListingDetails {
        ListingDetails {
            brand: "Toyota".to_string(),
            model_year: 2021,
            category: "Sedan".to_string(),
            mileage: 24_000,
            fuel_type: Some("Petrol".to_string()),
            transmission: Some("Automatic".to_string()),
            color: Some("Silver".to_string()),
            vin: Some("JT2BF22K1W0123456".to_string()),
            engine_size: Some("2.5L".to_string()),
            horsepower: Some(203),
            doors: Some(4),
            seats: Some(5),
            description: "Well maintained, single owner.".to_string(),
            features: vec!["Cruise control".to_string(), "Heated seats".to_string()],
            image_url: None,
            location: Some("Manchester".to_string()),
            rating: None,
        }
    }

    fn create_cmd(tenant_id: TenantId, listing_id: ListingId, seller_id: UserId) -> CreateListing {
        CreateListing {
            tenant_id,
            listing_id,
            seller_id,
            title: "2021 Toyota Camry".to_string(),
            condition: Condition::Used,
            details: test_details(),
            price_cents: 2_150_000,
            stock: 1,
            occurred_at: test_time(),
        }
    }

    fn created_listing(tenant_id: TenantId, listing_id: ListingId, seller_id: UserId) -> Listing {
        let mut listing = Listing::empty(listing_id);
        let events = listing
            .handle(&ListingCommand::CreateListing(create_cmd(
                tenant_id, listing_id, seller_id,
            )))
            .unwrap();
        for event in &events {
            listing.apply(event);
        }
        listing
    }

    #[test]
    fn create_listing_emits_listing_created_event() {
        let listing = Listing::empty(test_listing_id());
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let cmd = create_cmd(tenant_id, listing_id, seller_id);

        let events = listing
            .handle(&ListingCommand::CreateListing(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ListingEvent::ListingCreated(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.listing_id, listing_id);
                assert_eq!(e.seller_id, seller_id);
                assert_eq!(e.title, "2021 Toyota Camry");
                assert_eq!(e.price_cents, 2_150_000);
            }
            _ => panic!("Expected ListingCreated event"),
        }
    }

    #[test]
    fn create_listing_starts_pending() {
        let listing = created_listing(test_tenant_id(), test_listing_id(), test_seller_id());
        assert_eq!(listing.approval(), ApprovalStatus::Pending);
        assert!(!listing.is_on_market());
    }

    #[test]
    fn create_listing_rejects_zero_price() {
        let listing = Listing::empty(test_listing_id());
        let mut cmd = create_cmd(test_tenant_id(), test_listing_id(), test_seller_id());
        cmd.price_cents = 0;

        let err = listing
            .handle(&ListingCommand::CreateListing(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero price"),
        }
    }

    #[test]
    fn create_listing_rejects_bad_model_year() {
        let listing = Listing::empty(test_listing_id());
        let mut cmd = create_cmd(test_tenant_id(), test_listing_id(), test_seller_id());
        cmd.details.model_year = 1850;

        let err = listing
            .handle(&ListingCommand::CreateListing(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for model year"),
        }
    }

    #[test]
    fn create_listing_rejects_out_of_range_rating() {
        let listing = Listing::empty(test_listing_id());
        let mut cmd = create_cmd(test_tenant_id(), test_listing_id(), test_seller_id());
        cmd.details.rating = Some(6);

        let err = listing
            .handle(&ListingCommand::CreateListing(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for rating"),
        }
    }

    #[test]
    fn create_listing_rejects_duplicate_creation() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let listing = created_listing(tenant_id, listing_id, seller_id);

        let err = listing
            .handle(&ListingCommand::CreateListing(create_cmd(
                tenant_id, listing_id, seller_id,
            )))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate creation"),
        }
    }

    #[test]
    fn owner_can_update_listing() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let mut listing = created_listing(tenant_id, listing_id, seller_id);

        let cmd = UpdateListing {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            title: Some("2021 Toyota Camry SE".to_string()),
            condition: None,
            details: None,
            occurred_at: test_time(),
        };

        let events = listing
            .handle(&ListingCommand::UpdateListing(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        for event in &events {
            listing.apply(event);
        }
        assert_eq!(listing.title(), "2021 Toyota Camry SE");
    }

    #[test]
    fn non_owner_cannot_update_listing() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let listing = created_listing(tenant_id, listing_id, test_seller_id());

        let cmd = UpdateListing {
            tenant_id,
            listing_id,
            actor_id: test_seller_id(),
            actor_is_staff: false,
            title: Some("Hijacked".to_string()),
            condition: None,
            details: None,
            occurred_at: test_time(),
        };

        let err = listing
            .handle(&ListingCommand::UpdateListing(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn updating_rejected_listing_resubmits_for_review() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let mut listing = created_listing(tenant_id, listing_id, seller_id);

        let reject = RejectListing {
            tenant_id,
            listing_id,
            note: "Photos missing".to_string(),
            occurred_at: test_time(),
        };
        for event in &listing
            .handle(&ListingCommand::RejectListing(reject))
            .unwrap()
        {
            listing.apply(event);
        }
        assert_eq!(listing.approval(), ApprovalStatus::Rejected);

        let update = UpdateListing {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            title: None,
            condition: None,
            details: Some(test_details()),
            occurred_at: test_time(),
        };
        let events = listing
            .handle(&ListingCommand::UpdateListing(update))
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ListingEvent::ListingResubmitted(_)));

        for event in &events {
            listing.apply(event);
        }
        assert_eq!(listing.approval(), ApprovalStatus::Pending);
        assert_eq!(listing.review_note(), None);
    }

    #[test]
    fn archived_listing_is_immutable() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let mut listing = created_listing(tenant_id, listing_id, seller_id);

        let archive = ArchiveListing {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            occurred_at: test_time(),
        };
        for event in &listing
            .handle(&ListingCommand::ArchiveListing(archive))
            .unwrap()
        {
            listing.apply(event);
        }
        assert_eq!(listing.approval(), ApprovalStatus::Archived);

        let update = UpdateListing {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            title: Some("New title".to_string()),
            condition: None,
            details: None,
            occurred_at: test_time(),
        };
        let err = listing
            .handle(&ListingCommand::UpdateListing(update))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("archived")),
            _ => panic!("Expected InvariantViolation for archived listing"),
        }
    }

    #[test]
    fn approve_requires_pending() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let mut listing = created_listing(tenant_id, listing_id, test_seller_id());

        let approve = ApproveListing {
            tenant_id,
            listing_id,
            note: None,
            occurred_at: test_time(),
        };
        for event in &listing
            .handle(&ListingCommand::ApproveListing(approve.clone()))
            .unwrap()
        {
            listing.apply(event);
        }
        assert_eq!(listing.approval(), ApprovalStatus::Approved);
        assert!(listing.is_on_market());

        let err = listing
            .handle(&ListingCommand::ApproveListing(approve))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("pending")),
            _ => panic!("Expected InvariantViolation for double approve"),
        }
    }

    #[test]
    fn reject_requires_note() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let listing = created_listing(tenant_id, listing_id, test_seller_id());

        let reject = RejectListing {
            tenant_id,
            listing_id,
            note: "   ".to_string(),
            occurred_at: test_time(),
        };
        let err = listing
            .handle(&ListingCommand::RejectListing(reject))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty note"),
        }
    }

    #[test]
    fn adjust_stock_tracks_new_level() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let mut listing = created_listing(tenant_id, listing_id, seller_id);
        assert_eq!(listing.stock(), 1);

        let restock = AdjustStock {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            delta: 3,
            occurred_at: test_time(),
        };
        let events = listing
            .handle(&ListingCommand::AdjustStock(restock))
            .unwrap();
        match &events[0] {
            ListingEvent::StockAdjusted(e) => {
                assert_eq!(e.delta, 3);
                assert_eq!(e.new_stock, 4);
            }
            _ => panic!("Expected StockAdjusted event"),
        }
        for event in &events {
            listing.apply(event);
        }
        assert_eq!(listing.stock(), 4);
    }

    #[test]
    fn adjust_stock_rejects_negative_result() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let listing = created_listing(tenant_id, listing_id, seller_id);

        let oversell = AdjustStock {
            tenant_id,
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            delta: -2,
            occurred_at: test_time(),
        };
        let err = listing
            .handle(&ListingCommand::AdjustStock(oversell))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("negative")),
            _ => panic!("Expected InvariantViolation for negative stock"),
        }
    }

    #[test]
    fn set_price_rejects_wrong_tenant() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let listing = created_listing(tenant_id, listing_id, seller_id);

        let cmd = SetPrice {
            tenant_id: test_tenant_id(),
            listing_id,
            actor_id: seller_id,
            actor_is_staff: false,
            price_cents: 1_999_900,
            occurred_at: test_time(),
        };
        let err = listing.handle(&ListingCommand::SetPrice(cmd)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("tenant")),
            _ => panic!("Expected InvariantViolation for tenant mismatch"),
        }
    }

    #[test]
    fn version_increments_on_apply() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let mut listing = Listing::empty(listing_id);
        assert_eq!(listing.version(), 0);

        let events = listing
            .handle(&ListingCommand::CreateListing(create_cmd(
                tenant_id, listing_id, seller_id,
            )))
            .unwrap();
        listing.apply(&events[0]);
        assert_eq!(listing.version(), 1);

        let approve = ApproveListing {
            tenant_id,
            listing_id,
            note: None,
            occurred_at: test_time(),
        };
        let events = listing
            .handle(&ListingCommand::ApproveListing(approve))
            .unwrap();
        listing.apply(&events[0]);
        assert_eq!(listing.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();
        let listing = created_listing(tenant_id, listing_id, seller_id);
        let before = listing.clone();

        let approve = ApproveListing {
            tenant_id,
            listing_id,
            note: None,
            occurred_at: test_time(),
        };
        let events1 = listing
            .handle(&ListingCommand::ApproveListing(approve.clone()))
            .unwrap();
        let events2 = listing
            .handle(&ListingCommand::ApproveListing(approve))
            .unwrap();

        assert_eq!(listing, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn apply_is_deterministic() {
        let tenant_id = test_tenant_id();
        let listing_id = test_listing_id();
        let seller_id = test_seller_id();

        let events = {
            let mut listing = Listing::empty(listing_id);
            let mut all = Vec::new();
            for cmd in [
                ListingCommand::CreateListing(create_cmd(tenant_id, listing_id, seller_id)),
                ListingCommand::ApproveListing(ApproveListing {
                    tenant_id,
                    listing_id,
                    note: Some("Looks good".to_string()),
                    occurred_at: test_time(),
                }),
                ListingCommand::AdjustStock(AdjustStock {
                    tenant_id,
                    listing_id,
                    actor_id: seller_id,
                    actor_is_staff: false,
                    delta: 2,
                    occurred_at: test_time(),
                }),
            ] {
                let events = listing.handle(&cmd).unwrap();
                for event in &events {
                    listing.apply(event);
                }
                all.extend(events);
            }
            all
        };

        let mut a = Listing::empty(listing_id);
        let mut b = Listing::empty(listing_id);
        for event in &events {
            a.apply(event);
            b.apply(event);
        }

        assert_eq!(a, b);
        assert_eq!(a.stock(), 3);
        assert_eq!(a.approval(), ApprovalStatus::Approved);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: stock never goes negative, whatever deltas arrive.
            #[test]
            fn stock_never_negative(
                initial in 0u32..100,
                deltas in proptest::collection::vec(-50i64..50, 0..20)
            ) {
                let tenant_id = test_tenant_id();
                let listing_id = test_listing_id();
                let seller_id = test_seller_id();

                let mut listing = Listing::empty(listing_id);
                let mut cmd = create_cmd(tenant_id, listing_id, seller_id);
                cmd.stock = initial;
                let events = listing.handle(&ListingCommand::CreateListing(cmd)).unwrap();
                listing.apply(&events[0]);

                for delta in deltas {
                    let adjust = AdjustStock {
                        tenant_id,
                        listing_id,
                        actor_id: seller_id,
                        actor_is_staff: false,
                        delta,
                        occurred_at: Utc::now(),
                    };
                    if let Ok(events) = listing.handle(&ListingCommand::AdjustStock(adjust)) {
                        for event in &events {
                            listing.apply(event);
                        }
                    }
                    prop_assert!(i64::from(listing.stock()) >= 0);
                }
            }

            /// Property: handle is deterministic (same state + command = same events).
            #[test]
            fn handle_is_deterministic(
                title in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                price in 1u64..100_000_000
            ) {
                let tenant_id = test_tenant_id();
                let listing_id = test_listing_id();
                let seller_id = test_seller_id();

                let listing = Listing::empty(listing_id);
                let mut cmd = create_cmd(tenant_id, listing_id, seller_id);
                cmd.title = title;
                cmd.price_cents = price;

                let state_before = listing.clone();
                let events1 = listing.handle(&ListingCommand::CreateListing(cmd.clone()));
                let events2 = listing.handle(&ListingCommand::CreateListing(cmd));

                prop_assert_eq!(&listing, &state_before);
                prop_assert_eq!(events1, events2);
            }

            /// Property: apply is deterministic (same events = same final state).
            #[test]
            fn apply_is_deterministic_prop(
                price in 1u64..100_000_000,
                stock in 0u32..1000
            ) {
                let tenant_id = test_tenant_id();
                let listing_id = test_listing_id();
                let seller_id = test_seller_id();

                let mut cmd = create_cmd(tenant_id, listing_id, seller_id);
                cmd.price_cents = price;
                cmd.stock = stock;

                let listing = Listing::empty(listing_id);
                let events = listing.handle(&ListingCommand::CreateListing(cmd)).unwrap();

                let mut a = Listing::empty(listing_id);
                let mut b = Listing::empty(listing_id);
                for event in &events {
                    a.apply(event);
                    b.apply(event);
                }

                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.price_cents(), price);
                prop_assert_eq!(a.stock(), stock);
            }
        }
    }
}
