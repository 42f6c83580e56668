use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;
use motormart_listings::ListingId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseRequestId(pub AggregateId);

impl PurchaseRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase request lifecycle: pending until the seller responds, then
/// either party may close it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Responded,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Responded => "responded",
            RequestStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: a buyer's structured purchase inquiry for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    id: PurchaseRequestId,
    tenant_id: Option<TenantId>,
    buyer_id: Option<UserId>,
    seller_id: Option<UserId>,
    listing_id: Option<ListingId>,
    message: String,
    offered_price_cents: Option<u64>,
    response: Option<String>,
    status: RequestStatus,
    version: u64,
    created: bool,
}

impl PurchaseRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseRequestId) -> Self {
        Self {
            id,
            tenant_id: None,
            buyer_id: None,
            seller_id: None,
            listing_id: None,
            message: String::new(),
            offered_price_cents: None,
            response: None,
            status: RequestStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseRequestId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn seller_id(&self) -> Option<UserId> {
        self.seller_id
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.listing_id
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn offered_price_cents(&self) -> Option<u64> {
        self.offered_price_cents
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }
}

impl AggregateRoot for PurchaseRequest {
    type Id = PurchaseRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    pub message: String,
    pub offered_price_cents: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RespondToRequest. Seller-only, and only while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondToRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub actor_id: UserId,
    pub response: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseRequest. Either participant may close an open request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestCommand {
    CreateRequest(CreateRequest),
    RespondToRequest(RespondToRequest),
    CloseRequest(CloseRequest),
}

/// Event: PurchaseRequestCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestCreated {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    pub message: String,
    pub offered_price_cents: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRequestResponded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestResponded {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub response: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRequestClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestClosed {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub closed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestEvent {
    PurchaseRequestCreated(PurchaseRequestCreated),
    PurchaseRequestResponded(PurchaseRequestResponded),
    PurchaseRequestClosed(PurchaseRequestClosed),
}

impl Event for PurchaseRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseRequestEvent::PurchaseRequestCreated(_) => "messaging.purchase_request.created",
            PurchaseRequestEvent::PurchaseRequestResponded(_) => {
                "messaging.purchase_request.responded"
            }
            PurchaseRequestEvent::PurchaseRequestClosed(_) => "messaging.purchase_request.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => e.occurred_at,
            PurchaseRequestEvent::PurchaseRequestResponded(e) => e.occurred_at,
            PurchaseRequestEvent::PurchaseRequestClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseRequest {
    type Command = PurchaseRequestCommand;
    type Event = PurchaseRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => {
                self.id = e.request_id;
                self.tenant_id = Some(e.tenant_id);
                self.buyer_id = Some(e.buyer_id);
                self.seller_id = Some(e.seller_id);
                self.listing_id = Some(e.listing_id);
                self.message = e.message.clone();
                self.offered_price_cents = e.offered_price_cents;
                self.status = RequestStatus::Pending;
                self.created = true;
            }
            PurchaseRequestEvent::PurchaseRequestResponded(e) => {
                self.response = Some(e.response.clone());
                self.status = RequestStatus::Responded;
            }
            PurchaseRequestEvent::PurchaseRequestClosed(_) => {
                self.status = RequestStatus::Closed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseRequestCommand::CreateRequest(cmd) => self.handle_create(cmd),
            PurchaseRequestCommand::RespondToRequest(cmd) => self.handle_respond(cmd),
            PurchaseRequestCommand::CloseRequest(cmd) => self.handle_close(cmd),
        }
    }
}

impl PurchaseRequest {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_request_id(&self, request_id: PurchaseRequestId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_request_id(cmd.request_id)?;

        if self.created {
            return Err(DomainError::conflict("purchase request already exists"));
        }
        if cmd.buyer_id == cmd.seller_id {
            return Err(DomainError::validation(
                "cannot request to purchase your own listing",
            ));
        }
        if cmd.message.trim().is_empty() {
            return Err(DomainError::validation("message must not be empty"));
        }
        if cmd.offered_price_cents == Some(0) {
            return Err(DomainError::validation(
                "offered price must be greater than zero",
            ));
        }

        Ok(vec![PurchaseRequestEvent::PurchaseRequestCreated(
            PurchaseRequestCreated {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                buyer_id: cmd.buyer_id,
                seller_id: cmd.seller_id,
                listing_id: cmd.listing_id,
                message: cmd.message.clone(),
                offered_price_cents: cmd.offered_price_cents,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_respond(
        &self,
        cmd: &RespondToRequest,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_request_id(cmd.request_id)?;

        if self.seller_id != Some(cmd.actor_id) {
            return Err(DomainError::Unauthorized);
        }
        if self.status != RequestStatus::Pending {
            return Err(DomainError::invariant(format!(
                "cannot respond to request in status '{}'",
                self.status
            )));
        }
        if cmd.response.trim().is_empty() {
            return Err(DomainError::validation("response must not be empty"));
        }

        Ok(vec![PurchaseRequestEvent::PurchaseRequestResponded(
            PurchaseRequestResponded {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                response: cmd.response.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_close(&self, cmd: &CloseRequest) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_request_id(cmd.request_id)?;

        if self.buyer_id != Some(cmd.actor_id) && self.seller_id != Some(cmd.actor_id) {
            return Err(DomainError::Unauthorized);
        }
        if self.status == RequestStatus::Closed {
            return Err(DomainError::invariant("request is already closed"));
        }

        Ok(vec![PurchaseRequestEvent::PurchaseRequestClosed(
            PurchaseRequestClosed {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                closed_by: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_request_id() -> PurchaseRequestId {
        PurchaseRequestId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(
        tenant_id: TenantId,
        request_id: PurchaseRequestId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> PurchaseRequestCommand {
        PurchaseRequestCommand::CreateRequest(CreateRequest {
            tenant_id,
            request_id,
            buyer_id,
            seller_id,
            listing_id: ListingId::new(AggregateId::new()),
            message: "Would you take 15,000 for it?".into(),
            offered_price_cents: Some(1_500_000),
            occurred_at: test_time(),
        })
    }

    fn created_request(
        tenant_id: TenantId,
        request_id: PurchaseRequestId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> PurchaseRequest {
        let mut request = PurchaseRequest::empty(request_id);
        for event in &request
            .handle(&create_cmd(tenant_id, request_id, buyer_id, seller_id))
            .unwrap()
        {
            request.apply(event);
        }
        request
    }

    #[test]
    fn create_starts_pending() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let request = created_request(tenant_id, request_id, UserId::new(), UserId::new());

        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(request.offered_price_cents(), Some(1_500_000));
    }

    #[test]
    fn create_for_own_listing_rejected() {
        let request_id = test_request_id();
        let user_id = UserId::new();
        let request = PurchaseRequest::empty(request_id);

        let err = request
            .handle(&create_cmd(test_tenant_id(), request_id, user_id, user_id))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_offer_rejected() {
        let request_id = test_request_id();
        let request = PurchaseRequest::empty(request_id);

        let err = request
            .handle(&PurchaseRequestCommand::CreateRequest(CreateRequest {
                tenant_id: test_tenant_id(),
                request_id,
                buyer_id: UserId::new(),
                seller_id: UserId::new(),
                listing_id: ListingId::new(AggregateId::new()),
                message: "lowball".into(),
                offered_price_cents: Some(0),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("offered price")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn only_seller_can_respond() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let buyer_id = UserId::new();
        let seller_id = UserId::new();
        let mut request = created_request(tenant_id, request_id, buyer_id, seller_id);

        let err = request
            .handle(&PurchaseRequestCommand::RespondToRequest(RespondToRequest {
                tenant_id,
                request_id,
                actor_id: buyer_id,
                response: "sure".into(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));

        let events = request
            .handle(&PurchaseRequestCommand::RespondToRequest(RespondToRequest {
                tenant_id,
                request_id,
                actor_id: seller_id,
                response: "Happy to discuss, call me.".into(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for event in &events {
            request.apply(event);
        }
        assert_eq!(request.status(), RequestStatus::Responded);
        assert_eq!(request.response(), Some("Happy to discuss, call me."));
    }

    #[test]
    fn respond_twice_rejected() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let seller_id = UserId::new();
        let mut request = created_request(tenant_id, request_id, UserId::new(), seller_id);

        let respond = PurchaseRequestCommand::RespondToRequest(RespondToRequest {
            tenant_id,
            request_id,
            actor_id: seller_id,
            response: "ok".into(),
            occurred_at: test_time(),
        });
        for event in &request.handle(&respond).unwrap() {
            request.apply(event);
        }

        let err = request.handle(&respond).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("responded")),
            _ => panic!("Expected InvariantViolation"),
        }
    }

    #[test]
    fn either_party_can_close() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let buyer_id = UserId::new();
        let seller_id = UserId::new();
        let mut request = created_request(tenant_id, request_id, buyer_id, seller_id);

        let events = request
            .handle(&PurchaseRequestCommand::CloseRequest(CloseRequest {
                tenant_id,
                request_id,
                actor_id: buyer_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        for event in &events {
            request.apply(event);
        }
        assert_eq!(request.status(), RequestStatus::Closed);
    }

    #[test]
    fn close_by_outsider_rejected() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let request = created_request(tenant_id, request_id, UserId::new(), UserId::new());

        let err = request
            .handle(&PurchaseRequestCommand::CloseRequest(CloseRequest {
                tenant_id,
                request_id,
                actor_id: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[test]
    fn close_twice_rejected() {
        let tenant_id = test_tenant_id();
        let request_id = test_request_id();
        let buyer_id = UserId::new();
        let mut request = created_request(tenant_id, request_id, buyer_id, UserId::new());

        let close = PurchaseRequestCommand::CloseRequest(CloseRequest {
            tenant_id,
            request_id,
            actor_id: buyer_id,
            occurred_at: test_time(),
        });
        for event in &request.handle(&close).unwrap() {
            request.apply(event);
        }

        let err = request.handle(&close).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn respond_on_fresh_stream_is_not_found() {
        let request_id = test_request_id();
        let request = PurchaseRequest::empty(request_id);

        let err = request
            .handle(&PurchaseRequestCommand::RespondToRequest(RespondToRequest {
                tenant_id: test_tenant_id(),
                request_id,
                actor_id: UserId::new(),
                response: "hello".into(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
