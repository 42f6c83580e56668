use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use motormart_events::Event;
use motormart_listings::ListingId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub AggregateId);

impl MessageId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a single direct message between two users.
///
/// Deletion is soft and per-participant. A message only stops existing for
/// the side that deleted it; the stream itself is never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    tenant_id: Option<TenantId>,
    sender_id: Option<UserId>,
    recipient_id: Option<UserId>,
    listing_id: Option<ListingId>,
    subject: String,
    body: String,
    read: bool,
    deleted_by_sender: bool,
    deleted_by_recipient: bool,
    version: u64,
    created: bool,
}

impl Message {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: MessageId) -> Self {
        Self {
            id,
            tenant_id: None,
            sender_id: None,
            recipient_id: None,
            listing_id: None,
            subject: String::new(),
            body: String::new(),
            read: false,
            deleted_by_sender: false,
            deleted_by_recipient: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MessageId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sender_id(&self) -> Option<UserId> {
        self.sender_id
    }

    pub fn recipient_id(&self) -> Option<UserId> {
        self.recipient_id
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.listing_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    /// Whether the given participant still sees this message.
    pub fn visible_to(&self, user_id: UserId) -> bool {
        if self.sender_id == Some(user_id) {
            return !self.deleted_by_sender;
        }
        if self.recipient_id == Some(user_id) {
            return !self.deleted_by_recipient;
        }
        false
    }
}

impl AggregateRoot for Message {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SendMessage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub listing_id: Option<ListingId>,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkRead. Only the recipient may mark a message read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRead {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteMessage. Soft delete for the acting participant only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageCommand {
    SendMessage(SendMessage),
    MarkRead(MarkRead),
    DeleteMessage(DeleteMessage),
}

/// Event: MessageSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSent {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub listing_id: Option<ListingId>,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MessageRead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRead {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MessageDeleted. Records which participant deleted their copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleted {
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub deleted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEvent {
    MessageSent(MessageSent),
    MessageRead(MessageRead),
    MessageDeleted(MessageDeleted),
}

impl Event for MessageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MessageEvent::MessageSent(_) => "messaging.message.sent",
            MessageEvent::MessageRead(_) => "messaging.message.read",
            MessageEvent::MessageDeleted(_) => "messaging.message.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MessageEvent::MessageSent(e) => e.occurred_at,
            MessageEvent::MessageRead(e) => e.occurred_at,
            MessageEvent::MessageDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Message {
    type Command = MessageCommand;
    type Event = MessageEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MessageEvent::MessageSent(e) => {
                self.id = e.message_id;
                self.tenant_id = Some(e.tenant_id);
                self.sender_id = Some(e.sender_id);
                self.recipient_id = Some(e.recipient_id);
                self.listing_id = e.listing_id;
                self.subject = e.subject.clone();
                self.body = e.body.clone();
                self.created = true;
            }
            MessageEvent::MessageRead(_) => {
                self.read = true;
            }
            MessageEvent::MessageDeleted(e) => {
                if self.sender_id == Some(e.deleted_by) {
                    self.deleted_by_sender = true;
                } else if self.recipient_id == Some(e.deleted_by) {
                    self.deleted_by_recipient = true;
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MessageCommand::SendMessage(cmd) => self.handle_send(cmd),
            MessageCommand::MarkRead(cmd) => self.handle_mark_read(cmd),
            MessageCommand::DeleteMessage(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Message {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_message_id(&self, message_id: MessageId) -> Result<(), DomainError> {
        if self.id != message_id {
            return Err(DomainError::invariant("message_id mismatch"));
        }
        Ok(())
    }

    fn handle_send(&self, cmd: &SendMessage) -> Result<Vec<MessageEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_message_id(cmd.message_id)?;

        if self.created {
            return Err(DomainError::conflict("message already sent"));
        }
        if cmd.sender_id == cmd.recipient_id {
            return Err(DomainError::validation("cannot message yourself"));
        }
        if cmd.subject.trim().is_empty() {
            return Err(DomainError::validation("subject must not be empty"));
        }
        if cmd.body.trim().is_empty() {
            return Err(DomainError::validation("body must not be empty"));
        }

        Ok(vec![MessageEvent::MessageSent(MessageSent {
            tenant_id: cmd.tenant_id,
            message_id: cmd.message_id,
            sender_id: cmd.sender_id,
            recipient_id: cmd.recipient_id,
            listing_id: cmd.listing_id,
            subject: cmd.subject.clone(),
            body: cmd.body.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_read(&self, cmd: &MarkRead) -> Result<Vec<MessageEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_message_id(cmd.message_id)?;

        if self.recipient_id != Some(cmd.actor_id) {
            return Err(DomainError::Unauthorized);
        }
        if self.read {
            return Ok(vec![]);
        }

        Ok(vec![MessageEvent::MessageRead(MessageRead {
            tenant_id: cmd.tenant_id,
            message_id: cmd.message_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteMessage) -> Result<Vec<MessageEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_message_id(cmd.message_id)?;

        let is_sender = self.sender_id == Some(cmd.actor_id);
        let is_recipient = self.recipient_id == Some(cmd.actor_id);
        if !is_sender && !is_recipient {
            return Err(DomainError::Unauthorized);
        }
        if (is_sender && self.deleted_by_sender) || (is_recipient && self.deleted_by_recipient) {
            return Ok(vec![]);
        }

        Ok(vec![MessageEvent::MessageDeleted(MessageDeleted {
            tenant_id: cmd.tenant_id,
            message_id: cmd.message_id,
            deleted_by: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
