//! Messages projection: inbox, sent view, and unread counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motormart_core::{TenantId, UserId};
use motormart_events::EventEnvelope;
use motormart_listings::ListingId;
use motormart_messaging::{MessageEvent, MessageId};

use crate::read_model::TenantStore;

/// Message read model for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReadModel {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub listing_id: Option<ListingId>,
    pub subject: String,
    pub body: String,
    pub read: bool,
    pub deleted_by_sender: bool,
    pub deleted_by_recipient: bool,
    pub sent_at: DateTime<Utc>,
}

impl MessageReadModel {
    fn visible_to(&self, user_id: UserId) -> bool {
        if self.sender_id == user_id {
            return !self.deleted_by_sender;
        }
        if self.recipient_id == user_id {
            return !self.deleted_by_recipient;
        }
        false
    }
}

/// Projection that maintains the per-tenant message directory.
pub struct MessagesProjection<S> {
    store: S,
}

impl<S> MessagesProjection<S>
where
    S: TenantStore<MessageId, MessageReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, tenant_id: TenantId, message_id: &MessageId) -> Option<MessageReadModel> {
        self.store.get(tenant_id, message_id)
    }

    /// Messages received by the user and not deleted by them, newest first.
    pub fn inbox(&self, tenant_id: TenantId, user_id: UserId) -> Vec<MessageReadModel> {
        let mut messages: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|m| m.recipient_id == user_id && m.visible_to(user_id))
            .collect();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        messages
    }

    /// Messages sent by the user and not deleted by them, newest first.
    pub fn sent(&self, tenant_id: TenantId, user_id: UserId) -> Vec<MessageReadModel> {
        let mut messages: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|m| m.sender_id == user_id && m.visible_to(user_id))
            .collect();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        messages
    }

    pub fn unread_count(&self, tenant_id: TenantId, user_id: UserId) -> usize {
        self.inbox(tenant_id, user_id)
            .iter()
            .filter(|m| !m.read)
            .count()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != "messaging.message" {
            return Ok(());
        }

        let event: MessageEvent = serde_json::from_value(envelope.payload().clone())?;
        let tenant_id = envelope.tenant_id();

        match event {
            MessageEvent::MessageSent(e) => {
                self.store.upsert(
                    tenant_id,
                    e.message_id,
                    MessageReadModel {
                        message_id: e.message_id,
                        sender_id: e.sender_id,
                        recipient_id: e.recipient_id,
                        listing_id: e.listing_id,
                        subject: e.subject,
                        body: e.body,
                        read: false,
                        deleted_by_sender: false,
                        deleted_by_recipient: false,
                        sent_at: e.occurred_at,
                    },
                );
            }
            MessageEvent::MessageRead(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.message_id) {
                    rm.read = true;
                    self.store.upsert(tenant_id, e.message_id, rm);
                }
            }
            MessageEvent::MessageDeleted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.message_id) {
                    if rm.sender_id == e.deleted_by {
                        rm.deleted_by_sender = true;
                    } else if rm.recipient_id == e.deleted_by {
                        rm.deleted_by_recipient = true;
                    }
                    self.store.upsert(tenant_id, e.message_id, rm);
                }
            }
        }

        Ok(())
    }
}
