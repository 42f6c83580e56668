//! Direct messaging routes.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use motormart_auth::Permission;
use motormart_core::{AggregateId, UserId};
use motormart_listings::ListingId;
use motormart_messaging::{
    DeleteMessage, MarkRead, Message, MessageCommand, MessageId, SendMessage,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(send_message).get(inbox))
        .route("/sent", get(sent))
        .route("/unread_count", get(unread_count))
        .route("/:id", get(get_message).delete(delete_message))
        .route("/:id/read", post(mark_read))
}

fn authorize(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth { inner: (), required: vec![Permission::new(permission)] };
    crate::authz::authorize_command(tenant, principal, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

pub async fn send_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::SendMessageRequest>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.send") {
        return resp;
    }

    let recipient_id: UserId = match body.recipient_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid recipient id")
        }
    };

    let listing_id = match body.listing_id {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(v) => Some(ListingId::new(v)),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid listing id",
                )
            }
        },
        None => None,
    };

    // Listing inquiries get a prefilled subject when the sender omits one.
    let subject = match body.subject {
        Some(s) => s,
        None => match listing_id
            .and_then(|lid| services.catalog_get(tenant.tenant_id(), &lid))
        {
            Some(listing) => format!("Inquiry about {}", listing.title),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "missing_subject",
                    "subject is required",
                )
            }
        },
    };

    let agg = AggregateId::new();
    let message_id = MessageId::new(agg);
    let cmd = MessageCommand::SendMessage(SendMessage {
        tenant_id: tenant.tenant_id(),
        message_id,
        sender_id: principal.user_id(),
        recipient_id,
        listing_id,
        subject,
        body: body.body,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Message>(
        tenant.tenant_id(),
        agg,
        "messaging.message",
        cmd,
        |_t, aggregate_id| Message::empty(MessageId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn inbox(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let items = services
        .messages_inbox(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::message_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn sent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let items = services
        .messages_sent(tenant.tenant_id(), principal.user_id())
        .into_iter()
        .map(dto::message_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let count = services.messages_unread_count(tenant.tenant_id(), principal.user_id());
    (StatusCode::OK, Json(serde_json::json!({ "unread": count }))).into_response()
}

pub async fn get_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid message id")
        }
    };
    let user_id = principal.user_id();
    match services.messages_get(tenant.tenant_id(), &MessageId::new(agg)) {
        Some(rm) if rm.sender_id == user_id || rm.recipient_id == user_id => {
            (StatusCode::OK, Json(dto::message_to_json(rm))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "message not found"),
    }
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid message id")
        }
    };

    let cmd = MessageCommand::MarkRead(MarkRead {
        tenant_id: tenant.tenant_id(),
        message_id: MessageId::new(agg),
        actor_id: principal.user_id(),
        occurred_at: Utc::now(),
    });

    dispatch_message(&services, &tenant, agg, cmd)
}

pub async fn delete_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize(&tenant, &principal, "messages.read") {
        return resp;
    }
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid message id")
        }
    };

    let cmd = MessageCommand::DeleteMessage(DeleteMessage {
        tenant_id: tenant.tenant_id(),
        message_id: MessageId::new(agg),
        actor_id: principal.user_id(),
        occurred_at: Utc::now(),
    });

    dispatch_message(&services, &tenant, agg, cmd)
}

fn dispatch_message(
    services: &Arc<AppServices>,
    tenant: &TenantContext,
    agg: AggregateId,
    cmd: MessageCommand,
) -> axum::response::Response {
    match services.dispatch::<Message>(
        tenant.tenant_id(),
        agg,
        "messaging.message",
        cmd,
        |_t, aggregate_id| Message::empty(MessageId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
