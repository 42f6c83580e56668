//! Email templates.
//!
//! Each constructor renders one transactional email. Templates take plain
//! strings and pre-formatted amounts so this crate stays free of domain
//! types.

use motormart_core::TenantId;

use crate::email::EmailMessage;

fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Sent to the buyer right after checkout succeeds.
pub fn order_confirmation(
    tenant_id: TenantId,
    to: &str,
    customer_name: &str,
    order_id: &str,
    total_cents: u64,
) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        format!("Order confirmed: {order_id}"),
        format!(
            "Hi {customer_name},\n\nYour order {order_id} has been placed. \
             Total: {}.\n\nWe'll let you know as soon as it ships.",
            format_cents(total_cents)
        ),
    )
}

/// Sent to the buyer whenever an order changes status.
pub fn order_status_update(
    tenant_id: TenantId,
    to: &str,
    customer_name: &str,
    order_id: &str,
    new_status: &str,
) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        format!("Order {order_id} is now {new_status}"),
        format!("Hi {customer_name},\n\nYour order {order_id} is now {new_status}."),
    )
}

/// Sent to the seller when one of their listings is sold.
pub fn car_sold(
    tenant_id: TenantId,
    to: &str,
    seller_name: &str,
    listing_name: &str,
    quantity: u32,
) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        format!("Sold: {listing_name}"),
        format!(
            "Hi {seller_name},\n\nGood news: {quantity} unit(s) of \"{listing_name}\" \
             just sold. Check your orders page for details."
        ),
    )
}

/// Sent to staff when a new or resubmitted listing needs review.
pub fn approval_required(
    tenant_id: TenantId,
    to: &str,
    listing_name: &str,
    seller_name: &str,
) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        format!("Listing awaiting review: {listing_name}"),
        format!(
            "The listing \"{listing_name}\" from {seller_name} is pending review. \
             Approve or reject it from the moderation queue."
        ),
    )
}

/// Password reset link for an existing account.
pub fn password_reset(tenant_id: TenantId, to: &str, reset_link: &str) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        "Reset your password",
        format!(
            "A password reset was requested for this address.\n\n{reset_link}\n\n\
             If you didn't request this, you can ignore this email."
        ),
    )
}

/// Address confirmation for a new account.
pub fn email_confirmation(tenant_id: TenantId, to: &str, confirm_link: &str) -> EmailMessage {
    EmailMessage::new(
        tenant_id,
        to,
        "Confirm your email address",
        format!("Welcome! Please confirm your email address:\n\n{confirm_link}"),
    )
}
