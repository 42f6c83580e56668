//! Messaging domain module (event-sourced).
//!
//! Buyer/seller direct messages and structured purchase requests. Messages
//! support per-participant soft deletion so one side clearing their inbox
//! never destroys the other side's copy.

pub mod message;
pub mod purchase_request;

pub use message::{
    DeleteMessage, MarkRead, Message, MessageCommand, MessageDeleted, MessageEvent, MessageId,
    MessageRead, MessageSent, SendMessage,
};
pub use purchase_request::{
    CloseRequest, CreateRequest, PurchaseRequest, PurchaseRequestClosed, PurchaseRequestCommand,
    PurchaseRequestCreated, PurchaseRequestEvent, PurchaseRequestId, PurchaseRequestResponded,
    RequestStatus, RespondToRequest,
};
