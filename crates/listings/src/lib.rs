//! Car listings domain module (event-sourced).
//!
//! Business rules for seller listings and the staff approval workflow,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod listing;

pub use listing::{
    AdjustStock, ApprovalStatus, ApproveListing, ArchiveListing, Condition, CreateListing,
    Listing, ListingApproved, ListingArchived, ListingCommand, ListingCreated, ListingDetails,
    ListingEvent, ListingId, ListingRejected, ListingResubmitted, ListingUpdated, PriceSet,
    RejectListing, SetPrice, StockAdjusted, UpdateListing,
};
