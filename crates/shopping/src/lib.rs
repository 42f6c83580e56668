//! Shopping domain module (event-sourced).
//!
//! Per-buyer cart and wishlist aggregates. Both streams are keyed by the
//! buyer's user id, so every buyer has exactly one of each per tenant.

pub mod cart;
pub mod wishlist;

pub use cart::{
    AddItem, Cart, CartCleared, CartCommand, CartEvent, CartId, CartItem, CartOpened, ClearCart,
    DecrementItem, IncrementItem, ItemAdded, ItemQuantityChanged, ItemRemoved, RemoveItem,
    SetItemQuantity,
};
pub use wishlist::{
    ListingSaved, ListingUnsaved, SaveListing, UnsaveListing, Wishlist, WishlistCommand,
    WishlistEvent, WishlistId, WishlistOpened,
};
