//! `motormart-events` — event mechanics shared by all domain modules.
//!
//! Pure pub/sub and projection machinery: no IO, no storage assumptions.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::{execute, CommandHandler};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionCursor, ProjectionError, ProjectionRunner};
pub use tenant::TenantScoped;
