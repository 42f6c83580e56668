//! Infrastructure layer: event storage, dispatch, read models, workers.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workers;

#[cfg(test)]
mod integration_tests;
