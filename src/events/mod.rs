//! Listening event log: the read model every other part of the engine is
//! derived from.

mod models;
mod schema;
mod store;

pub use models::{EventFilter, ListeningEvent};
pub use store::{EventStore, InMemoryEventStore, SqliteEventStore};
