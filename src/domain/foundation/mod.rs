//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, events, and error types
//! that form the vocabulary of the query engine.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{Event, EventFilter, WILDCARD};
pub use ids::{QueryId, SubscriptionKey};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
