// HTTP API routes
//
// Handlers translate requests into store calls and map store errors onto
// JSON error bodies.

pub mod common;
pub mod events;
pub mod health;

// Re-export common types
pub use common::{ApiError, ErrorResponse, MessageResponse};
