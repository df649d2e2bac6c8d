//! HTTP status API
//!
//! Read-only views of the running server plus a command endpoint:
//! - GET /health - Health check
//! - GET /devices - All known devices
//! - GET /devices/:id - One device
//! - GET /streams - Uploads currently being reassembled
//! - POST /devices/:id/command - Push a command to a device

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
