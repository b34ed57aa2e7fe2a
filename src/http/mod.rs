//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, body parsing)
//!     → identity.rs (caller identity from peer or X-Forwarded-For)
//!     → handlers.rs (admission guard, transaction relay)
//!     → response.rs (JSON body, status mapping)
//! ```

pub mod handlers;
pub mod identity;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
