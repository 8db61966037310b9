//! HTTP front-end for the triage pipeline.
//!
//! Routes are nested under `/api/`. Handlers only parse uploads, hand the
//! bytes to the shared `InferencePipeline` on a blocking thread, and map the
//! outcome (or error) to a response.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, serve_with_shutdown};
pub use types::ApiContext;
