//! HTTP routes over a [`docent_core::Docent`]: upload, retrieval, answering
//! and file administration.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError, status_for};
pub use server::GatewayServer;
