//! API server and routes

pub mod extractors;
pub mod middleware;
pub mod routes;
mod server;
pub mod types;

pub use routes::otlp_collector::{OtlpGrpcServer, OtlpState};
pub use server::ApiServer;
