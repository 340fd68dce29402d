//! Data storage layer
//!
//! - `topics` - In-process ingest queues with batch draining
//! - `memory` - In-memory telemetry repository
//! - `seen` - Bounded tracking of already-indexed search entries
//! - `types` - Row and query types shared by all backends
//! - `traits` - Repository trait the pipelines and services depend on
//! - `error` - Unified error type for all backends

pub mod error;
pub mod memory;
pub mod seen;
pub mod topics;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use memory::MemoryRepository;
pub use seen::SeenIndex;
pub use traits::TelemetryRepository;
