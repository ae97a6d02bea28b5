//! Stockflow Backend Library
//!
//! Inventory feed import backend: heterogeneous spreadsheet/CSV feeds in,
//! one deterministic pipeline, canonical variants out to a per-source
//! store. Exposes all modules for the binary and integration tests.

pub mod acquisition;
pub mod colors;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod formats;
pub mod marketplace;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod validation;

// Re-export the types nearly every embedder touches.
pub use coordinator::ImportCoordinator;
pub use models::{PipelineResult, Variant};
pub use pipeline::{ImportPipeline, PipelineInput, RunOptions};
pub use retry::RetryQueue;
pub use sources::DataSource;
pub use storage::InventoryDb;
