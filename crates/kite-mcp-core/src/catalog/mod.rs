//! Periodically refreshed instrument catalog with five read-optimized
//! indexes.

mod error;
mod fetch;
mod indexes;
mod instrument;
mod manager;
mod stats;

pub use error::CatalogError;
pub use indexes::CatalogIndexes;
pub use instrument::{Instrument, INDICES_SEGMENT};
pub use manager::{CatalogConfig, CatalogSchedulerHandle, InstrumentCatalog};
pub use stats::CatalogStats;
