//! Library half of the binary crate, split out so integration tests
//! can drive the router and config parsing without a live process.

pub mod brokerage_client;
pub mod config;
pub mod tools;
pub mod transport;
