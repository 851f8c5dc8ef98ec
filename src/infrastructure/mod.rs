//! Adapters implementing the domain ports.

pub mod feed;
pub mod in_memory;
pub mod payments;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
