//! Domain entities shared by the indexer, storage, and search layers.

pub mod types;
