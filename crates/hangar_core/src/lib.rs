pub mod chunking;
pub mod config;
pub mod domain;
pub mod error;
pub mod images;
pub mod ingest;
pub mod metadata;
pub mod store;
