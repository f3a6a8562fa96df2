pub mod domain;
pub mod file;
pub mod ingestion_bridge;
pub mod mongo;
pub mod mqtt;

pub use ingestion_bridge::*;
