mod message_normalizer;
mod message_pipeline;
mod name_validator;
mod persistence_writer;
mod router;

pub use message_normalizer::*;
pub use message_pipeline::*;
pub use name_validator::*;
pub use persistence_writer::*;
pub use router::*;
