mod document;
mod failed_record;
mod message;
mod result;

pub use document::*;
pub use failed_record::*;
pub use message::*;
pub use result::*;
