mod document_repository;

pub use document_repository::*;
