pub mod domain;
pub mod mongo;
pub mod telemetry;

pub use domain::*;
pub use mongo::*;
pub use telemetry::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDocumentRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockFailureQueue;
