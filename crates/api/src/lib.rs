pub mod message;
pub mod models;

// Re-export commonly used types
pub use message::{EditOutcome, Outbound};
pub use models::*;
