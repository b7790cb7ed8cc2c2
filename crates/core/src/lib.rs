pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use aggregate::{Extraction, extract_tree};
pub use config::{ConfigWatcher, EditBatch, Settings};
pub use error::{Result, StructscopeError};
pub use fingerprint::Fingerprint;
pub use pipeline::{ClientId, Hub, Pipeline};
pub use registry::{ParsedRegistry, ParsedTrees};
