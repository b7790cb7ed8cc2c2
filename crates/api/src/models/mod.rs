pub mod graph;
pub mod structure;

pub use graph::*;
pub use structure::*;
