pub mod error;
pub mod parser;
pub mod synth;

pub use error::{GoError, Result, SynthesisError};
pub use parser::extract::{FileExtraction, extract_file};
pub use parser::types::{TypeShape, base_type_name, is_primitive, resolve_type_shape};
pub use parser::{GoParser, ParsedFile};
pub use synth::{
    MethodKey, declared_methods, is_identifier, is_string_literal, is_type_expression, synthesize_file,
};
