pub mod filesystem;
pub mod parser;
pub mod pipeline;
pub mod source_index;
pub mod symbols;
