pub mod aggregate;
pub mod cycles;
pub mod manifest;
