pub mod android;
pub mod buck;
pub mod buckconfig;
pub mod writer;
