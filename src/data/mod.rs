pub mod datetime;
pub mod label_persistence;
pub mod loader;
pub mod parser;
pub mod table;
