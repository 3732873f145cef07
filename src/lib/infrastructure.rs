//! Infrastructure adapters for the domain traits

pub mod db;
pub mod email;
pub mod spreadsheet;
