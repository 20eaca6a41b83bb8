//! Persistence layer

pub mod duckdb;
