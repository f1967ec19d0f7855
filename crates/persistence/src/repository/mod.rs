//! Repository implementations for database operations

pub mod cache;

pub use cache::*;
