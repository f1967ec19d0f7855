//! Market data API clients

pub mod polygon;

pub use polygon::PolygonClient;
