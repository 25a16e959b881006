//! Geolocation: edge header echo and the Swiss canton table.

pub mod canton;
pub mod edge;

pub use canton::{lookup_canton, CantonInfo};
pub use edge::GeoInfo;
