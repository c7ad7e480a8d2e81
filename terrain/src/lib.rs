//! Terrain elevation lookup.
//!
//! Providers answer "how high is the ground here?" for a single
//! coordinate. [`survey`] asks several of them at once and reports
//! each answer, or the lack of one, as an
//! [`altimetry::ElevationSample`].

mod backoff;
mod error;
mod provider;
mod survey;
mod tiles;

pub use crate::{
    backoff::Backoff,
    error::TerrainError,
    provider::{ElevationProvider, Retry, TileProvider, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX},
    survey::survey,
    tiles::{TileMode, Tiles},
};
pub use geo;
