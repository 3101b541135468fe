#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Watertight triangulation of trimmed boundary-representation models.
//!
//! [`geom`] holds the geometry kernel and the model, [`tess`] the engine that
//! turns a [`geom::BrepModel`] into triangles whose shared edges reference the
//! exact same 3D points in both adjacent patches.

pub mod geom;
pub mod tess;

pub use tess::{TessEngine, TessReport, TessSettings};
