//! Core library for the size-pivot command line application.
//!
//! The library turns long-form inventory sheets (one row per item, size and
//! quantity) into wide-form sheets (one row per item, one column per size).
//! Responsibilities are kept narrow: workbook IO lives under [`io`], the cell
//! and table representations in [`model`], size interpretation in
//! [`normalize`], the aggregation in [`pivot`], sheet layout in [`layout`] and
//! the end-to-end orchestration in [`convert`].

pub mod config;
pub mod convert;
pub mod error;
pub mod io;
pub mod layout;
pub mod melt;
pub mod model;
pub mod normalize;
pub mod pivot;

pub use error::{Result, ToolError};
